use crate::backend::AppServices;
use crate::error::AppError;
use crate::media_file::pick_image;
use dioxus::prelude::*;
use uuid::Uuid;

/// Camera button that picks, validates and uploads one photo
#[component]
pub fn UploadButton(user_id: Uuid, on_uploaded: EventHandler<()>) -> Element {
    let services = use_context::<AppServices>();
    let mut uploading = use_signal(|| false);
    let mut error_message = use_signal(|| None::<String>);

    let start_upload = move |_| {
        if uploading() {
            return;
        }
        let uploads = services.uploads.clone();
        spawn(async move {
            let Some(file) = (match pick_image().await {
                Ok(file) => file,
                Err(e) => {
                    log::error!("Upload failed: {}", e);
                    error_message.set(Some(e.user_message()));
                    return;
                }
            }) else {
                return;
            };

            uploading.set(true);
            error_message.set(None);
            match uploads.upload(file, &user_id).await {
                Ok(receipt) => {
                    log::debug!("Uploaded {}", receipt.path);
                    on_uploaded.call(());
                }
                Err(e) => {
                    let e = AppError::from(e);
                    log::error!("Upload failed: {}", e);
                    error_message.set(Some(e.user_message()));
                }
            }
            uploading.set(false);
        });
    };

    rsx! {
        div { class: "upload-button-container",
            button {
                class: if uploading() { "upload-button uploading" } else { "upload-button" },
                disabled: uploading(),
                title: "Upload photo",
                onclick: start_upload,
                if uploading() {
                    span { class: "upload-spinner" }
                } else {
                    svg {
                        width: "24",
                        height: "24",
                        view_box: "0 0 24 24",
                        fill: "none",
                        stroke: "currentColor",
                        stroke_width: "2",
                        stroke_linecap: "round",
                        stroke_linejoin: "round",
                        path { d: "M23 19a2 2 0 0 1-2 2H3a2 2 0 0 1-2-2V8a2 2 0 0 1 2-2h4l2-3h6l2 3h4a2 2 0 0 1 2 2z" }
                        circle { cx: "12", cy: "13", r: "4" }
                    }
                }
            }
            if let Some(message) = error_message() {
                div { class: "upload-error",
                    span { "{message}" }
                    button {
                        class: "upload-error-dismiss",
                        onclick: move |_| error_message.set(None),
                        "×"
                    }
                }
            }
        }
    }
}
