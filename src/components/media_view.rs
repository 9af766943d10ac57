use crate::backend::AppServices;
use dioxus::prelude::*;
use media_feed::{MediaItem, MediaSlot};

#[derive(Clone, PartialEq)]
enum ImageState {
    Loading,
    Loaded(String),
    Failed,
}

fn toggle_script(index: usize, paused: bool) -> String {
    let action = if paused { "pause()" } else { "play()" };
    format!(r#"document.querySelector('video[data-feed-index="{index}"]')?.{action};"#)
}

/// One feed entry: a looping muted video or a resolved image
#[component]
pub fn MediaView(item: MediaItem, index: usize) -> Element {
    let services = use_context::<AppServices>();
    let slot = use_hook(MediaSlot::new);
    let mut image_state = use_signal(|| ImageState::Loading);
    let mut paused = use_signal(|| false);

    let resolve_slot = slot.clone();
    let resolve_item = item.clone();
    use_effect(move || {
        if resolve_item.is_video() {
            return;
        }
        let resolver = services.resolver.clone();
        let slot = resolve_slot.clone();
        let item = resolve_item.clone();
        spawn(async move {
            if !resolver.resolve_into(&slot, &item).await {
                return;
            }
            match slot.display_src() {
                Some(src) => image_state.set(ImageState::Loaded(src)),
                None => image_state.set(ImageState::Failed),
            }
        });
    });

    // Invalidates a pending resolution and releases the handle
    use_drop(move || slot.clear());

    if item.is_video() {
        let poster = item.thumbnail.clone().unwrap_or_default();
        return rsx! {
            div { class: "media-item",
                video {
                    class: "media-content",
                    "data-feed-index": "{index}",
                    src: "{item.url}",
                    poster: "{poster}",
                    r#loop: true,
                    muted: true,
                    playsinline: true,
                    onclick: move |_| {
                        let next = !paused();
                        paused.set(next);
                        document::eval(&toggle_script(index, next));
                    },
                }
                if paused() {
                    div { class: "play-pause-indicator",
                        div { class: "pause-icon", "❚❚" }
                    }
                }
            }
        };
    }

    rsx! {
        div { class: "media-item",
            match image_state() {
                ImageState::Loading => rsx! {
                    div { class: "media-content loading-placeholder",
                        div { class: "spinner" }
                    }
                },
                ImageState::Loaded(src) => rsx! {
                    img { class: "media-content", src: "{src}", alt: "Media {item.id}" }
                },
                ImageState::Failed => rsx! {
                    div { class: "media-content loading-placeholder", "📷" }
                },
            }
        }
    }
}
