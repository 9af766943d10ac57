use dioxus::prelude::*;

mod backend;
mod components;
mod config;
mod error;
mod media_file;

use backend::AppServices;
use components::{Feed, FeedToggle, LocalAccountButton, LoginPrompt, UploadButton};
use config::AppConfig;
use media_feed::{FeedMode, FeedState};
use supabase_auth::AuthButton;

const MAIN_CSS: Asset = asset!("/assets/main.css");

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    let services = use_hook(|| {
        AppConfig::load()
            .and_then(AppServices::build)
            .map_err(|e| {
                log::error!("Startup failed: {}", e);
                e.user_message()
            })
    });

    rsx! {
        document::Link { rel: "stylesheet", href: MAIN_CSS }

        match services {
            Ok(services) => rsx! {
                FeedScreen { services }
            },
            Err(message) => rsx! {
                div { class: "startup-error",
                    h2 { "Aura could not start" }
                    p { "{message}" }
                }
            },
        }
    }
}

#[component]
fn FeedScreen(services: AppServices) -> Element {
    let services = use_context_provider(|| services);
    let mut snapshot = use_signal(|| services.feed.snapshot());

    // Feed snapshots and identity changes live outside the component tree
    use_hook(|| {
        let feed = services.feed.clone();
        spawn(async move {
            let mut updates = feed.subscribe();
            loop {
                let next = updates.borrow_and_update().clone();
                snapshot.set(next);
                if updates.changed().await.is_err() {
                    break;
                }
            }
        });

        let identity_services = services.clone();
        spawn(async move {
            identity_services
                .run_identity(|load| {
                    spawn(async move {
                        load.run().await;
                    });
                })
                .await;
            log::debug!("Identity stream closed");
        });
    });

    let current = snapshot();
    let sequence = current.sequence;
    let identity = current.identity.identity().cloned();
    let redirect_url = services.config.redirect_url.clone();
    let show_upload = identity.is_some() && current.mode == FeedMode::MyPhotos;
    let upload_user = identity.as_ref().map(|identity| identity.id);

    let toggle_feed = services.feed.clone();
    let upload_feed = services.feed.clone();

    rsx! {
        div { class: "app",
            FeedToggle {
                mode: current.mode,
                on_change: move |mode| {
                    if let Some(load) = toggle_feed.set_mode(mode) {
                        spawn(async move {
                            load.run().await;
                        });
                    }
                },
            }

            div { class: "header-actions",
                if show_upload {
                    if let Some(user_id) = upload_user {
                        UploadButton {
                            user_id,
                            on_uploaded: move |_| {
                                if let Some(load) = upload_feed.refresh_after_upload() {
                                    spawn(async move {
                                        load.run().await;
                                    });
                                }
                            },
                        }
                    }
                }
                if let Some(service) = services.auth.supabase() {
                    AuthButton {
                        service: service.clone(),
                        identity: identity.clone(),
                        redirect_url,
                    }
                } else {
                    LocalAccountButton { identity: identity.clone() }
                }
            }

            match current.state {
                FeedState::Ready(items) => rsx! {
                    Feed { key: "{sequence}", items }
                },
                FeedState::EmptyUnauthenticated => rsx! {
                    LoginPrompt {}
                },
                FeedState::Idle | FeedState::AuthPending | FeedState::Loading => rsx! {
                    div { class: "feed-status",
                        div { class: "spinner" }
                    }
                },
            }
        }
    }
}
