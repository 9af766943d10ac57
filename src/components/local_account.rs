use crate::backend::AppServices;
use dioxus::prelude::*;
use media_feed::Identity;

/// Account menu of the offline backend: signs the configured user in or out
#[component]
pub fn LocalAccountButton(identity: Option<Identity>) -> Element {
    let services = use_context::<AppServices>();
    let mut menu_open = use_signal(|| false);

    match identity {
        Some(identity) => {
            let initial = identity.initial();
            let email = identity.email.clone().unwrap_or_default();
            let auth = services.auth.clone();
            rsx! {
                div { class: "auth-button",
                    button {
                        class: "avatar",
                        title: "{email}",
                        onclick: move |_| menu_open.set(!menu_open()),
                        "{initial}"
                    }
                    if menu_open() {
                        div { class: "auth-menu",
                            div { class: "auth-email", "{email}" }
                            button {
                                class: "auth-menu-item",
                                onclick: move |_| {
                                    if let Some(provider) = auth.local() {
                                        provider.sign_out();
                                    }
                                    menu_open.set(false);
                                },
                                "Sign Out"
                            }
                        }
                    }
                }
            }
        }
        None => {
            // Without a configured user there is nobody to sign in
            let Some(user) = services.config.local_user() else {
                return rsx! {};
            };
            let auth = services.auth.clone();
            rsx! {
                button {
                    class: "btn-primary",
                    onclick: move |_| {
                        if let Some(provider) = auth.local() {
                            provider.sign_in(user.clone());
                        }
                    },
                    "Sign In"
                }
            }
        }
    }
}
