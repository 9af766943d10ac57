use dioxus::prelude::*;

#[component]
pub fn LoginPrompt() -> Element {
    rsx! {
        div { class: "login-prompt",
            h2 { "Sign in to view your photos" }
            p { "Sign in to upload and view your personal photo collection" }
        }
    }
}
