use dioxus::prelude::*;
use media_feed::FeedMode;

const MODES: [FeedMode; 2] = [FeedMode::AfProducts, FeedMode::MyPhotos];

/// Segmented switch between the product feed and the user's photos
#[component]
pub fn FeedToggle(mode: FeedMode, on_change: EventHandler<FeedMode>) -> Element {
    rsx! {
        div { class: "feed-toggle",
            for option in MODES {
                button {
                    key: "{option:?}",
                    class: if option == mode { "toggle-option active" } else { "toggle-option" },
                    onclick: move |_| on_change.call(option),
                    {option.label()}
                }
            }
        }
    }
}
