use super::MediaView;
use dioxus::prelude::*;
use media_feed::MediaItem;

/// Plays the active video and pauses and rewinds every other one
fn sync_videos_script(active: usize) -> String {
    format!(
        r#"document.querySelectorAll("video[data-feed-index]").forEach((video) => {{
            if (Number(video.dataset.feedIndex) === {active}) {{
                video.play().catch((err) => console.log("Autoplay prevented:", err));
            }} else {{
                video.pause();
                video.currentTime = 0;
            }}
        }});"#
    )
}

/// Index of the item filling the viewport of a snap-scrolling feed
fn active_index(scroll_top: f64, viewport_height: f64, len: usize) -> usize {
    if viewport_height <= 0.0 || len == 0 {
        return 0;
    }
    let index = (scroll_top / viewport_height).round().max(0.0) as usize;
    index.min(len - 1)
}

/// Full-screen vertical feed, one item per viewport
#[component]
pub fn Feed(items: Vec<MediaItem>) -> Element {
    let mut active = use_signal(|| 0usize);
    let len = items.len();

    // Re-run whenever the active item changes
    use_effect(move || {
        let index = active();
        document::eval(&sync_videos_script(index));
    });

    if items.is_empty() {
        return rsx! {
            div { class: "feed-status",
                p { "Nothing to show yet" }
            }
        };
    }

    rsx! {
        div {
            class: "feed",
            onscroll: move |evt| {
                let data = evt.data();
                let index = active_index(data.scroll_top() as f64, data.client_height() as f64, len);
                if index != *active.peek() {
                    active.set(index);
                }
            },
            for (index, item) in items.into_iter().enumerate() {
                MediaView { key: "{item.id}-{item.url}", item: item.clone(), index }
            }
        }
    }
}
