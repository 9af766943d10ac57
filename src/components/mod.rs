mod feed;
mod feed_toggle;
mod local_account;
mod login_prompt;
mod media_view;
mod upload_button;

pub use feed::Feed;
pub use feed_toggle::FeedToggle;
pub use local_account::LocalAccountButton;
pub use login_prompt::LoginPrompt;
pub use media_view::MediaView;
pub use upload_button::UploadButton;
