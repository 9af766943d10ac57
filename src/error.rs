use media_feed::MediaFeedError;
use std::fmt;
use supabase_auth::AuthError;

/// Central error types for the Aura app
#[derive(Debug)]
pub enum AppError {
    /// Feed, upload or backend error
    Media(MediaFeedError),
    /// Sign-in error
    Auth(AuthError),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// Missing or invalid configuration
    Config(String),
    /// File picker error
    Picker(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Media(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "Authentication error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Picker(msg) => write!(f, "File picker error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<MediaFeedError> for AppError {
    fn from(e: MediaFeedError) -> Self {
        AppError::Media(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

/// User-friendly error messages for UI
impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Media(e) => e.user_message(),
            AppError::Auth(_) => "Sign-in failed. Please try again.".to_string(),
            AppError::Filesystem(_) => "Error accessing files. Please check app permissions.".to_string(),
            AppError::Config(msg) => format!("The app is misconfigured: {}", msg),
            AppError::Picker(_) => "Could not open the selected file.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_failures_share_one_message() {
        let storage: AppError = MediaFeedError::Storage("bucket missing".to_string()).into();
        let persist: AppError = MediaFeedError::Persist("insert rejected".to_string()).into();
        assert_eq!(storage.user_message(), "Failed to upload photo. Please try again.");
        assert_eq!(storage.user_message(), persist.user_message());
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err: AppError = MediaFeedError::Validation("File size must be less than 5MB".to_string()).into();
        assert_eq!(err.user_message(), "File size must be less than 5MB");
    }
}
