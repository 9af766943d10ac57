/// Error type for media feed operations
///
/// Each variant carries a human readable detail message. The variant, not the
/// message, decides how a failure is surfaced: reads degrade to an empty
/// feed, writes are reported to the user, profile failures are only logged.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFeedError {
    /// Bad input, rejected before any network call
    Validation(String),
    /// A record store read failed
    Retrieval(String),
    /// An object storage read or write failed
    Storage(String),
    /// A metadata write failed
    Persist(String),
    /// The profile upsert failed
    Profile(String),
    /// Missing or invalid configuration
    Config(String),
}

impl std::fmt::Display for MediaFeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaFeedError::Validation(msg) => write!(f, "Validation error: {}", msg),
            MediaFeedError::Retrieval(msg) => write!(f, "Retrieval error: {}", msg),
            MediaFeedError::Storage(msg) => write!(f, "Storage error: {}", msg),
            MediaFeedError::Persist(msg) => write!(f, "Persist error: {}", msg),
            MediaFeedError::Profile(msg) => write!(f, "Profile error: {}", msg),
            MediaFeedError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for MediaFeedError {}

impl MediaFeedError {
    /// The detail message without the category prefix
    pub fn detail(&self) -> &str {
        match self {
            MediaFeedError::Validation(msg)
            | MediaFeedError::Retrieval(msg)
            | MediaFeedError::Storage(msg)
            | MediaFeedError::Persist(msg)
            | MediaFeedError::Profile(msg)
            | MediaFeedError::Config(msg) => msg,
        }
    }

    /// User-facing message for alerts raised by user-initiated actions
    pub fn user_message(&self) -> String {
        match self {
            MediaFeedError::Validation(msg) => msg.clone(),
            MediaFeedError::Storage(_) | MediaFeedError::Persist(_) => {
                "Failed to upload photo. Please try again.".to_string()
            }
            MediaFeedError::Retrieval(_) => "Failed to load media.".to_string(),
            MediaFeedError::Profile(_) => "Failed to update your profile.".to_string(),
            MediaFeedError::Config(msg) => format!("The app is misconfigured: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = MediaFeedError::Persist("insert rejected".to_string());
        assert_eq!(err.to_string(), "Persist error: insert rejected");
        assert_eq!(err.detail(), "insert rejected");
    }

    #[test]
    fn test_validation_message_is_shown_verbatim() {
        let err = MediaFeedError::Validation("Please select an image file".to_string());
        assert_eq!(err.user_message(), "Please select an image file");
    }
}
