use thiserror::Error;

/// Errors surfaced by the client core.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never got a response: connection refused, DNS failure, timeout and so on
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        /// Only set by the login endpoint
        user_exists: Option<bool>,
    },

    /// The connectivity probe reports the device as offline
    #[error("Device is offline")]
    Offline,

    /// Reading or writing the local store failed
    #[error("Local storage error: {0}")]
    Store(#[from] std::io::Error),

    /// A stored value or a response body did not have the expected shape
    #[error("Invalid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether a mutation that failed this way can be queued and replayed later.
    pub fn is_offline_recoverable(&self) -> bool {
        match self {
            ClientError::Offline => true,
            ClientError::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status for server-side failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Text to show the user: the server's message when there is one.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Offline => "You are offline".to_string(),
            ClientError::Network(_) => "Could not reach the server".to_string(),
            _ => "Something went wrong".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connectivity_failures_are_recoverable() {
        assert!(ClientError::Offline.is_offline_recoverable());

        let api = ClientError::Api {
            status: 404,
            message: "List not found".to_string(),
            user_exists: None,
        };
        assert!(!api.is_offline_recoverable());
        assert_eq!(api.status(), Some(404));
        assert_eq!(api.user_message(), "List not found");

        let json = ClientError::from(serde_json::from_str::<i32>("nope").unwrap_err());
        assert!(matches!(json, ClientError::Serde(_)));
        assert!(!json.is_offline_recoverable());

        let store = ClientError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(matches!(store, ClientError::Store(_)));
        assert_eq!(store.status(), None);
        assert_eq!(store.user_message(), "Something went wrong");
    }
}
