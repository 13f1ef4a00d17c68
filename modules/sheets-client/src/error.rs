use thiserror::Error;

pub type Result<T> = std::result::Result<T, SheetsError>;

#[derive(Debug, Error)]
pub enum SheetsError {
    /// The request never produced an HTTP response: connect/TLS failure,
    /// reset, timeout.
    #[error("Network error: {message}")]
    Network { message: String, transient: bool },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// No access token could be obtained.
    #[error("Auth error: {0}")]
    Auth(String),
}

impl SheetsError {
    /// Worth retrying: connection reset/abort, timeout, TLS, or a 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            SheetsError::Network { transient, .. } => *transient,
            SheetsError::Api { status, .. } => (500..600).contains(status),
            SheetsError::Parse(_) | SheetsError::Auth(_) => false,
        }
    }
}

impl From<reqwest::Error> for SheetsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return SheetsError::Parse(err.to_string());
        }
        let transient = err.is_connect() || err.is_timeout() || err.is_request() || err.is_body();
        SheetsError::Network {
            message: err.to_string(),
            transient,
        }
    }
}

impl From<serde_json::Error> for SheetsError {
    fn from(err: serde_json::Error) -> Self {
        SheetsError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let api = |status| SheetsError::Api {
            status,
            message: String::new(),
        };
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(400).is_transient());
        assert!(!api(403).is_transient());
        assert!(!api(429).is_transient());
        assert!(!SheetsError::Parse("x".into()).is_transient());
        assert!(!SheetsError::Auth("no key".into()).is_transient());
        assert!(SheetsError::Network {
            message: "connection reset by peer".into(),
            transient: true
        }
        .is_transient());
    }
}
