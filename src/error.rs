//! Unified error handling for the grid trading engine
//!
//! Every failure the engine can see falls into one of five buckets, and the
//! bucket decides the handling policy: configuration and permission problems
//! are fatal at startup and never retried, transient gateway failures are
//! retried up to a fixed bound and then skipped for the current tick, order
//! rejections abandon a single level, and anything unclassified is logged
//! and contained at the polling loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad range, bad count, missing credentials. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Market/account access not granted. Fatal at startup, never retried,
    /// since it indicates misconfiguration rather than transient failure.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Network / timeout / rate-limit from a gateway. Retried up to the
    /// configured bound, then the enclosing tick action is skipped.
    #[error("transient gateway failure: {0}")]
    Transient(String),

    /// The exchange rejected an order (bad price/size, insufficient
    /// balance). Placement for that level is abandoned; other levels
    /// proceed independently.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// Anything unclassified. Caught at the loop so one tick's failure
    /// never terminates polling; surfaced to the caller at startup.
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl EngineError {
    /// Whether the retry wrapper may attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }

    /// Whether the error must abort startup rather than be contained.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            EngineError::Configuration(_) | EngineError::Permission(_)
        )
    }

    /// Error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "config",
            EngineError::Permission(_) => "permission",
            EngineError::Transient(_) => "transient",
            EngineError::Rejected(_) => "rejected",
            EngineError::Unknown(_) => "unknown",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionRefused => {
                EngineError::Transient(err.to_string())
            }
            std::io::ErrorKind::PermissionDenied => EngineError::Permission(err.to_string()),
            _ => EngineError::Unknown(format!("io error: {}", err)),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return EngineError::Permission(err.to_string());
            }
        }
        // Timeouts, connection resets and 5xx/429 responses are all worth
        // another attempt.
        EngineError::Transient(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Configuration(format!("TOML parse error: {}", err))
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::Transient("timeout".into()).is_retryable());
        assert!(!EngineError::Permission("no market access".into()).is_retryable());
        assert!(!EngineError::Rejected("price out of band".into()).is_retryable());
        assert!(!EngineError::Configuration("bad range".into()).is_retryable());
    }

    #[test]
    fn test_startup_fatality() {
        assert!(EngineError::Configuration("bad range".into()).is_fatal_at_startup());
        assert!(EngineError::Permission("denied".into()).is_fatal_at_startup());
        assert!(!EngineError::Transient("timeout".into()).is_fatal_at_startup());
    }

    #[test]
    fn test_category() {
        assert_eq!(EngineError::Rejected("x".into()).category(), "rejected");
        assert_eq!(EngineError::Unknown("x".into()).category(), "unknown");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Transient(_)));
    }
}
