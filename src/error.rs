//! Error taxonomy for the streaming pipeline.
//!
//! Every per-cycle failure is caught at the resilience-loop boundary and
//! converted into a restart transition. Only [`StreamError::Config`] and
//! retry-budget exhaustion are allowed to terminate the process.

/// All errors that can occur while streaming prices.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Login UI interaction failed (element not found, navigation failed).
    /// Fatal to the current session; triggers a restart.
    #[error("login failed: {0}")]
    Auth(String),

    /// The price UI region is absent on an otherwise-loaded page — logged
    /// out, still loading, or the UI changed. Triggers a restart.
    #[error("no info columns found on page")]
    NoData,

    /// Browser-driver or network failure at any stage. Triggers a restart.
    #[error("browser transport error: {0}")]
    Transport(String),

    /// Pub/sub delivery failure. Logged, never retried within the cycle —
    /// the next cycle naturally retries with fresh data.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Missing or invalid required configuration at startup. Fatal to the
    /// whole process; never retried.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<chromiumoxide::error::CdpError> for StreamError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        StreamError::Transport(err.to_string())
    }
}

impl From<redis::RedisError> for StreamError {
    fn from(err: redis::RedisError) -> Self {
        StreamError::Publish(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_stage() {
        let err = StreamError::Auth("element `#name-input` not found".to_string());
        assert!(err.to_string().contains("login failed"));

        let err = StreamError::NoData;
        assert!(err.to_string().contains("no info columns"));
    }
}
