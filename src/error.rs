//! Errors a [`ReadingSource`](crate::source::ReadingSource) can fail with.
//!
//! Every variant renders to the single human-readable message the feed keeps
//! as its `last_error`; none of them is fatal to the dashboard.

/// Failure of one fetch round trip
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The api could not be reached (dns, refused connection, reset...)
    #[error("Could not reach the sensor API: {message}")]
    Transport {
        /// Underlying client error
        message: String,
    },

    /// The attempt exceeded the configured request timeout
    #[error("Sensor API did not answer within {timeout_ms} ms")]
    Timeout {
        /// The bound that was exceeded
        timeout_ms: u64,
    },

    /// The api answered with a non-2xx status
    #[error("HTTP error: {status} - {message}")]
    HttpStatus {
        /// Numeric status code
        status: u16,
        /// Canonical status text, if the code has one
        message: String,
    },

    /// The body did not have the `{ items: [...] }` shape
    #[error("Invalid response format: {context}")]
    Format {
        /// What was wrong with the body
        context: String,
    },
}

impl SourceError {
    /// Status code for http failures
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Malformed body; `context` says what was wrong with it
    pub fn format(context: impl Into<String>) -> Self {
        Self::Format {
            context: context.into(),
        }
    }
}

/// Specialized result for source operations
pub type Result<T> = std::result::Result<T, SourceError>;
