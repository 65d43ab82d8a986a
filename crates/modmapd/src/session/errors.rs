//! Error types for session transfers.

use modmap_wire::WireError;
use thiserror::Error;

/// Failures that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading the next request message failed.
    #[error("failed to read request: {source}")]
    Read {
        /// Underlying wire error.
        #[source]
        source: WireError,
    },
    /// Writing replies failed.
    #[error("failed to write response: {source}")]
    Write {
        /// Underlying wire error.
        #[source]
        source: WireError,
    },
}

impl SessionError {
    /// Returns `true` when the compiler simply hung up.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::Read {
                source: WireError::Closed
            }
        )
    }
}
