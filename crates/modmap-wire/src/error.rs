//! Error types for wire buffer transfers and lexing.
//!
//! Transfer errors distinguish the recoverable trailing-data condition from
//! terminal stream failures. Lexing errors carry the raw offending line so the
//! caller can report it back to the peer without tearing down the connection.

use std::io;

use thiserror::Error;

/// Errors surfaced while moving bytes between a [`crate::WireBuffer`] and a
/// stream.
#[derive(Debug, Error)]
pub enum WireError {
    /// The peer closed its end of the stream.
    #[error("peer closed the stream")]
    Closed,

    /// A complete message was followed by further bytes in the same read.
    ///
    /// The buffer has been truncated after the first complete message, which
    /// remains available for lexing.
    #[error("unexpected bytes after a complete message")]
    TrailingData,

    /// A non-retryable IO failure. The buffer has been reset.
    #[error("stream IO failed: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    /// Returns `true` when the connection cannot continue after this error.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::TrailingData)
    }
}

/// Errors surfaced while lexing one buffered line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// The line carried no words (only a continuation marker), or nothing was
    /// left to lex.
    #[error("no message")]
    NoMessage,

    /// The line violated the word encoding.
    ///
    /// `line` holds the raw text of the line with any trailing continuation
    /// marker stripped. The buffer has already skipped past the line.
    #[error("malformed line: {}", String::from_utf8_lossy(line))]
    Malformed {
        /// Raw, undecoded text of the rejected line.
        line: Vec<u8>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_data_is_recoverable() {
        assert!(!WireError::TrailingData.is_terminal());
        assert!(WireError::Closed.is_terminal());
        assert!(WireError::from(io::Error::other("boom")).is_terminal());
    }

    #[test]
    fn malformed_display_includes_line() {
        let error = LexError::Malformed {
            line: b"HELLO 'oops".to_vec(),
        };
        assert_eq!(error.to_string(), "malformed line: HELLO 'oops");
    }
}
