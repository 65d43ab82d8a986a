//! Line-oriented wire encoding for build-system and compiler coordination.
//!
//! Messages are one or more lines of whitespace-separated words. A line ending
//! in a bare `;` word continues the same message on the next line. Words made
//! only of `[-+_./%A-Za-z0-9]` travel bare; anything else is single-quoted
//! with backslash escapes:
//!
//! ```text
//! HELLO 1 GCC 'main.cc' ;
//! MODULE-REPO
//! ```
//!
//! [`WireBuffer`] covers the whole life of a message: composing lines with
//! [`WireBuffer::begin_line`] and [`WireBuffer::append_word`], draining them
//! with [`WireBuffer::write_to`], filling with [`WireBuffer::read_from`], and
//! decoding one line at a time with [`WireBuffer::lex`]. Transfers work with
//! non-blocking streams: `WouldBlock` and `Interrupted` surface as
//! [`Transfer::Pending`] rather than errors.

mod buffer;
mod error;
mod lexer;

pub use buffer::{Transfer, WireBuffer, is_unquoted_safe};
pub use error::{LexError, WireError};

#[cfg(test)]
mod tests;
