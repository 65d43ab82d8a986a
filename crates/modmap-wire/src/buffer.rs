//! Message buffer shared by the compose, transfer, and lex phases.
//!
//! A [`WireBuffer`] is either composing outbound lines, draining them to a
//! writer, filling from a reader, or lexing buffered lines. One `boundary`
//! offset tracks progress through each phase; the vector length is the end of
//! valid content.

use std::io::{self, Read, Write};

use crate::error::WireError;

/// Byte marking a non-final line of a multi-line message.
pub(crate) const CONTINUE: u8 = b';';

/// Minimum amount by which a read grows the buffer.
const READ_BLOCK: usize = 200;

/// Outcome of a transfer that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// The message has been fully read, or the buffer fully flushed.
    Complete,
    /// More bytes are needed; retry once the stream is ready again.
    Pending,
}

/// Growable byte buffer implementing the line-oriented wire encoding.
///
/// # Examples
///
/// ```
/// use modmap_wire::WireBuffer;
///
/// let mut buffer = WireBuffer::new();
/// buffer.begin_line();
/// buffer.append_word("MODULE-CMI", false);
/// buffer.append_word("foo bar", true);
/// buffer.prepare_to_write();
/// assert_eq!(buffer.as_bytes(), b"MODULE-CMI 'foo bar'\n");
/// ```
#[derive(Debug, Default, Clone)]
pub struct WireBuffer {
    pub(crate) buffer: Vec<u8>,
    pub(crate) boundary: usize,
}

impl WireBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            boundary: 0,
        }
    }

    /// Returns every byte currently held, flushed or not.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns `true` when the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns `true` once every buffered byte has been lexed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.boundary >= self.buffer.len()
    }

    /// Starts a new outbound line.
    ///
    /// When the buffer already holds a line, that line is terminated with a
    /// continuation marker so the peer reads both as one message.
    pub fn begin_line(&mut self) {
        if !self.buffer.is_empty() {
            self.buffer.extend_from_slice(&[b' ', CONTINUE, b'\n']);
        }
        self.boundary = self.buffer.len();
    }

    /// Appends one word to the current line.
    ///
    /// Empty words are dropped unless `may_quote` is set, in which case an
    /// explicit `''` is written. With `may_quote`, words containing bytes
    /// outside the unquoted-safe set are wrapped in single quotes and escaped.
    pub fn append_word(&mut self, word: impl AsRef<[u8]>, may_quote: bool) {
        let word = word.as_ref();
        if word.is_empty() && !may_quote {
            return;
        }
        if self.buffer.len() != self.boundary {
            self.buffer.push(b' ');
        }

        let quote = may_quote && (word.is_empty() || !word.iter().copied().all(is_unquoted_safe));
        if quote {
            self.append_quoted(word);
        } else {
            self.buffer.extend_from_slice(word);
        }
    }

    /// Appends a single byte verbatim.
    pub fn append_raw(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    /// Appends the decimal form of `value` as an unquoted word.
    pub fn append_integer(&mut self, value: u64) {
        self.append_word(value.to_string(), false);
    }

    /// Terminates the final composed line and rewinds for flushing.
    pub fn prepare_to_write(&mut self) {
        if !self.buffer.is_empty() {
            self.buffer.push(b'\n');
        }
        self.boundary = 0;
    }

    /// Discards all content ahead of reading the next message.
    pub fn prepare_to_read(&mut self) {
        self.reset();
    }

    /// Flushes unwritten bytes to `writer`.
    ///
    /// A partial write advances past the written bytes and reports
    /// [`Transfer::Pending`]; retry with the same buffer once the writer is
    /// ready. A complete flush empties the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] on any non-retryable failure, after clearing
    /// the buffer. A writer accepting zero bytes is reported as
    /// [`io::ErrorKind::WriteZero`].
    pub fn write_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<Transfer, WireError> {
        let remaining = self.buffer.len().saturating_sub(self.boundary);
        let outcome = writer.write(self.buffer.get(self.boundary..).unwrap_or_default());
        match outcome {
            Ok(0) if remaining != 0 => {
                self.reset();
                Err(io::Error::from(io::ErrorKind::WriteZero).into())
            }
            Ok(count) if count < remaining => {
                self.boundary += count;
                Ok(Transfer::Pending)
            }
            Ok(_) => {
                self.reset();
                Ok(Transfer::Complete)
            }
            Err(error) if is_retryable(&error) => Ok(Transfer::Pending),
            Err(error) => {
                self.reset();
                Err(error.into())
            }
        }
    }

    /// Performs one read from `reader`, appending to the buffer.
    ///
    /// Reports [`Transfer::Complete`] once the final line of a message (one
    /// not ending in a continuation marker) has arrived.
    ///
    /// # Errors
    ///
    /// - [`WireError::Closed`] when the reader reports end of stream.
    /// - [`WireError::TrailingData`] when a complete message is followed by
    ///   more bytes; the excess is discarded and the message kept.
    /// - [`WireError::Io`] on any non-retryable failure, after clearing the
    ///   buffer.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Transfer, WireError> {
        let low = self.buffer.len();
        let mut high = self.buffer.capacity();
        if high - low < READ_BLOCK / 2 {
            high += READ_BLOCK;
        }
        self.buffer.resize(high, 0);

        let outcome = reader.read(self.buffer.get_mut(low..).unwrap_or_default());
        let count = match outcome {
            Ok(count) => count,
            Err(error) if is_retryable(&error) => {
                self.buffer.truncate(low);
                return Ok(Transfer::Pending);
            }
            Err(error) => {
                self.reset();
                return Err(error.into());
            }
        };
        self.buffer.truncate(low + count);

        if count == 0 {
            return Err(WireError::Closed);
        }
        self.scan_for_terminator(low)
    }

    /// Looks for the end of the message among bytes appended from `start`.
    fn scan_for_terminator(&mut self, start: usize) -> Result<Transfer, WireError> {
        let mut more = true;
        let mut cursor = start;
        while let Some(offset) = self
            .buffer
            .get(cursor..)
            .and_then(|tail| tail.iter().position(|byte| *byte == b'\n'))
        {
            let newline = cursor + offset;
            more = newline
                .checked_sub(1)
                .and_then(|before| self.buffer.get(before))
                .is_some_and(|byte| *byte == CONTINUE);
            cursor = newline + 1;

            if cursor == self.buffer.len() {
                break;
            }
            if !more {
                self.buffer.truncate(cursor);
                return Err(WireError::TrailingData);
            }
        }

        Ok(if more {
            Transfer::Pending
        } else {
            Transfer::Complete
        })
    }

    fn append_quoted(&mut self, word: &[u8]) {
        self.buffer.reserve(word.len() * 3 + 2);
        self.buffer.push(b'\'');
        for &byte in word {
            match byte {
                b'\t' => self.buffer.extend_from_slice(b"\\t"),
                b'\n' => self.buffer.extend_from_slice(b"\\n"),
                b'\\' | b'\'' => self.buffer.extend_from_slice(&[b'\\', byte]),
                control if control < b' ' || control == 0x7f => {
                    self.buffer.extend_from_slice(&[
                        b'\\',
                        hex_digit(control >> 4),
                        hex_digit(control & 0xf),
                    ]);
                }
                _ => self.buffer.push(byte),
            }
        }
        self.buffer.push(b'\'');
    }

    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
        self.boundary = 0;
    }
}

/// Returns `true` for bytes that may appear in an unquoted word.
#[must_use]
pub const fn is_unquoted_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'+' | b'_' | b'.' | b'/' | b'%')
}

/// Lowercase hex digit for the low nibble of `value`.
const fn hex_digit(value: u8) -> u8 {
    let nibble = value & 0xf;
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' + nibble - 10
    }
}

fn is_retryable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
