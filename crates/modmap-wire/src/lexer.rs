//! Decoding of buffered lines into words.
//!
//! Lexing consumes exactly one line per call. Any encoding violation sends the
//! decoder into a single resync path that skips to the end of the offending
//! line and hands its raw text back to the caller.

use crate::buffer::{CONTINUE, WireBuffer};
use crate::error::LexError;

impl WireBuffer {
    /// Decodes the next buffered line into its words.
    ///
    /// A line holding only a continuation marker yields
    /// [`LexError::NoMessage`]; so does calling this once every line has
    /// been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Malformed`] with the raw line text when the line
    /// violates the encoding. The offending line is skipped either way.
    pub fn lex(&mut self) -> Result<Vec<Vec<u8>>, LexError> {
        if self.is_at_end() {
            return Err(LexError::NoMessage);
        }

        let start = self.boundary;
        match decode_line(&self.buffer, start) {
            Ok((words, next)) => {
                self.boundary = next.min(self.buffer.len());
                if words.is_empty() {
                    Err(LexError::NoMessage)
                } else {
                    Ok(words)
                }
            }
            Err(stopped_at) => {
                let (line, next) = resync(&self.buffer, start, stopped_at);
                self.boundary = next;
                Err(LexError::Malformed { line })
            }
        }
    }

    /// Returns the raw text of the most recently lexed line.
    ///
    /// A trailing continuation marker is stripped. Returns an empty slice when
    /// nothing has been lexed yet.
    #[must_use]
    pub fn lexed_line(&self) -> &[u8] {
        let Some(terminator) = self.boundary.checked_sub(1) else {
            return &[];
        };
        let head = self.buffer.get(..terminator).unwrap_or_default();
        let begin = head
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map_or(0, |newline| newline + 1);
        let end = strip_continuation(&self.buffer, begin, terminator);
        self.buffer.get(begin..end).unwrap_or_default()
    }
}

/// Read position over a line; bytes past the end read as NEWLINE.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(b'\n')
    }

    fn bump(&mut self) -> u8 {
        let byte = self.peek();
        self.pos += 1;
        byte
    }
}

/// Decodes the line at `start`, returning the words and the offset after the
/// line. On failure returns the offset from which to resync.
fn decode_line(bytes: &[u8], start: usize) -> Result<(Vec<Vec<u8>>, usize), usize> {
    let mut cursor = Cursor { bytes, pos: start };
    let mut words = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    loop {
        let byte = cursor.bump();
        match byte {
            b' ' | b'\t' => words.extend(current.take()),
            b'\n' => break,
            CONTINUE => {
                if current.is_some() || cursor.peek() != b'\n' {
                    return Err(cursor.pos);
                }
                cursor.bump();
                break;
            }
            other if other <= b' ' || other >= 0x7f => return Err(cursor.pos),
            b'\'' => {
                let word = current.get_or_insert_with(Vec::new);
                decode_quoted(&mut cursor, word)?;
            }
            other => current.get_or_insert_with(Vec::new).push(other),
        }
    }

    words.extend(current);
    Ok((words, cursor.pos))
}

/// Decodes the body of a quoted word up to and including its closing quote.
fn decode_quoted(cursor: &mut Cursor<'_>, word: &mut Vec<u8>) -> Result<(), usize> {
    loop {
        let byte = cursor.peek();
        if byte == b'\n' || byte < b' ' || byte == 0x7f {
            return Err(cursor.pos);
        }
        cursor.bump();
        match byte {
            b'\'' => return Ok(()),
            b'\\' => word.push(decode_escape(cursor)?),
            other => word.push(other),
        }
    }
}

/// Decodes the escape sequence following a backslash.
fn decode_escape(cursor: &mut Cursor<'_>) -> Result<u8, usize> {
    let simple = match cursor.peek() {
        b'\\' => Some(b'\\'),
        b'\'' => Some(b'\''),
        b'n' => Some(b'\n'),
        b't' => Some(b'\t'),
        // Older peers escaped SPACE this way.
        b'_' => Some(b' '),
        _ => None,
    };
    if let Some(value) = simple {
        cursor.bump();
        return Ok(value);
    }

    let mut value = 0u8;
    for digit in 0..2 {
        match hex_value(cursor.peek()) {
            Some(nibble) => {
                cursor.bump();
                value = (value << 4) | nibble;
            }
            None if digit == 0 => return Err(cursor.pos),
            None => break,
        }
    }
    Ok(value)
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Skips to the end of the line containing `from`.
///
/// Returns the raw line text starting at `start` and the offset just past its
/// terminating NEWLINE.
fn resync(bytes: &[u8], start: usize, from: usize) -> (Vec<u8>, usize) {
    let from = from.min(bytes.len());
    let newline = bytes
        .get(from..)
        .and_then(|tail| tail.iter().position(|byte| *byte == b'\n'))
        .map_or(bytes.len(), |offset| from + offset);
    let end = strip_continuation(bytes, start, newline);
    let line = bytes.get(start..end).unwrap_or_default().to_vec();
    (line, (newline + 1).min(bytes.len()))
}

/// Moves `end` back over a trailing ` ;` lying after `begin`.
fn strip_continuation(bytes: &[u8], begin: usize, end: usize) -> usize {
    let tail = end
        .checked_sub(2)
        .filter(|marker| *marker >= begin)
        .and_then(|marker| bytes.get(marker..end));
    if tail == Some(&[b' ', CONTINUE][..]) {
        end - 2
    } else {
        end
    }
}
