//! Shared scaffolding for the behavioural suites.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::resolver::Resolver;
use crate::session::Session;

/// Compiler side of a scripted connection.
///
/// Each message is delivered by its own read unless the script is batched,
/// in which case every message arrives in a single read.
#[derive(Default)]
pub(super) struct CompilerScript {
    messages: Vec<Vec<String>>,
    batched: bool,
}

impl CompilerScript {
    pub(super) fn push_line(&mut self, line: &str) {
        if self.messages.is_empty() {
            self.messages.push(Vec::new());
        }
        if let Some(message) = self.messages.last_mut() {
            message.push(line.to_owned());
        }
    }

    pub(super) fn start_message(&mut self) {
        self.messages.push(Vec::new());
    }

    pub(super) const fn batch(&mut self) {
        self.batched = true;
    }

    /// Encodes each message with continuation markers on all but its last
    /// line.
    fn chunks(&self) -> VecDeque<Vec<u8>> {
        let encoded = self.messages.iter().map(|lines| {
            let mut bytes = lines.join(" ;\n").into_bytes();
            bytes.push(b'\n');
            bytes
        });
        if self.batched {
            VecDeque::from([encoded.flatten().collect()])
        } else {
            encoded.collect()
        }
    }

    /// Serves the script through a fresh session and returns it with the
    /// daemon's reply lines.
    pub(super) fn run(&self, resolver: Arc<dyn Resolver>) -> (Session, Vec<String>) {
        let mut session = Session::new(resolver);
        let mut stream = ScriptedStream {
            chunks: self.chunks(),
            output: Vec::new(),
        };
        session.serve(&mut stream).expect("serve scripted session");
        let output = String::from_utf8(stream.output).expect("ascii replies");
        let replies = output.lines().map(str::to_owned).collect();
        (session, replies)
    }
}

struct ScriptedStream {
    chunks: VecDeque<Vec<u8>>,
    output: Vec<u8>,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.chunks.front_mut() else {
            return Ok(0);
        };
        let count = chunk.len().min(buf.len());
        buf[..count].copy_from_slice(&chunk[..count]);
        chunk.drain(..count);
        if chunk.is_empty() {
            self.chunks.pop_front();
        }
        Ok(count)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Strips surrounding double quotes from a string if present.
pub(super) fn strip_quotes(s: &str) -> &str {
    s.trim_matches('"')
}
