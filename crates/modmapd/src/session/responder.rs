//! [`Peer`] implementation encoding responses into a wire buffer.

use modmap_wire::WireBuffer;

use crate::resolver::Peer;

/// Queues response lines for one batch of requests.
pub(crate) struct Responder<'a> {
    buffer: &'a mut WireBuffer,
    acknowledged: bool,
}

impl<'a> Responder<'a> {
    pub(crate) const fn new(buffer: &'a mut WireBuffer) -> Self {
        Self {
            buffer,
            acknowledged: false,
        }
    }

    /// Reports whether a handshake acknowledgement was queued since the last
    /// call.
    pub(crate) const fn take_acknowledged(&mut self) -> bool {
        let acknowledged = self.acknowledged;
        self.acknowledged = false;
        acknowledged
    }

    fn line(&mut self, keyword: &str) {
        self.buffer.begin_line();
        self.buffer.append_word(keyword, false);
    }
}

impl Peer for Responder<'_> {
    fn error_response(&mut self, message: &str) {
        self.line("ERROR");
        self.buffer.append_word(message, true);
    }

    fn connect_response(&mut self, version: u32, agent: &str) {
        self.line("HELLO");
        self.buffer.append_integer(u64::from(version));
        self.buffer.append_word(agent, true);
        self.acknowledged = true;
    }

    fn module_repo_response(&mut self, repo: &str) {
        self.line("MODULE-REPO");
        self.buffer.append_word(repo, true);
    }

    fn module_cmi_response(&mut self, cmi: &str) {
        self.line("MODULE-CMI");
        self.buffer.append_word(cmi, true);
    }

    fn include_text_response(&mut self) {
        self.line("INCLUDE-TEXT");
    }

    fn ok_response(&mut self) {
        self.line("OK");
    }
}
