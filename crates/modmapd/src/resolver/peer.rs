//! The response side of a connection, as seen by a resolver.

/// Emits protocol responses on behalf of a [`super::Resolver`].
///
/// Each method queues exactly one response line. Implementations decide how
/// the line reaches the compiler; the daemon's session layer encodes it into
/// the outbound wire buffer.
pub trait Peer {
    /// Queues `ERROR message`.
    fn error_response(&mut self, message: &str);

    /// Queues `HELLO version agent`, acknowledging a handshake.
    fn connect_response(&mut self, version: u32, agent: &str);

    /// Queues `MODULE-REPO repo`.
    fn module_repo_response(&mut self, repo: &str);

    /// Queues `MODULE-CMI cmi`.
    fn module_cmi_response(&mut self, cmi: &str);

    /// Queues `INCLUDE-TEXT`, telling the compiler to include the header
    /// textually.
    fn include_text_response(&mut self);

    /// Queues `OK`.
    fn ok_response(&mut self);
}
