//! Per-connection protocol state.
//!
//! A [`Session`] owns the inbound and outbound wire buffers for one compiler
//! connection together with the resolver currently answering it. Requests
//! other than `HELLO` are refused until a handshake has been acknowledged;
//! a second `HELLO` afterwards is refused too. When the handshake hands back
//! a new resolver, the session switches to it for every later request,
//! including the rest of the same message.

mod errors;
mod request;
mod responder;

use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{debug, info, warn};

use modmap_wire::{LexError, Transfer, WireBuffer, WireError};

use crate::resolver::{Peer, Resolver};

pub use self::errors::SessionError;
use self::request::{Rejection, Request};
use self::responder::Responder;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Protocol state for one compiler connection.
pub struct Session {
    inbound: WireBuffer,
    outbound: WireBuffer,
    state: Handshake,
}

/// Active resolver plus whether it has acknowledged a `HELLO`.
struct Handshake {
    resolver: Arc<dyn Resolver>,
    connected: bool,
}

impl Session {
    /// Starts an unconnected session answered by `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            inbound: WireBuffer::new(),
            outbound: WireBuffer::new(),
            state: Handshake {
                resolver,
                connected: false,
            },
        }
    }

    /// Resolver currently answering requests.
    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.state.resolver
    }

    /// Whether a handshake has been acknowledged.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.state.connected
    }

    /// Performs one read of the next request message.
    ///
    /// Bytes following a complete message in the same read are dropped with
    /// a warning, and the message is reported complete.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Read`] when the stream is closed or fails.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Transfer, SessionError> {
        match self.inbound.read_from(reader) {
            Ok(transfer) => Ok(transfer),
            Err(WireError::TrailingData) => {
                warn!(
                    target: SESSION_TARGET,
                    "discarding bytes sent after a complete message"
                );
                Ok(Transfer::Complete)
            }
            Err(source) => Err(SessionError::Read { source }),
        }
    }

    /// Answers every request line of the buffered message.
    ///
    /// Each line yields exactly one reply. The active resolver's
    /// [`Resolver::wait_until_ready`] hook runs once the batch is answered.
    /// Returns the number of request lines handled.
    pub fn parse_requests(&mut self) -> usize {
        let mut responder = Responder::new(&mut self.outbound);
        let mut handled = 0;

        while !self.inbound.is_at_end() {
            match self.inbound.lex() {
                Ok(words) => {
                    let line = self.inbound.lexed_line();
                    match Request::parse(&words) {
                        Ok(request) => self.state.dispatch(request, &mut responder),
                        Err(rejection) => {
                            warn!(
                                target: SESSION_TARGET,
                                line = %String::from_utf8_lossy(line),
                                ?rejection,
                                "rejected request"
                            );
                            self.state.reject(&mut responder, &rejection.message(line));
                        }
                    }
                }
                Err(LexError::NoMessage) => continue,
                Err(LexError::Malformed { line }) => {
                    warn!(
                        target: SESSION_TARGET,
                        line = %String::from_utf8_lossy(&line),
                        "undecodable request line"
                    );
                    self.state
                        .reject(&mut responder, &Rejection::Malformed.message(&line));
                }
            }
            handled += 1;
        }

        self.state.resolver.wait_until_ready(&mut responder);
        handled
    }

    /// Terminates the queued replies ahead of [`Session::write_to`].
    pub fn prepare_to_write(&mut self) {
        self.outbound.prepare_to_write();
    }

    /// Performs one write of the queued replies.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Write`] when the stream fails.
    pub fn write_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<Transfer, SessionError> {
        self.outbound
            .write_to(writer)
            .map_err(|source| SessionError::Write { source })
    }

    /// Clears the inbound buffer ahead of the next message.
    pub fn prepare_to_read(&mut self) {
        self.inbound.prepare_to_read();
    }

    /// Serves request messages from a blocking `stream` until the compiler
    /// hangs up.
    ///
    /// # Errors
    ///
    /// Returns the first transfer failure other than end of stream.
    pub fn serve<S: Read + Write + ?Sized>(&mut self, stream: &mut S) -> Result<(), SessionError> {
        loop {
            self.prepare_to_read();
            loop {
                match self.read_from(stream) {
                    Ok(Transfer::Complete) => break,
                    Ok(Transfer::Pending) => {}
                    Err(error) if error.is_closed() => {
                        debug!(target: SESSION_TARGET, "compiler closed the connection");
                        return Ok(());
                    }
                    Err(error) => return Err(error),
                }
            }

            let handled = self.parse_requests();
            debug!(target: SESSION_TARGET, handled, "answered request batch");

            self.prepare_to_write();
            while self.write_to(stream)? == Transfer::Pending {}
            stream.flush().map_err(|source| SessionError::Write {
                source: source.into(),
            })?;
        }
    }
}

impl Handshake {
    fn dispatch(&mut self, request: Request<'_>, responder: &mut Responder<'_>) {
        debug!(target: SESSION_TARGET, keyword = request.keyword(), "dispatching request");
        let resolver = Arc::clone(&self.resolver);

        match request {
            Request::Connect { .. } if self.connected => {
                resolver.error_response(responder, "already connected");
            }
            Request::Connect {
                version,
                agent,
                ident,
            } => {
                let next = resolver.connect_request(responder, version, agent, ident);
                if responder.take_acknowledged() {
                    self.connected = true;
                    info!(
                        target: SESSION_TARGET,
                        version,
                        agent,
                        ident,
                        "compiler connected"
                    );
                    if let Some(next) = next {
                        info!(
                            target: SESSION_TARGET,
                            from = resolver.agent_name(),
                            to = next.agent_name(),
                            "switching resolver"
                        );
                        self.resolver = next;
                    }
                }
            }
            _ if !self.connected => resolver.error_response(responder, "not connected"),
            Request::ModuleRepo => resolver.module_repo_request(responder),
            Request::ModuleExport(module) => resolver.module_export_request(responder, module),
            Request::ModuleImport(module) => resolver.module_import_request(responder, module),
            Request::ModuleCompiled(module) => resolver.module_compiled_request(responder, module),
            Request::IncludeTranslate(include) => {
                resolver.include_translate_request(responder, include);
            }
        }
    }

    fn reject(&self, responder: &mut dyn Peer, message: &str) {
        self.resolver.error_response(responder, message);
    }
}
