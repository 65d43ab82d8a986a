//! Connection handling for the daemon transports.

use std::io::{self, Read, Stdin, Stdout, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::resolver::Resolver;
use crate::session::Session;

use super::LISTENER_TARGET;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Byte streams a session can be served over.
pub(crate) enum ConnectionStream {
    #[cfg(unix)]
    Unix(UnixStream),
    Stdio { input: Stdin, output: Stdout },
}

impl ConnectionStream {
    /// Wraps the process's standard input and output.
    pub(crate) fn stdio() -> Self {
        Self::Stdio {
            input: io::stdin(),
            output: io::stdout(),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            #[cfg(unix)]
            Self::Unix(_) => "unix",
            Self::Stdio { .. } => "stdio",
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
            Self::Stdio { input, .. } => input.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
            Self::Stdio { output, .. } => output.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
            Self::Stdio { output, .. } => output.flush(),
        }
    }
}

/// Handles accepted connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Serves each connection with a fresh [`Session`] on a shared resolver.
pub(crate) struct SessionConnectionHandler {
    resolver: Arc<dyn Resolver>,
}

impl SessionConnectionHandler {
    pub(crate) fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }
}

impl ConnectionHandler for SessionConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let transport = stream.kind();
        debug!(target: LISTENER_TARGET, transport, "session started");
        let mut session = Session::new(Arc::clone(&self.resolver));
        match session.serve(&mut stream) {
            Ok(()) => debug!(target: LISTENER_TARGET, transport, "session finished"),
            Err(error) => warn!(
                target: LISTENER_TARGET,
                transport,
                error = %error,
                "session ended with error"
            ),
        }
    }
}
