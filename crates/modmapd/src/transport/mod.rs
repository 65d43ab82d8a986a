//! Compiler-facing transports.
//!
//! The daemon either listens on a Unix domain socket, serving each accepted
//! connection on its own thread, or serves a single session over its
//! standard streams.

mod errors;
mod handler;
mod listener;

pub(crate) use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream, SessionConnectionHandler};
pub(crate) use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
