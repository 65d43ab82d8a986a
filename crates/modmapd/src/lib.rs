//! Module mapper daemon for C++ compilers.
//!
//! Compilers connect over a Unix socket or the daemon's standard streams and
//! ask where compiled module interfaces live, whether header units should be
//! imported instead of textually included, and report finished compilations.
//! Each connection is served by a [`session::Session`], which decodes the
//! line protocol from [`modmap_wire`] and hands each request to a
//! [`resolver::Resolver`].
//!
//! The handshake is the only stateful step. Until a compiler has been
//! acknowledged every other request is refused, and a resolver may nominate a
//! replacement for itself while acknowledging it.

mod bootstrap;
mod process;
pub mod resolver;
pub mod session;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
