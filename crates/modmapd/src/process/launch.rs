//! Launch sequencing for the daemon runtime.

use std::sync::Arc;

use tracing::info;

use modmap_config::SocketEndpoint;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::transport::{ConnectionHandler, ConnectionStream, SessionConnectionHandler, SocketListener};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) shutdown: S,
}

/// Runs the daemon using the production collaborators.
///
/// With a Unix socket endpoint this serves connections until a termination
/// signal arrives; with the stdio endpoint it serves one session and returns
/// when the compiler hangs up.
///
/// # Errors
///
/// Returns the first failure in bootstrap, listening, or signal handling.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        shutdown: SystemShutdownSignal,
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan { loader, shutdown } = plan;
    let daemon = bootstrap_with(&loader)?;
    let handler = Arc::new(SessionConnectionHandler::new(daemon.resolver()));
    let endpoint = daemon.config().daemon_socket();
    info!(
        target: PROCESS_TARGET,
        %endpoint,
        "starting daemon runtime"
    );

    match endpoint {
        SocketEndpoint::Stdio => handler.handle(ConnectionStream::stdio()),
        SocketEndpoint::Unix { .. } => {
            let listener = SocketListener::bind(endpoint)?;
            let listener_handle = listener.start(handler)?;
            shutdown.wait()?;
            listener_handle.shutdown();
            listener_handle.join()?;
        }
    }

    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
