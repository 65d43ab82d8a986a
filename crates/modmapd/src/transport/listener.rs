//! Unix domain socket listener for compiler connections.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use modmap_config::SocketEndpoint;

use super::{ConnectionHandler, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

#[cfg(unix)]
use tracing::{info, warn};

#[cfg(unix)]
use super::{ConnectionStream, LISTENER_TARGET};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a Unix socket endpoint.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    #[cfg(unix)]
    listener: UnixListener,
}

impl SocketListener {
    /// Binds the endpoint, replacing a stale socket file left by a previous
    /// daemon.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        match endpoint {
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                let listener = bind_unix(path.as_std_path())?;
                Ok(Self {
                    endpoint: endpoint.clone(),
                    listener,
                })
            }
            _ => Err(ListenerError::UnsupportedEndpoint {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    /// Starts accepting connections on a background thread.
    #[cfg(unix)]
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.listener.set_nonblocking(true) {
            cleanup_unix_socket(&self.endpoint);
            return Err(ListenerError::NonBlocking { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &handler));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }

    #[cfg(not(unix))]
    pub(crate) fn start(
        self,
        _handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        Err(ListenerError::UnsupportedEndpoint {
            endpoint: self.endpoint.to_string(),
        })
    }
}

/// Handle to the background listener thread.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(unix)]
fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                let handler = Arc::clone(handler);
                thread::spawn(move || handler.handle(stream));
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    cleanup_unix_socket(&listener.endpoint);
    info!(target: LISTENER_TARGET, "socket listener stopped");
}

#[cfg(unix)]
fn accept_connection(listener: &UnixListener) -> io::Result<Option<ConnectionStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(ConnectionStream::Unix(stream)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata =
            fs::symlink_metadata(path).map_err(|source| ListenerError::UnixMetadata {
                path: path.display().to_string(),
                source,
            })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::UnixInUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(error) => {
                return Err(ListenerError::UnixConnect {
                    path: path.display().to_string(),
                    source: error,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(unix)]
fn cleanup_unix_socket(endpoint: &SocketEndpoint) {
    let Some(path) = endpoint.unix_path() else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::Shutdown;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;
    use crate::resolver::DefaultResolver;
    use crate::transport::SessionConnectionHandler;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ConnectionHandler for CountingHandler {
        fn handle(&self, _stream: ConnectionStream) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if count.load(Ordering::SeqCst) >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn socket_in(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("modmapd.sock")).expect("utf8 socket path")
    }

    #[test]
    fn unix_listener_accepts_connections() {
        let dir = TempDir::new().expect("temp dir");
        let endpoint = SocketEndpoint::unix(socket_in(&dir));
        let listener = SocketListener::bind(&endpoint).expect("bind listener");
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler {
            count: Arc::clone(&count),
        });
        let handle = listener.start(handler).expect("start listener");

        let path = socket_in(&dir);
        UnixStream::connect(&path).expect("connect first client");
        UnixStream::connect(&path).expect("connect second client");

        assert!(wait_for_count(&count, 2), "expected two connections");
        handle.shutdown();
        handle.join().expect("join listener");
    }

    #[test]
    fn unix_listener_serves_sessions() {
        let dir = TempDir::new().expect("temp dir");
        let endpoint = SocketEndpoint::unix(socket_in(&dir));
        let listener = SocketListener::bind(&endpoint).expect("bind listener");
        let handler = Arc::new(SessionConnectionHandler::new(Arc::new(
            DefaultResolver::default(),
        )));
        let handle = listener.start(handler).expect("start listener");

        let mut client = UnixStream::connect(socket_in(&dir)).expect("connect client");
        client
            .write_all(b"HELLO 1 GCC main.cc ;\nMODULE-REPO\n")
            .expect("write request");
        client.shutdown(Shutdown::Write).expect("half close");
        let replies: Vec<String> = BufReader::new(client)
            .lines()
            .map(|line| line.expect("read reply"))
            .collect();
        assert_eq!(replies, ["HELLO 1 default ;", "MODULE-REPO cmi.cache"]);

        handle.shutdown();
        handle.join().expect("join listener");
    }

    #[test]
    fn unix_listener_cleans_stale_socket_files() {
        let dir = TempDir::new().expect("temp dir");
        let path = socket_in(&dir);
        {
            let _stale = UnixListener::bind(&path).expect("bind stale listener");
        }
        assert!(path.exists(), "stale socket should remain");

        let endpoint = SocketEndpoint::unix(path.clone());
        let listener = SocketListener::bind(&endpoint).expect("bind new listener");
        let count = Arc::new(AtomicUsize::new(0));
        let handle = listener
            .start(Arc::new(CountingHandler {
                count: Arc::clone(&count),
            }))
            .expect("start listener");

        UnixStream::connect(&path).expect("connect unix client");

        handle.shutdown();
        handle.join().expect("join listener");
        assert!(!path.exists(), "listener should remove unix socket on shutdown");
    }

    #[test]
    fn unix_listener_rejects_in_use_socket() {
        let dir = TempDir::new().expect("temp dir");
        let path = socket_in(&dir);
        let _existing = UnixListener::bind(&path).expect("bind existing listener");

        let error = SocketListener::bind(&SocketEndpoint::unix(path)).expect_err("should fail bind");
        assert!(matches!(error, ListenerError::UnixInUse { .. }));
    }

    #[test]
    fn unix_listener_refuses_regular_files() {
        let dir = TempDir::new().expect("temp dir");
        let path = socket_in(&dir);
        fs::write(&path, b"not a socket").expect("write file");

        let error = SocketListener::bind(&SocketEndpoint::unix(path)).expect_err("should fail bind");
        assert!(matches!(error, ListenerError::UnixNotSocket { .. }));
    }

    #[test]
    fn stdio_endpoint_is_not_a_listener() {
        let error = SocketListener::bind(&SocketEndpoint::Stdio).expect_err("stdio cannot bind");
        assert!(matches!(error, ListenerError::UnsupportedEndpoint { .. }));
    }
}
