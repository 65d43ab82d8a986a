//! Default values shared by the configuration loader and serde.

use camino::Utf8PathBuf;

#[cfg(unix)]
use std::env;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Directory holding compiled module interfaces, relative to the working
/// directory of the daemon.
pub const DEFAULT_REPO_DIR: &str = "cmi.cache";

/// File name suffix appended to every CMI name.
pub const DEFAULT_CMI_SUFFIX: &str = "cmi";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default repository directory as an owned path for serde.
pub fn default_repo_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_REPO_DIR)
}

/// Default CMI suffix as an owned string for serde.
pub fn default_cmi_suffix() -> String {
    DEFAULT_CMI_SUFFIX.to_owned()
}

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default endpoint for the daemon.
///
/// On Unix this is `modmapd.sock` inside a per-user runtime directory;
/// elsewhere the daemon serves a single session over stdio.
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    let mut base = match runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
        Some(dir) => {
            let mut dir = dir;
            dir.push("modmap");
            dir
        }
        None => {
            let mut dir = Utf8PathBuf::from_path_buf(env::temp_dir())
                .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
            dir.push("modmap");
            dir.push(user_namespace());
            dir
        }
    };
    base.push("modmapd.sock");
    SocketEndpoint::unix(base)
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::Stdio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn default_socket_lives_in_modmap_directory() {
        let endpoint = default_socket_endpoint();
        let path = endpoint.unix_path().expect("unix endpoint by default");
        assert_eq!(path.file_name(), Some("modmapd.sock"));
        assert!(path.components().any(|part| part.as_str() == "modmap"));
    }

    #[test]
    fn repository_defaults_match_constants() {
        assert_eq!(default_repo_dir().as_str(), DEFAULT_REPO_DIR);
        assert_eq!(default_cmi_suffix(), DEFAULT_CMI_SUFFIX);
    }
}
