//! Shared configuration for the module mapper daemon.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! configuration file, `MODMAP_*` environment variables, and command-line
//! flags. Loading is delegated to `ortho_config`.

mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CMI_SUFFIX, DEFAULT_LOG_FILTER, DEFAULT_REPO_DIR, default_cmi_suffix,
    default_log_filter, default_log_filter_string, default_log_format, default_repo_dir,
    default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Daemon configuration after layering every source.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "MODMAP")]
pub struct Config {
    /// Endpoint the daemon serves compiler connections on.
    #[serde(default = "default_socket_endpoint")]
    pub daemon_socket: SocketEndpoint,
    /// Directory holding compiled module interfaces.
    #[serde(default = "default_repo_dir")]
    pub repo_dir: Utf8PathBuf,
    /// Suffix appended to every CMI name.
    #[serde(default = "default_cmi_suffix")]
    pub cmi_suffix: String,
    /// `tracing` filter directive applied to daemon logs.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Format of daemon log lines.
    #[serde(default = "default_log_format")]
    pub telemetry_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            repo_dir: default_repo_dir(),
            cmi_suffix: default_cmi_suffix(),
            log_filter: default_log_filter_string(),
            telemetry_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments, environment, and
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns the aggregated `ortho_config` error when any layer is invalid.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration treating `args` as the command line.
    ///
    /// The first item is the program name.
    ///
    /// # Errors
    ///
    /// Returns the aggregated `ortho_config` error when any layer is invalid.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the daemon serves on.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Directory holding compiled module interfaces.
    #[must_use]
    pub fn repo_dir(&self) -> &Utf8Path {
        &self.repo_dir
    }

    /// Suffix appended to CMI names.
    #[must_use]
    pub fn cmi_suffix(&self) -> &str {
        &self.cmi_suffix
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log line format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.telemetry_format
    }
}
