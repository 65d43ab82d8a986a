//! Where the daemon listens for compiler connections.

use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

/// Declarative configuration for the daemon endpoint.
///
/// Configuration files may spell the endpoint either as a table
/// (`{ transport = "unix", path = "/run/modmap.sock" }`) or as the same text
/// accepted on the command line (`unix:///run/modmap.sock`, `stdio`).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Unix domain socket accepting any number of compiler connections.
    Unix {
        /// Filesystem location of the socket.
        path: Utf8PathBuf,
    },
    /// A single session over the daemon's standard input and output.
    Stdio,
}

impl SocketEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Returns the socket path when the endpoint uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Stdio => None,
        }
    }

    /// Ensures the socket's parent directory exists with owner-only access.
    ///
    /// # Errors
    ///
    /// Fails when the path has no parent or the directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Err(SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Stdio => formatter.write_str("stdio"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input == "stdio" || input == "-" {
            return Ok(Self::Stdio);
        }
        let url = Url::parse(input)?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(SocketParseError::MissingUnixPath(input.to_owned()));
                }
                Ok(Self::unix(path))
            }
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
enum TaggedEndpoint {
    Unix { path: Utf8PathBuf },
    Stdio,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointRepr {
    Text(String),
    Table(TaggedEndpoint),
}

impl<'de> Deserialize<'de> for SocketEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match EndpointRepr::deserialize(deserializer)? {
            EndpointRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            EndpointRepr::Table(TaggedEndpoint::Unix { path }) => Ok(Self::Unix { path }),
            EndpointRepr::Table(TaggedEndpoint::Stdio) => Ok(Self::Stdio),
        }
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was not recognised.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path has no parent directory to create.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Socket path as configured.
        path: Utf8PathBuf,
    },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    #[case::unix("unix:///tmp/modmapd.sock", SocketEndpoint::unix("/tmp/modmapd.sock"))]
    #[case::stdio("stdio", SocketEndpoint::Stdio)]
    #[case::dash("-", SocketEndpoint::Stdio)]
    fn parses_endpoints(#[case] input: &str, #[case] expected: SocketEndpoint) {
        assert_eq!(input.parse::<SocketEndpoint>().expect("valid endpoint"), expected);
    }

    #[rstest]
    #[case::tcp("tcp://127.0.0.1:9000")]
    #[case::bare_unix("unix://")]
    #[case::not_a_url("modmapd.sock")]
    fn rejects_unsupported_endpoints(#[case] input: &str) {
        assert!(input.parse::<SocketEndpoint>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let endpoint = SocketEndpoint::unix("/run/user/1000/modmap/modmapd.sock");
        assert_eq!(endpoint.to_string(), "unix:///run/user/1000/modmap/modmapd.sock");
        assert_eq!(
            endpoint.to_string().parse::<SocketEndpoint>().expect("parse"),
            endpoint
        );
        assert_eq!(SocketEndpoint::Stdio.to_string(), "stdio");
    }

    #[test]
    fn prepare_filesystem_creates_private_parent() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 temp path");
        let endpoint = SocketEndpoint::unix(root.join("nested/dir/modmapd.sock"));

        endpoint.prepare_filesystem().expect("prepare");
        let parent = root.join("nested/dir");
        assert!(parent.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&parent).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn prepare_filesystem_rejects_bare_file_name() {
        let endpoint = SocketEndpoint::unix("modmapd.sock");
        assert!(matches!(
            endpoint.prepare_filesystem(),
            Err(SocketPreparationError::MissingParent { .. })
        ));
    }

    #[test]
    fn stdio_needs_no_preparation() {
        SocketEndpoint::Stdio.prepare_filesystem().expect("nothing to do");
    }
}
