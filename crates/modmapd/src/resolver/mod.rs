//! Request handling for the module mapper protocol.
//!
//! A [`Resolver`] answers one decoded request at a time by calling back into
//! a [`Peer`]. Every provided method emits exactly one response, so a
//! resolver that overrides only the hooks it cares about still keeps the
//! connection in step. The handshake may hand back a different resolver,
//! which then serves every later request on that connection.

mod names;
mod peer;

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tracing::debug;

use modmap_config::{Config, DEFAULT_CMI_SUFFIX, DEFAULT_REPO_DIR};

pub use names::cmi_name;
pub use peer::Peer;

/// Highest protocol version this daemon speaks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Name reported in handshake replies by resolvers that do not override
/// [`Resolver::agent_name`].
pub const DEFAULT_AGENT: &str = "default";

const RESOLVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::resolver");

/// Answers module mapper requests.
pub trait Resolver: Send + Sync {
    /// Name reported when acknowledging a handshake.
    fn agent_name(&self) -> &str {
        DEFAULT_AGENT
    }

    /// Directory holding compiled module interfaces.
    fn repo_dir(&self) -> &Utf8Path {
        Utf8Path::new(DEFAULT_REPO_DIR)
    }

    /// Suffix appended to CMI names.
    fn cmi_suffix(&self) -> &str {
        DEFAULT_CMI_SUFFIX
    }

    /// Repository file name for a module or header.
    fn cmi_name(&self, name: &str) -> String {
        names::cmi_name(name, self.cmi_suffix())
    }

    /// Whether the repository holds a regular file called `cmi`.
    fn cmi_exists(&self, cmi: &str) -> bool {
        repository_holds(self.repo_dir(), cmi)
    }

    /// Handles `HELLO version agent ident`.
    ///
    /// Refuses peers speaking a newer protocol. A returned resolver replaces
    /// this one for the rest of the connection, but only once the handshake
    /// has been acknowledged.
    fn connect_request(
        &self,
        peer: &mut dyn Peer,
        version: u32,
        _agent: &str,
        _ident: &str,
    ) -> Option<Arc<dyn Resolver>> {
        if version > PROTOCOL_VERSION {
            peer.error_response("version mismatch");
        } else {
            peer.connect_response(version, self.agent_name());
        }
        None
    }

    /// Handles `MODULE-REPO`.
    fn module_repo_request(&self, peer: &mut dyn Peer) {
        peer.module_repo_response(self.repo_dir().as_str());
    }

    /// Handles `MODULE-EXPORT module`.
    fn module_export_request(&self, peer: &mut dyn Peer, module: &str) {
        peer.module_cmi_response(&self.cmi_name(module));
    }

    /// Handles `MODULE-IMPORT module`.
    fn module_import_request(&self, peer: &mut dyn Peer, module: &str) {
        peer.module_cmi_response(&self.cmi_name(module));
    }

    /// Handles `MODULE-COMPILED module`.
    fn module_compiled_request(&self, peer: &mut dyn Peer, _module: &str) {
        peer.ok_response();
    }

    /// Handles `INCLUDE-TRANSLATE header`.
    ///
    /// Answers with the CMI name when the repository already holds it as a
    /// regular file, otherwise asks for textual inclusion.
    fn include_translate_request(&self, peer: &mut dyn Peer, include: &str) {
        let cmi = self.cmi_name(include);
        if self.cmi_exists(&cmi) {
            peer.module_cmi_response(&cmi);
        } else {
            peer.include_text_response();
        }
    }

    /// Reports a request that could not be served.
    fn error_response(&self, peer: &mut dyn Peer, message: &str) {
        peer.error_response(message);
    }

    /// Called after a batch of requests has been answered and before the
    /// replies are flushed.
    fn wait_until_ready(&self, _peer: &mut dyn Peer) {}
}

/// Resolver serving the configured repository with the stock behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultResolver {
    repo_dir: Utf8PathBuf,
    cmi_suffix: String,
}

impl DefaultResolver {
    /// Builds a resolver for `repo_dir`, naming interfaces with `cmi_suffix`.
    #[must_use]
    pub fn new(repo_dir: impl Into<Utf8PathBuf>, cmi_suffix: impl Into<String>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            cmi_suffix: cmi_suffix.into(),
        }
    }

    /// Builds a resolver from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.repo_dir(), config.cmi_suffix())
    }
}

impl Default for DefaultResolver {
    fn default() -> Self {
        Self::new(DEFAULT_REPO_DIR, DEFAULT_CMI_SUFFIX)
    }
}

impl Resolver for DefaultResolver {
    fn repo_dir(&self) -> &Utf8Path {
        &self.repo_dir
    }

    fn cmi_suffix(&self) -> &str {
        &self.cmi_suffix
    }
}

/// Checks for a regular file called `cmi` beneath `repo`.
///
/// The lookup is confined to `repo`; names that would leave it are treated as
/// absent. Readability is not checked.
#[must_use]
pub fn repository_holds(repo: &Utf8Path, cmi: &str) -> bool {
    let dir = match Dir::open_ambient_dir(repo, ambient_authority()) {
        Ok(dir) => dir,
        Err(error) => {
            debug!(
                target: RESOLVER_TARGET,
                repo = %repo,
                %error,
                "module repository unavailable"
            );
            return false;
        }
    };
    match dir.metadata(cmi) {
        Ok(metadata) => metadata.is_file(),
        Err(error) => {
            debug!(
                target: RESOLVER_TARGET,
                repo = %repo,
                cmi,
                %error,
                "no compiled interface"
            );
            false
        }
    }
}
