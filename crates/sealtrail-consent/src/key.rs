//! Secret-key sourcing for the consent token authority.
//!
//! Resolution order:
//!
//! 1. an explicit key in `AuthorityConfig::key`
//! 2. the contents of `AuthorityConfig::key_file`
//! 3. the environment variable named by `AuthorityConfig::key_env`
//! 4. a random 32-byte key for this process only, if `allow_ephemeral`
//!
//! Key material is the UTF-8 bytes of the configured string, so the base64
//! text printed by `generate_trust_root_key` callers can be used verbatim.
//! A source that is present but empty is a configuration error; it is never
//! silently skipped in favour of a later source.

use std::path::{Path, PathBuf};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sealtrail_contracts::error::{SealError, SealResult};

/// Environment variable consulted when no key is configured explicitly.
pub const DEFAULT_KEY_ENV: &str = "SEALTRAIL_TRUST_ROOT_KEY";

/// Length in bytes of a freshly generated trust root key.
pub const TRUST_ROOT_KEY_LEN: usize = 32;

/// Where the authority's key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Supplied directly in configuration.
    Explicit,
    /// Read from a key file.
    File(PathBuf),
    /// Read from the named environment variable.
    Env(String),
    /// Generated randomly for this process.  Tokens signed with it cannot
    /// be verified after restart.
    Ephemeral,
}

impl KeySource {
    /// True if the key does not outlive the process.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, KeySource::Ephemeral)
    }
}

/// A resolved secret key plus its provenance.
pub struct ResolvedKey {
    pub material: Vec<u8>,
    pub source: KeySource,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("material", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Configuration for constructing a `ConsentTokenAuthority`.
///
/// Deserializable so hosts can embed it in their own TOML config:
///
/// ```toml
/// [authority]
/// key_file = "/etc/sealtrail/trust_root.key"
/// allow_ephemeral = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorityConfig {
    /// Literal key material.
    #[serde(default)]
    pub key: Option<String>,

    /// Path to a file whose trimmed contents are the key.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Environment variable to fall back to.
    #[serde(default = "default_key_env")]
    pub key_env: String,

    /// Whether a random per-process key is acceptable when nothing else is
    /// configured.  Only suitable for development and tests.
    #[serde(default = "default_allow_ephemeral")]
    pub allow_ephemeral: bool,
}

fn default_key_env() -> String {
    DEFAULT_KEY_ENV.to_string()
}

fn default_allow_ephemeral() -> bool {
    true
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            key: None,
            key_file: None,
            key_env: default_key_env(),
            allow_ephemeral: default_allow_ephemeral(),
        }
    }
}

impl AuthorityConfig {
    /// Resolve the key using the process environment.
    pub fn resolve(&self) -> SealResult<ResolvedKey> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve the key using `lookup_env` in place of the process
    /// environment.
    pub fn resolve_with<F>(&self, lookup_env: F) -> SealResult<ResolvedKey>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = &self.key {
            return non_empty(key.as_bytes().to_vec(), KeySource::Explicit);
        }

        if let Some(path) = &self.key_file {
            let material = read_key_file(path)?;
            return non_empty(material, KeySource::File(path.clone()));
        }

        if let Some(value) = lookup_env(&self.key_env) {
            return non_empty(value.into_bytes(), KeySource::Env(self.key_env.clone()));
        }

        if !self.allow_ephemeral {
            return Err(SealError::ConfigError {
                reason: format!(
                    "no consent key configured: set '{}', a key file, or an explicit key",
                    self.key_env
                ),
            });
        }

        warn!(
            key_env = %self.key_env,
            "no consent key configured; generated an ephemeral key (tokens will not verify after restart)"
        );
        Ok(ResolvedKey {
            material: generate_trust_root_key().to_vec(),
            source: KeySource::Ephemeral,
        })
    }
}

fn non_empty(material: Vec<u8>, source: KeySource) -> SealResult<ResolvedKey> {
    if material.is_empty() {
        return Err(SealError::ConfigError {
            reason: format!("consent key from {:?} is empty", source),
        });
    }
    debug!(source = ?source, "consent key resolved");
    Ok(ResolvedKey { material, source })
}

fn read_key_file(path: &Path) -> SealResult<Vec<u8>> {
    let contents = std::fs::read_to_string(path).map_err(|e| SealError::ConfigError {
        reason: format!("failed to read key file '{}': {}", path.display(), e),
    })?;
    Ok(contents.trim().as_bytes().to_vec())
}

/// Generate a new trust root key from the operating system's CSPRNG.
///
/// Store the result outside the process (secrets manager, key file with
/// restrictive permissions) so tokens remain verifiable across restarts.
pub fn generate_trust_root_key() -> [u8; TRUST_ROOT_KEY_LEN] {
    let mut key = [0u8; TRUST_ROOT_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}
