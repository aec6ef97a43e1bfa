//! `sealtrail.toml` loading.
//!
//! ```toml
//! [store]
//! path = "/var/lib/sealtrail/audit.jsonl"
//!
//! [authority]
//! key_file = "/etc/sealtrail/trust_root.key"
//! allow_ephemeral = false
//! ```
//!
//! Every table and key is optional.  Command-line flags override file values.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use sealtrail_consent::AuthorityConfig;
use sealtrail_contracts::error::{SealError, SealResult};

/// Store path used when neither the config file nor `--store` names one.
pub const DEFAULT_STORE_PATH: &str = "audit.jsonl";

/// Config file read from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "sealtrail.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub authority: AuthorityConfig,
}

impl CliConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `SealError::ConfigError` if the TOML is malformed or contains
    /// unknown tables or keys.
    pub fn from_toml_str(s: &str) -> SealResult<Self> {
        toml::from_str(s).map_err(|e| SealError::ConfigError {
            reason: format!("failed to parse sealtrail config: {}", e),
        })
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> SealResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SealError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load `explicit` if given; otherwise `sealtrail.toml` in the working
    /// directory if present; otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> SealResult<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
