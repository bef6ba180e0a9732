//! Protocol configuration.
//!
//! Loads the chain, EIP-712 domain and gas parameters from a TOML file with
//! support for environment variable expansion in string values. Variables use
//! `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! chain = "rsk-testnet"
//!
//! [domain]
//! name = "RSK Enveloping Transaction"
//! version = "2"
//!
//! [gas]
//! safety_margin = 3000
//! tx_gas_limit = 6800000
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `enveloping.toml`)
//! - `CHAIN` - Override the configured chain (network name or CAIP-2 id)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chain::{ChainId, ChainIdFormatError};

/// Default EIP-712 domain name for relay and deploy requests.
pub const DEFAULT_DOMAIN_NAME: &str = "RSK Enveloping Transaction";

/// Default EIP-712 domain version for relay and deploy requests.
pub const DEFAULT_DOMAIN_VERSION: &str = "2";

/// Top-level protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Chain the wallets live on, as a network name or CAIP-2 id.
    #[serde(default = "default_chain")]
    pub chain: ChainId,

    /// EIP-712 domain parameters shared by every wallet.
    #[serde(default)]
    pub domain: DomainConfig,

    /// Gas accounting parameters.
    #[serde(default)]
    pub gas: GasConfig,
}

/// EIP-712 domain name and version.
///
/// Chain id and verifying contract are per-wallet and are not configured here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name (default: `RSK Enveloping Transaction`).
    #[serde(default = "default_domain_name")]
    pub name: String,

    /// Domain version (default: `2`).
    #[serde(default = "default_domain_version")]
    pub version: String,
}

/// Gas parameters applied by wallets and the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasConfig {
    /// Extra gas a wallet must hold beyond a request's declared `gas` before
    /// it forwards the call.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u64,

    /// Gas limit given to transactions that don't set one.
    #[serde(default = "default_tx_gas_limit")]
    pub tx_gas_limit: u64,
}

/// Errors that can occur while loading a [`ProtocolConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The `CHAIN` override is not a known network or CAIP-2 id.
    #[error(transparent)]
    Chain(#[from] ChainIdFormatError),
}

fn default_chain() -> ChainId {
    ChainId::eip155(33)
}

fn default_domain_name() -> String {
    DEFAULT_DOMAIN_NAME.to_owned()
}

fn default_domain_version() -> String {
    DEFAULT_DOMAIN_VERSION.to_owned()
}

const fn default_safety_margin() -> u64 {
    3_000
}

const fn default_tx_gas_limit() -> u64 {
    6_800_000
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: default_domain_name(),
            version: default_domain_version(),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            safety_margin: default_safety_margin(),
            tx_gas_limit: default_tx_gas_limit(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            domain: DomainConfig::default(),
            gas: GasConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `enveloping.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "enveloping.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults. After loading, `$VAR` / `${VAR}`
    /// references are expanded from the process environment and the `CHAIN`
    /// env var overrides the file value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };

        let expanded = expand_vars(&content, |name| std::env::var(name).ok());
        let mut config = Self::from_toml_str(&expanded)?;

        if let Ok(chain) = std::env::var("CHAIN") {
            config.chain = ChainId::resolve(&chain)?;
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!(chain = %config.chain, path, "loaded protocol config");

        Ok(config)
    }

    /// Parses configuration from a TOML string without env expansion.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the input doesn't match the schema.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables, empty names and an unterminated `${` are copied
/// through unchanged.
fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let (name, taken) = match after.strip_prefix('{') {
            Some(braced) => braced
                .find('}')
                .map_or(("", 0), |end| (&braced[..end], end + 2)),
            None => {
                let end = after
                    .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };
        let value = if name.is_empty() { None } else { lookup(name) };
        match value {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[at..=at + taken]),
        }
        rest = &after[taken..];
    }

    out.push_str(rest);
    out
}
