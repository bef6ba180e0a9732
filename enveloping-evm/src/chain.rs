//! EVM chain primitives.
//!
//! Bridges the CAIP-2 [`ChainId`] used in configuration to the numeric
//! EIP-155 chain id that goes into every EIP-712 domain.

use std::fmt;

use enveloping::chain::ChainId;

/// A numeric EIP-155 chain id (e.g., 30 for RSK Mainnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Eip155ChainReference(u64);

impl Eip155ChainReference {
    /// Wraps a raw EIP-155 chain id.
    #[must_use]
    pub const fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    /// Returns the numeric chain id.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// Returns the CAIP-2 form of this chain.
    #[must_use]
    pub fn as_chain_id(&self) -> ChainId {
        ChainId::eip155(self.0)
    }
}

impl fmt::Display for Eip155ChainReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eip155:{}", self.0)
    }
}

/// Error returned when a [`ChainId`] is not a numeric `eip155` chain.
#[derive(Debug, thiserror::Error)]
#[error("Chain {0} is not an eip155 chain")]
pub struct UnsupportedChainError(ChainId);

impl TryFrom<&ChainId> for Eip155ChainReference {
    type Error = UnsupportedChainError;

    fn try_from(chain_id: &ChainId) -> Result<Self, Self::Error> {
        if chain_id.namespace() != "eip155" {
            return Err(UnsupportedChainError(chain_id.clone()));
        }
        chain_id
            .reference()
            .parse()
            .map(Self)
            .map_err(|_| UnsupportedChainError(chain_id.clone()))
    }
}

impl From<Eip155ChainReference> for ChainId {
    fn from(value: Eip155ChainReference) -> Self {
        value.as_chain_id()
    }
}
