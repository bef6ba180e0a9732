//! Networks the smart-wallet contracts are deployed to.
//!
//! Every Enveloping deployment lives on an EVM chain, so a [`Network`] is
//! just a name bound to a numeric EIP-155 chain id. [`NetworkTable`] resolves
//! names like `"rsk-testnet"` to `eip155:31` and back; the built-in table is
//! available through [`chain_id_by_network_name`] and
//! [`network_name_by_chain_id`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::chain::ChainId;

/// A named EVM network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    /// Name used in configuration files (e.g. `"rsk-mainnet"`).
    pub name: &'static str,
    /// Numeric EIP-155 chain id.
    pub chain: u64,
}

impl Network {
    /// CAIP-2 identifier of this network.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        ChainId::eip155(self.chain)
    }
}

/// RSK mainnet.
pub const RSK_MAINNET: Network = Network {
    name: "rsk-mainnet",
    chain: 30,
};

/// RSK testnet.
pub const RSK_TESTNET: Network = Network {
    name: "rsk-testnet",
    chain: 31,
};

/// Local RSK node in regtest mode.
pub const RSK_REGTEST: Network = Network {
    name: "rsk-regtest",
    chain: 33,
};

/// Hardhat development network.
pub const HARDHAT: Network = Network {
    name: "hardhat",
    chain: 31337,
};

/// Networks known out of the box.
pub const KNOWN_NETWORKS: &[Network] = &[RSK_MAINNET, RSK_TESTNET, RSK_REGTEST, HARDHAT];

static BUILT_IN: LazyLock<NetworkTable> = LazyLock::new(|| NetworkTable::from(KNOWN_NETWORKS));

/// Two-way lookup between network names and chain ids.
///
/// Registering a name or chain id twice keeps the latest entry.
#[derive(Debug, Clone, Default)]
pub struct NetworkTable {
    by_name: BTreeMap<&'static str, ChainId>,
    by_chain: BTreeMap<u64, &'static str>,
}

impl NetworkTable {
    /// Adds `network` to the table.
    pub fn insert(&mut self, network: Network) {
        self.by_name.insert(network.name, network.chain_id());
        self.by_chain.insert(network.chain, network.name);
    }

    /// Adds `networks` and returns the table.
    #[must_use]
    pub fn with(mut self, networks: &[Network]) -> Self {
        for network in networks {
            self.insert(*network);
        }
        self
    }

    /// Chain id registered under `name`.
    #[must_use]
    pub fn chain_id(&self, name: &str) -> Option<&ChainId> {
        self.by_name.get(name)
    }

    /// Name registered for `chain_id`. Only `eip155` ids can match.
    #[must_use]
    pub fn name(&self, chain_id: &ChainId) -> Option<&'static str> {
        if chain_id.namespace() != "eip155" {
            return None;
        }
        let chain = chain_id.reference().parse::<u64>().ok()?;
        self.by_chain.get(&chain).copied()
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl From<&[Network]> for NetworkTable {
    fn from(networks: &[Network]) -> Self {
        Self::default().with(networks)
    }
}

/// Looks up a chain id in the built-in table.
#[must_use]
pub fn chain_id_by_network_name(name: &str) -> Option<&'static ChainId> {
    BUILT_IN.chain_id(name)
}

/// Looks up a network name in the built-in table.
#[must_use]
pub fn network_name_by_chain_id(chain_id: &ChainId) -> Option<&'static str> {
    BUILT_IN.name(chain_id)
}
