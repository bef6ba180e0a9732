//! Typed-data hashing for relay and deploy requests.
//!
//! A request digest follows EIP-712, but the struct hash is assembled from two
//! parts so that the verifying side only has to understand the fixed fields:
//!
//! ```text
//! digest = keccak256(0x1901 ‖ domainSeparator ‖ keccak256(typeHash ‖ encodeData(fixed) ‖ suffix))
//! ```
//!
//! `suffix` is the remainder of the full EIP-712 `encodeData` after the fixed
//! fields. Requesters compute it off-chain from the complete typed structure
//! ([`TypedRequestCodec::relay_suffix`]); wallets and factories only feed it
//! back into the hash. Adding fields to a request schema therefore changes
//! the type hash and the suffix, never the verification code.
//!
//! Self-service wallet creation uses a lighter EIP-191 personal-sign message
//! instead (see [`TypedRequestCodec::create_wallet_digest`]).

use alloy_primitives::{Address, B256, Bytes, Signature, U256, eip191_hash_message, keccak256};
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};
use enveloping::config::DomainConfig;

use crate::error::ForwarderError;
use crate::types::{DeployRelayRequest, DeployRequest, ForwardRequest, RelayRequest};

/// Builds domain separators and request digests for one protocol domain.
///
/// The domain name and version come from configuration; chain id and
/// verifying contract are supplied per call, so one codec serves every
/// wallet on every chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedRequestCodec {
    name: String,
    version: String,
    relay_type_hash: B256,
    deploy_type_hash: B256,
}

impl Default for TypedRequestCodec {
    fn default() -> Self {
        Self::new(&DomainConfig::default())
    }
}

impl TypedRequestCodec {
    /// Creates a codec for the configured domain name and version.
    #[must_use]
    pub fn new(domain: &DomainConfig) -> Self {
        Self {
            name: domain.name.clone(),
            version: domain.version.clone(),
            relay_type_hash: keccak256(RelayRequest::eip712_encode_type().as_bytes()),
            deploy_type_hash: keccak256(DeployRelayRequest::eip712_encode_type().as_bytes()),
        }
    }

    /// Domain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Domain version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Type hash of [`RelayRequest`].
    #[must_use]
    pub const fn relay_type_hash(&self) -> B256 {
        self.relay_type_hash
    }

    /// Type hash of [`DeployRelayRequest`].
    #[must_use]
    pub const fn deploy_type_hash(&self) -> B256 {
        self.deploy_type_hash
    }

    /// The EIP-712 domain of a wallet (or predicted wallet) on `chain_id`.
    #[must_use]
    pub fn domain(&self, chain_id: u64, verifying_contract: Address) -> Eip712Domain {
        eip712_domain! {
            name: self.name.clone(),
            version: self.version.clone(),
            chain_id: chain_id,
            verifying_contract: verifying_contract,
        }
    }

    /// Hash of [`Self::domain`].
    #[must_use]
    pub fn domain_separator(&self, chain_id: u64, verifying_contract: Address) -> B256 {
        self.domain(chain_id, verifying_contract).separator()
    }

    /// Digest a relay request signature must cover.
    #[must_use]
    pub fn relay_digest(
        &self,
        domain_separator: B256,
        request: &ForwardRequest,
        suffix: &[u8],
    ) -> B256 {
        digest(
            domain_separator,
            self.relay_type_hash,
            &request.eip712_encode_data(),
            suffix,
        )
    }

    /// Digest a deploy request signature must cover.
    #[must_use]
    pub fn deploy_digest(
        &self,
        domain_separator: B256,
        request: &DeployRequest,
        suffix: &[u8],
    ) -> B256 {
        digest(
            domain_separator,
            self.deploy_type_hash,
            &request.eip712_encode_data(),
            suffix,
        )
    }

    /// Suffix of a full relay request: its encoded fields past the fixed ones.
    #[must_use]
    pub fn relay_suffix(request: &RelayRequest) -> Bytes {
        let fixed = request.forward_request().eip712_encode_data().len();
        Bytes::from(request.eip712_encode_data().split_off(fixed))
    }

    /// Suffix of a full deploy request: its encoded fields past the fixed ones.
    #[must_use]
    pub fn deploy_suffix(request: &DeployRelayRequest) -> Bytes {
        let fixed = request.deploy_request().eip712_encode_data().len();
        Bytes::from(request.eip712_encode_data().split_off(fixed))
    }

    /// Personal-sign digest authorizing a self-service wallet creation.
    ///
    /// The message is `keccak256(factory ‖ owner ‖ recoverer ‖ [extraParamsHash] ‖ index)`,
    /// tightly packed, wrapped in the EIP-191 `\x19Ethereum Signed Message` prefix.
    #[must_use]
    pub fn create_wallet_digest(
        factory: Address,
        owner: Address,
        recoverer: Address,
        extra_params_hash: Option<B256>,
        index: U256,
    ) -> B256 {
        let mut packed = Vec::with_capacity(3 * 20 + 2 * 32);
        packed.extend_from_slice(factory.as_slice());
        packed.extend_from_slice(owner.as_slice());
        packed.extend_from_slice(recoverer.as_slice());
        if let Some(extra) = extra_params_hash {
            packed.extend_from_slice(extra.as_slice());
        }
        packed.extend_from_slice(&index.to_be_bytes::<32>());
        eip191_hash_message(keccak256(&packed))
    }

    /// Recovers the signer of `digest` from a 65-byte signature.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::SignatureMismatch`] if the signature is
    /// malformed or recovery fails.
    pub fn recover_signer(digest: B256, signature: &[u8]) -> Result<Address, ForwarderError> {
        let signature =
            Signature::from_raw(signature).map_err(|_| ForwarderError::SignatureMismatch)?;
        signature
            .recover_address_from_prehash(&digest)
            .map_err(|_| ForwarderError::SignatureMismatch)
    }
}

fn digest(domain_separator: B256, type_hash: B256, fixed: &[u8], suffix: &[u8]) -> B256 {
    let mut encoded = Vec::with_capacity(32 + fixed.len() + suffix.len());
    encoded.extend_from_slice(type_hash.as_slice());
    encoded.extend_from_slice(fixed);
    encoded.extend_from_slice(suffix);
    let struct_hash = keccak256(&encoded);

    let mut message = [0u8; 66];
    message[..2].copy_from_slice(&[0x19, 0x01]);
    message[2..34].copy_from_slice(domain_separator.as_slice());
    message[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(message)
}
