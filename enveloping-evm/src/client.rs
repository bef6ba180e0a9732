//! Off-chain request signing.
//!
//! [`RequestSigner`] is the requester's side of the protocol: it signs relay
//! and deploy requests with the typed-data digest wallets and factories
//! verify, and produces the wire envelopes a relay worker submits.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use enveloping::config::ProtocolConfig;
use serde::{Deserialize, Serialize};

use crate::chain::{Eip155ChainReference, UnsupportedChainError};
use crate::codec::TypedRequestCodec;
use crate::types::{DeployRelayRequest, DeployRequest, ForwardRequest, RelayRequest};

/// Something that can sign digests for an address.
pub trait SignerLike: Send + Sync {
    /// Address of the signer.
    fn address(&self) -> Address;

    /// Signs a 32-byte digest.
    fn sign_hash(
        &self,
        hash: &B256,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

impl<T: SignerLike + Send + Sync> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// Errors raised while preparing a request.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying signer failed.
    #[error("Signing failed: {0}")]
    Signing(#[from] alloy_signer::Error),
    /// The request names a different sender than the signer.
    #[error("Request is from {request}, but the signer is {signer}")]
    SignerMismatch {
        /// Sender named by the request.
        request: Address,
        /// Address of the signer.
        signer: Address,
    },
}

/// A relay request ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRelayRequest {
    /// The full typed request.
    pub request: RelayRequest,
    /// Encoded fields past the fixed ones.
    pub suffix_data: Bytes,
    /// 65-byte signature over the request digest.
    pub signature: Bytes,
}

impl SignedRelayRequest {
    /// Fixed fields passed to the wallet.
    #[must_use]
    pub fn forward_request(&self) -> ForwardRequest {
        self.request.forward_request()
    }
}

/// A deploy request ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedDeployRequest {
    /// The full typed request.
    pub request: DeployRelayRequest,
    /// Encoded fields past the fixed ones.
    pub suffix_data: Bytes,
    /// 65-byte signature over the request digest.
    pub signature: Bytes,
}

impl SignedDeployRequest {
    /// Fixed fields passed to the factory.
    #[must_use]
    pub fn deploy_request(&self) -> DeployRequest {
        self.request.deploy_request()
    }
}

/// Signs requests for one chain and protocol domain.
#[derive(Debug, Clone)]
pub struct RequestSigner<S> {
    signer: S,
    codec: TypedRequestCodec,
    chain_id: u64,
}

impl<S: SignerLike> RequestSigner<S> {
    /// Creates a signer for `chain_id` using `codec`'s domain.
    #[must_use]
    pub const fn new(signer: S, codec: TypedRequestCodec, chain_id: u64) -> Self {
        Self {
            signer,
            codec,
            chain_id,
        }
    }

    /// Creates a signer for the configured chain and domain.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedChainError`] if the configured chain is not `eip155`.
    pub fn from_config(signer: S, config: &ProtocolConfig) -> Result<Self, UnsupportedChainError> {
        let chain = Eip155ChainReference::try_from(&config.chain)?;
        Ok(Self::new(
            signer,
            TypedRequestCodec::new(&config.domain),
            chain.inner(),
        ))
    }

    /// Address requests are signed by.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Numeric chain id signatures are bound to.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn ensure_sender(&self, from: Address) -> Result<(), ClientError> {
        let signer = self.signer.address();
        if from == signer {
            Ok(())
        } else {
            Err(ClientError::SignerMismatch {
                request: from,
                signer,
            })
        }
    }

    /// Signs `request` for the wallet named by `relayData.callForwarder`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SignerMismatch`] if `request.from` is not the
    /// signer, or [`ClientError::Signing`] if signing fails.
    pub async fn sign_relay(&self, request: RelayRequest) -> Result<SignedRelayRequest, ClientError> {
        self.ensure_sender(request.from)?;
        let wallet = request.relayData.callForwarder;
        let separator = self.codec.domain_separator(self.chain_id, wallet);
        let suffix_data = TypedRequestCodec::relay_suffix(&request);
        let digest = self
            .codec
            .relay_digest(separator, &request.forward_request(), &suffix_data);
        let signature = self.signer.sign_hash(&digest).await?;
        Ok(SignedRelayRequest {
            request,
            suffix_data,
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        })
    }

    /// Signs `request` for the wallet it will deploy at `wallet`.
    ///
    /// # Errors
    ///
    /// See [`Self::sign_relay`].
    pub async fn sign_deploy(
        &self,
        request: DeployRelayRequest,
        wallet: Address,
    ) -> Result<SignedDeployRequest, ClientError> {
        self.ensure_sender(request.from)?;
        let separator = self.codec.domain_separator(self.chain_id, wallet);
        let suffix_data = TypedRequestCodec::deploy_suffix(&request);
        let digest = self
            .codec
            .deploy_digest(separator, &request.deploy_request(), &suffix_data);
        let signature = self.signer.sign_hash(&digest).await?;
        Ok(SignedDeployRequest {
            request,
            suffix_data,
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        })
    }

    /// Signs the personal message authorizing the factory at `factory` to
    /// create the signer's wallet.
    ///
    /// `extra_params_hash` is the wallet variant's hash of its init extras,
    /// as returned by [`crate::wallet::Forwarder::extra_params_hash`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Signing`] if signing fails.
    pub async fn sign_wallet_creation(
        &self,
        factory: Address,
        recoverer: Address,
        index: U256,
        extra_params_hash: Option<B256>,
    ) -> Result<Bytes, ClientError> {
        let digest = TypedRequestCodec::create_wallet_digest(
            factory,
            self.signer.address(),
            recoverer,
            extra_params_hash,
            index,
        );
        let signature = self.signer.sign_hash(&digest).await?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}
