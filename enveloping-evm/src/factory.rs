//! Deterministic deployment of smart wallets.
//!
//! A factory deploys EIP-1167 minimal proxies of one wallet template with
//! CREATE2, so a wallet's address is known (and can be funded) before it
//! exists:
//!
//! ```text
//! salt    = keccak256(owner ‖ recoverer ‖ [extraParamsHash] ‖ index)
//! address = create2(factory, salt, keccak256(proxyInitCode(template)))
//! ```
//!
//! Wallets are created either by the owner in person
//! ([`SmartWalletFactory::create_user_smart_wallet`]) or by a relay worker
//! carrying a signed deploy request
//! ([`SmartWalletFactory::relayed_user_smart_wallet_creation`]), in which case
//! the worker is paid from the predicted address's balance in the same
//! transaction.

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256, hex, keccak256};
use alloy_sol_types::{SolCall, SolEvent, SolInterface};
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::codec::TypedRequestCodec;
use crate::error::ForwarderError;
use crate::ledger::{Contract, Frame, VmError, gas};
use crate::types::{DeployRequest, ISmartWalletFactory};
use crate::wallet::{Forwarder, InitExtra, InitParams, saturating_u64};

const PROXY_PREFIX: [u8; 20] = hex!("3d602d80600a3d3981f3363d3d373d3d3d363d73");
const PROXY_SUFFIX: [u8; 15] = hex!("5af43d82803e903d91602b57fd5bf3");

/// EIP-1167 creation code of a proxy forwarding to `template`.
#[must_use]
pub fn proxy_init_code(template: Address) -> Vec<u8> {
    let mut code = Vec::with_capacity(PROXY_PREFIX.len() + 20 + PROXY_SUFFIX.len());
    code.extend_from_slice(&PROXY_PREFIX);
    code.extend_from_slice(template.as_slice());
    code.extend_from_slice(&PROXY_SUFFIX);
    code
}

/// Deploys wallets of variant `W` at counterfactual addresses.
#[derive(Debug)]
pub struct SmartWalletFactory<W> {
    address: Address,
    template: Address,
    wallet: Arc<W>,
}

impl<W> Clone for SmartWalletFactory<W> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            template: self.template,
            wallet: Arc::clone(&self.wallet),
        }
    }
}

impl<W: Forwarder + 'static> SmartWalletFactory<W> {
    /// Creates a factory living at `address` that deploys proxies of the
    /// template at `template`, whose code is `wallet`.
    #[must_use]
    pub fn new(address: Address, template: Address, wallet: W) -> Self {
        Self {
            address,
            template,
            wallet: Arc::new(wallet),
        }
    }

    /// Address the factory lives at.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Address of the wallet template.
    #[must_use]
    pub const fn template(&self) -> Address {
        self.template
    }

    /// The wallet variant this factory deploys.
    #[must_use]
    pub const fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    /// CREATE2 salt of a wallet.
    #[must_use]
    pub fn salt(
        owner: Address,
        recoverer: Address,
        extra_params_hash: Option<B256>,
        index: U256,
    ) -> B256 {
        let mut packed = Vec::with_capacity(2 * 20 + 2 * 32);
        packed.extend_from_slice(owner.as_slice());
        packed.extend_from_slice(recoverer.as_slice());
        if let Some(extra) = extra_params_hash {
            packed.extend_from_slice(extra.as_slice());
        }
        packed.extend_from_slice(&index.to_be_bytes::<32>());
        keccak256(&packed)
    }

    /// Hash of the proxy creation code.
    #[must_use]
    pub fn init_code_hash(&self) -> B256 {
        keccak256(proxy_init_code(self.template))
    }

    /// Address of the wallet for `(owner, recoverer, index)`, deployed or not.
    #[must_use]
    pub fn compute_address(&self, owner: Address, recoverer: Address, index: U256) -> Address {
        self.compute_address_with(owner, recoverer, index, None)
    }

    /// Like [`Self::compute_address`], for variants whose salt also covers
    /// their init parameters.
    #[must_use]
    pub fn compute_address_with(
        &self,
        owner: Address,
        recoverer: Address,
        index: U256,
        extra_params_hash: Option<B256>,
    ) -> Address {
        let salt = Self::salt(owner, recoverer, extra_params_hash, index);
        self.address.create2(salt, self.init_code_hash())
    }

    /// Deploys the wallet of `owner` on the owner's own signature.
    ///
    /// `extra` carries variant-specific init parameters, such as the logic a
    /// [`CustomSmartWallet`](crate::wallet::CustomSmartWallet) attaches; pass
    /// [`InitExtra::None`] for plain wallets. When the variant hashes `extra`
    /// into its salt, the same hash is part of the signed message.
    ///
    /// `signature` is a personal-sign signature by `owner` over
    /// [`TypedRequestCodec::create_wallet_digest`]. The wallet is initialized
    /// without any fee.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::SignatureMismatch`] for anyone else's
    /// signature and [`ForwarderError::AlreadyDeployed`] when the wallet
    /// exists.
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        factory = %self.address,
        %owner,
        %index,
    )))]
    pub fn create_user_smart_wallet(
        &self,
        frame: &mut Frame<'_>,
        owner: Address,
        recoverer: Address,
        index: U256,
        extra: InitExtra,
        signature: &[u8],
    ) -> Result<Address, ForwarderError> {
        let extra_hash = self.wallet.extra_params_hash(&extra);
        let digest = TypedRequestCodec::create_wallet_digest(
            self.address,
            owner,
            recoverer,
            extra_hash,
            index,
        );
        frame.charge(gas::ECRECOVER)?;
        if TypedRequestCodec::recover_signer(digest, signature)? != owner {
            return Err(ForwarderError::SignatureMismatch);
        }
        let salt = Self::salt(owner, recoverer, extra_hash, index);
        self.deploy(frame, salt, InitParams::new(owner).with_extra(extra))
    }

    /// Deploys a wallet on behalf of `request.from`, paying `fees_receiver`.
    ///
    /// The request is signed against the EIP-712 domain of the wallet being
    /// deployed. Its `nonce` is covered by the signature but not tracked:
    /// replaying a deployment fails because the address already holds code.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::InvalidCaller`], [`ForwarderError::Expired`],
    /// [`ForwarderError::SignatureMismatch`],
    /// [`ForwarderError::AlreadyDeployed`], or whatever the wallet's
    /// initialization fails with.
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        factory = %self.address,
        from = %request.from,
        index = %request.index,
    )))]
    pub fn relayed_user_smart_wallet_creation(
        &self,
        frame: &mut Frame<'_>,
        request: &DeployRequest,
        suffix: &[u8],
        fees_receiver: Address,
        signature: &[u8],
    ) -> Result<Address, ForwarderError> {
        if frame.caller() != request.relayHub {
            return Err(ForwarderError::InvalidCaller);
        }
        if frame
            .timestamp()
            .is_past(saturating_u64(request.validUntilTime))
        {
            return Err(ForwarderError::Expired);
        }

        let extra = self.wallet.init_extra(request);
        let extra_hash = self.wallet.extra_params_hash(&extra);
        let salt = Self::salt(request.from, request.recoverer, extra_hash, request.index);
        let wallet = self.address.create2(salt, self.init_code_hash());

        let codec = self.wallet.core().codec();
        let separator = codec.domain_separator(frame.chain_id(), wallet);
        let digest = codec.deploy_digest(separator, request, suffix);
        frame.charge(gas::ECRECOVER)?;
        if TypedRequestCodec::recover_signer(digest, signature)? != request.from {
            return Err(ForwarderError::SignatureMismatch);
        }

        let params = InitParams::new(request.from)
            .with_fee(
                request.tokenContract,
                fees_receiver,
                request.tokenAmount,
                request.tokenGas,
            )
            .with_extra(extra);
        self.deploy(frame, salt, params)
    }

    fn deploy(
        &self,
        frame: &mut Frame<'_>,
        salt: B256,
        params: InitParams,
    ) -> Result<Address, ForwarderError> {
        let address = self.address.create2(salt, self.init_code_hash());
        if frame.has_code(address) {
            return Err(ForwarderError::AlreadyDeployed(address));
        }
        let code: Arc<dyn Contract> = self.wallet.clone();
        frame.create(address, code)?;

        let wallet = Arc::clone(&self.wallet);
        frame.enter(address, U256::ZERO, u64::MAX, |sub| {
            wallet.initialize(sub, params)
        })?;

        let deployed = ISmartWalletFactory::Deployed {
            addr: address,
            salt: U256::from_be_bytes(salt.0),
        };
        frame.emit(deployed.encode_log_data())?;

        #[cfg(feature = "telemetry")]
        tracing::info!(wallet = %address, kind = %self.wallet.kind(), "wallet deployed");
        Ok(address)
    }
}

impl<W: Forwarder + 'static> Contract for SmartWalletFactory<W> {
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        use ISmartWalletFactory::ISmartWalletFactoryCalls as Calls;

        let call =
            Calls::abi_decode(input).map_err(|_| VmError::revert("SWF: unknown call"))?;
        let output = match call {
            Calls::getSmartWalletAddress_0(c) => {
                let address = self.compute_address(c.owner, c.recoverer, c.index);
                ISmartWalletFactory::getSmartWalletAddress_0Call::abi_encode_returns(&address)
            }
            Calls::getSmartWalletAddress_1(c) => {
                let address = self.compute_address_with(
                    c.owner,
                    c.recoverer,
                    c.index,
                    Some(c.extraParamsHash),
                );
                ISmartWalletFactory::getSmartWalletAddress_1Call::abi_encode_returns(&address)
            }
            Calls::createUserSmartWallet_0(c) => {
                self.create_user_smart_wallet(
                    frame,
                    c.owner,
                    c.recoverer,
                    c.index,
                    InitExtra::None,
                    &c.sig,
                )?;
                Vec::new()
            }
            Calls::createUserSmartWallet_1(c) => {
                let extra = InitExtra::Logic {
                    logic: c.logic,
                    init_params: c.initParams,
                };
                self.create_user_smart_wallet(
                    frame,
                    c.owner,
                    c.recoverer,
                    c.index,
                    extra,
                    &c.sig,
                )?;
                Vec::new()
            }
            Calls::relayedUserSmartWalletCreation(c) => {
                self.relayed_user_smart_wallet_creation(
                    frame,
                    &c.req,
                    &c.suffixData,
                    c.feesReceiver,
                    &c.sig,
                )?;
                Vec::new()
            }
        };
        Ok(output.into())
    }
}
