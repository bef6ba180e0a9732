//! Smart wallets.
//!
//! A smart wallet is an owner-controlled account that executes requests the
//! owner signed off-chain and a relay worker submits on-chain. Every variant
//! follows the same two-state machine:
//!
//! ```text
//! Uninitialized --initialize--> Initialized
//! ```
//!
//! Once initialized a wallet accepts relayed [`Forwarder::execute`] calls from
//! the request's relay hub and direct [`Forwarder::direct_execute`] calls from
//! its owner. The variants differ only in how the worker's fee interleaves
//! with the destination call, which currencies they accept and how a failed
//! destination call is reported:
//!
//! | variant                     | fee order   | fees accepted  | empty revert          |
//! |-----------------------------|-------------|----------------|-----------------------|
//! | [`SmartWallet`]             | before call | token / native | empty                 |
//! | [`CustomSmartWallet`]       | before call | token / native | empty                 |
//! | [`MinimalBoltzSmartWallet`] | after call  | native only    | `"Unable to execute"` |
//!
//! The checks every variant shares live in [`WalletCore`]. Wallet state lives
//! in the ledger's wallet arena keyed by address, so a predicted address can
//! be reasoned about before any code is deployed there.

mod custom;
mod minimal;
mod smart;

#[cfg(test)]
mod conformance;

use std::fmt;

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolCall, SolInterface};
use enveloping::config::ProtocolConfig;
use serde::{Deserialize, Serialize};
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::codec::TypedRequestCodec;
use crate::error::ForwarderError;
use crate::fees::{self, NATIVE_TRANSFER_GAS, Payment, PaymentStage, SettlementMode};
use crate::ledger::{Contract, Frame, VmError, gas};
use crate::replay;
use crate::types::{DeployRequest, ForwardRequest, ISmartWallet};

pub use custom::CustomSmartWallet;
pub use minimal::MinimalBoltzSmartWallet;
pub use smart::SmartWallet;

/// Persistent state of one wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub(crate) owner: Address,
    pub(crate) nonce: U256,
    pub(crate) domain_separator: B256,
    pub(crate) initialized: bool,
    pub(crate) logic: Address,
}

impl WalletState {
    /// Owner set at initialization.
    #[must_use]
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// Nonce the next relayed request must carry.
    #[must_use]
    pub const fn nonce(&self) -> U256 {
        self.nonce
    }

    /// EIP-712 domain separator bound at initialization.
    #[must_use]
    pub const fn domain_separator(&self) -> B256 {
        self.domain_separator
    }

    /// Whether `initialize` has run.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Custom logic contract, or zero when none is attached.
    #[must_use]
    pub const fn logic(&self) -> Address {
        self.logic
    }
}

/// Which wallet variant a [`Forwarder`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletKind {
    /// [`SmartWallet`].
    Smart,
    /// [`CustomSmartWallet`].
    Custom,
    /// [`MinimalBoltzSmartWallet`].
    MinimalBoltz,
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smart => f.write_str("smart"),
            Self::Custom => f.write_str("custom"),
            Self::MinimalBoltz => f.write_str("minimal-boltz"),
        }
    }
}

/// Variant-specific initialization parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InitExtra {
    /// Nothing beyond the owner and the deployment fee.
    #[default]
    None,
    /// Logic contract a [`CustomSmartWallet`] delegates to, with its init data.
    Logic {
        /// Logic contract; zero attaches nothing.
        logic: Address,
        /// Passed to the logic's `initialize`.
        init_params: Bytes,
    },
    /// Call a [`MinimalBoltzSmartWallet`] makes while initializing.
    Call {
        /// Destination; zero skips the call.
        to: Address,
        /// Native value sent along.
        value: U256,
        /// Gas given to the call.
        gas: U256,
        /// Calldata.
        data: Bytes,
    },
}

/// Everything `initialize` needs.
///
/// Extras a variant has no use for are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitParams {
    /// Wallet owner.
    pub owner: Address,
    /// Token the deployment fee is paid in.
    pub token_contract: Address,
    /// Receiver of the deployment fee.
    pub token_recipient: Address,
    /// Deployment fee; zero when sponsored.
    pub token_amount: U256,
    /// Gas cap for the fee transfer.
    pub token_gas: U256,
    /// Variant-specific parameters.
    pub extra: InitExtra,
}

impl InitParams {
    /// Parameters for a sponsored initialization by `owner`.
    #[must_use]
    pub const fn new(owner: Address) -> Self {
        Self {
            owner,
            token_contract: Address::ZERO,
            token_recipient: Address::ZERO,
            token_amount: U256::ZERO,
            token_gas: U256::ZERO,
            extra: InitExtra::None,
        }
    }

    /// Charges a deployment fee of `amount` units of `token_contract`.
    #[must_use]
    pub const fn with_fee(
        mut self,
        token_contract: Address,
        recipient: Address,
        amount: U256,
        gas: U256,
    ) -> Self {
        self.token_contract = token_contract;
        self.token_recipient = recipient;
        self.token_amount = amount;
        self.token_gas = gas;
        self
    }

    /// Attaches variant-specific parameters.
    #[must_use]
    pub fn with_extra(mut self, extra: InitExtra) -> Self {
        self.extra = extra;
        self
    }

    /// The deployment fee.
    #[must_use]
    pub const fn payment(&self) -> Payment {
        Payment {
            payee: self.token_recipient,
            token_contract: self.token_contract,
            token_amount: self.token_amount,
            token_gas: self.token_gas,
        }
    }
}

/// How a failed destination call is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertPolicy {
    /// Bubble the callee's payload as is, even when empty.
    Verbatim,
    /// Bubble non-empty payloads; replace an empty one with `Error(reason)`.
    OrMessage(&'static str),
}

impl RevertPolicy {
    /// Turns a failed call into [`ForwarderError::DestinationCallFailed`].
    #[must_use]
    pub fn failure(self, err: VmError) -> ForwarderError {
        let data = err.into_revert_data();
        match self {
            Self::OrMessage(reason) if data.is_empty() => {
                ForwarderError::DestinationCallFailed(VmError::revert(reason).into_revert_data())
            }
            _ => ForwarderError::DestinationCallFailed(data),
        }
    }
}

/// Whether the worker is paid before or after the destination call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeOrder {
    /// Pay, then call.
    BeforeCall,
    /// Call, then pay out of whatever the call left in the wallet.
    AfterCall,
}

/// The per-variant shape of a relayed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayFlow {
    /// When the fee is settled.
    pub fee_order: FeeOrder,
    /// Currencies accepted for the fee.
    pub mode: SettlementMode,
    /// Send the wallet's whole native balance to the owner afterwards.
    pub sweep_to_owner: bool,
}

/// A wallet variant.
///
/// Implementors are also ledger [`Contract`]s, so they can be deployed and
/// called through the `ISmartWallet` ABI (see [`dispatch`]).
pub trait Forwarder: Contract {
    /// Which variant this is.
    fn kind(&self) -> WalletKind;

    /// Shared checks and configuration.
    fn core(&self) -> &WalletCore;

    /// Moves the wallet at `frame.address()` to the initialized state.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::AlreadyInitialized`] on a second call, or a
    /// payment error if the deployment fee can't be paid.
    fn initialize(&self, frame: &mut Frame<'_>, params: InitParams) -> Result<(), ForwarderError>;

    /// Checks owner, nonce and signature of `request` without changing state.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::NotOwner`], [`ForwarderError::NonceMismatch`]
    /// or [`ForwarderError::SignatureMismatch`], in that order of precedence.
    fn verify(
        &self,
        frame: &Frame<'_>,
        suffix: &[u8],
        request: &ForwardRequest,
        signature: &[u8],
    ) -> Result<(), ForwarderError> {
        self.core().verify(frame, suffix, request, signature)
    }

    /// Executes a relayed request and pays `fees_receiver`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check, a payment error, or the destination's
    /// failure. Nothing the call did survives an error.
    fn execute(
        &self,
        frame: &mut Frame<'_>,
        suffix: &[u8],
        request: &ForwardRequest,
        fees_receiver: Address,
        signature: &[u8],
    ) -> Result<Bytes, ForwarderError>;

    /// Executes a call made by the owner in person.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::NotOwner`] for any other caller, or the
    /// destination's failure.
    fn direct_execute(
        &self,
        frame: &mut Frame<'_>,
        to: Address,
        data: &[u8],
    ) -> Result<Bytes, ForwarderError>;

    /// Variant init parameters carried by a deploy request.
    fn init_extra(&self, _request: &DeployRequest) -> InitExtra {
        InitExtra::None
    }

    /// Hash of variant init parameters mixed into the deployment salt.
    fn extra_params_hash(&self, _extra: &InitExtra) -> Option<B256> {
        None
    }
}

/// Checks and configuration shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCore {
    codec: TypedRequestCodec,
    safety_margin: u64,
}

impl Default for WalletCore {
    fn default() -> Self {
        Self::from_config(&ProtocolConfig::default())
    }
}

impl WalletCore {
    /// Creates a core around `codec`, keeping `safety_margin` gas spare on
    /// top of every request's declared gas.
    #[must_use]
    pub const fn new(codec: TypedRequestCodec, safety_margin: u64) -> Self {
        Self {
            codec,
            safety_margin,
        }
    }

    /// Creates a core for the configured domain and gas margin.
    #[must_use]
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(
            TypedRequestCodec::new(&config.domain),
            config.gas.safety_margin,
        )
    }

    /// The typed-data codec.
    #[must_use]
    pub const fn codec(&self) -> &TypedRequestCodec {
        &self.codec
    }

    /// Gas kept spare on top of a request's declared gas.
    #[must_use]
    pub const fn safety_margin(&self) -> u64 {
        self.safety_margin
    }

    /// Records the owner and domain separator of the wallet in `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::AlreadyInitialized`] if the wallet was
    /// initialized before.
    pub fn begin_init(&self, frame: &mut Frame<'_>, owner: Address) -> Result<(), ForwarderError> {
        let separator = self
            .codec
            .domain_separator(frame.chain_id(), frame.address());
        if frame
            .wallet(frame.address())
            .is_some_and(WalletState::is_initialized)
        {
            return Err(ForwarderError::AlreadyInitialized);
        }
        frame.charge(2 * gas::SSTORE)?;
        let state = frame.wallet_mut();
        state.owner = owner;
        state.domain_separator = separator;
        state.initialized = true;

        #[cfg(feature = "telemetry")]
        tracing::info!(wallet = %frame.address(), %owner, "wallet initialized");
        Ok(())
    }

    /// Checks who submits `request` and whether it is still valid.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::InvalidCaller`] unless the caller is the
    /// request's relay hub, then [`ForwarderError::Expired`] past
    /// `validUntilTime`.
    pub fn admit(frame: &Frame<'_>, request: &ForwardRequest) -> Result<(), ForwarderError> {
        if frame.caller() != request.relayHub {
            return Err(ForwarderError::InvalidCaller);
        }
        if frame.timestamp().is_past(saturating_u64(request.validUntilTime)) {
            return Err(ForwarderError::Expired);
        }
        Ok(())
    }

    /// Checks owner, nonce and signature of `request` against the wallet in
    /// `frame`.
    ///
    /// # Errors
    ///
    /// See [`Forwarder::verify`].
    pub fn verify(
        &self,
        frame: &Frame<'_>,
        suffix: &[u8],
        request: &ForwardRequest,
        signature: &[u8],
    ) -> Result<(), ForwarderError> {
        let state = frame
            .wallet(frame.address())
            .filter(|state| state.initialized)
            .ok_or(ForwarderError::NotOwner)?;
        if request.from != state.owner {
            return Err(ForwarderError::NotOwner);
        }
        replay::check(state, request.nonce)?;
        let digest = self
            .codec
            .relay_digest(state.domain_separator, request, suffix);
        if TypedRequestCodec::recover_signer(digest, signature)? != request.from {
            return Err(ForwarderError::SignatureMismatch);
        }
        Ok(())
    }

    /// Fails unless a call moving `value` from `frame` could hand the callee
    /// more than `declared` gas plus the safety margin.
    ///
    /// The entry cost of the call is taken first and the callee is capped to
    /// 63/64 of the rest, exactly as [`Frame::call`] does.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::InsufficientGas`].
    pub fn ensure_gas(
        &self,
        frame: &Frame<'_>,
        declared: U256,
        value: U256,
    ) -> Result<(), ForwarderError> {
        let entry = if value.is_zero() {
            gas::CALL
        } else {
            gas::CALL + gas::CALL_VALUE
        };
        let available = frame.gas_left().saturating_sub(entry);
        let forwardable = available - available / 64;
        let required = saturating_u64(declared).saturating_add(self.safety_margin);
        if forwardable <= required {
            return Err(ForwarderError::InsufficientGas);
        }
        Ok(())
    }

    /// Runs a relayed execution shaped by `flow`; `call` performs the
    /// destination call once every check has passed.
    ///
    /// # Errors
    ///
    /// See [`Forwarder::execute`].
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        wallet = %frame.address(),
        from = %request.from,
        to = %request.to,
        nonce = %request.nonce,
    )))]
    #[allow(clippy::too_many_arguments)]
    pub fn relay<F>(
        &self,
        frame: &mut Frame<'_>,
        suffix: &[u8],
        request: &ForwardRequest,
        fees_receiver: Address,
        signature: &[u8],
        flow: RelayFlow,
        call: F,
    ) -> Result<Bytes, ForwarderError>
    where
        F: FnOnce(&mut Frame<'_>) -> Result<Bytes, ForwarderError>,
    {
        Self::admit(frame, request)?;
        frame.charge(gas::ECRECOVER)?;
        self.verify(frame, suffix, request, signature)?;
        frame.charge(gas::SSTORE)?;
        replay::check_and_consume(frame.wallet_mut(), request.nonce)?;

        let payment = Payment::for_relay(request, fees_receiver);
        fees::preflight(&payment, PaymentStage::Relay, flow.mode)?;
        if flow.fee_order == FeeOrder::BeforeCall {
            fees::settle(frame, &payment, PaymentStage::Relay, flow.mode)?;
        }
        self.ensure_gas(frame, request.gas, request.value)?;

        let output = call(frame)?;

        if flow.fee_order == FeeOrder::AfterCall {
            fees::settle(frame, &payment, PaymentStage::Relay, flow.mode)?;
        }
        if flow.sweep_to_owner {
            sweep_to_owner(frame)?;
        }
        Ok(output)
    }

    /// Runs a direct execution: only the owner may call, and whatever native
    /// balance the wallet held before this call goes back to the owner before
    /// `call` runs.
    ///
    /// # Errors
    ///
    /// See [`Forwarder::direct_execute`].
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        wallet = %frame.address(),
        caller = %frame.caller(),
    )))]
    pub fn direct<F>(&self, frame: &mut Frame<'_>, call: F) -> Result<Bytes, ForwarderError>
    where
        F: FnOnce(&mut Frame<'_>) -> Result<Bytes, ForwarderError>,
    {
        let owner = frame
            .wallet(frame.address())
            .filter(|state| state.initialized)
            .map(WalletState::owner)
            .ok_or(ForwarderError::NotOwner)?;
        if frame.caller() != owner {
            return Err(ForwarderError::NotOwner);
        }
        let held = frame
            .balance(frame.address())
            .saturating_sub(frame.value());
        sweep(frame, owner, held)?;
        call(frame)
    }
}

/// Clamps a declared gas amount or timestamp to `u64`.
pub(crate) fn saturating_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Calls `to` from the wallet, reporting a failure according to `policy`.
pub(crate) fn forward(
    frame: &mut Frame<'_>,
    to: Address,
    value: U256,
    gas: u64,
    data: &[u8],
    policy: RevertPolicy,
) -> Result<Bytes, ForwarderError> {
    frame
        .call(to, value, gas, data)
        .map_err(|err| policy.failure(err))
}

/// Sends `amount` of the wallet's native balance to `to`.
pub(crate) fn sweep(frame: &mut Frame<'_>, to: Address, amount: U256) -> Result<(), ForwarderError> {
    if amount.is_zero() {
        return Ok(());
    }
    frame.call(to, amount, NATIVE_TRANSFER_GAS, &[])?;
    #[cfg(feature = "telemetry")]
    tracing::debug!(wallet = %frame.address(), %to, %amount, "balance swept");
    Ok(())
}

/// Sends the wallet's whole native balance to its owner.
pub(crate) fn sweep_to_owner(frame: &mut Frame<'_>) -> Result<(), ForwarderError> {
    let owner = frame
        .wallet(frame.address())
        .map(WalletState::owner)
        .unwrap_or_default();
    let balance = frame.balance(frame.address());
    sweep(frame, owner, balance)
}

/// Serves the `ISmartWallet` ABI for `wallet`.
///
/// Empty input is a plain native deposit. Errors become revert data.
///
/// # Errors
///
/// Returns the revert the caller observes.
pub fn dispatch<W: Forwarder>(
    wallet: &W,
    frame: &mut Frame<'_>,
    input: &[u8],
) -> Result<Bytes, VmError> {
    use ISmartWallet::ISmartWalletCalls as Calls;

    if input.is_empty() {
        return Ok(Bytes::new());
    }
    let call = Calls::abi_decode(input).map_err(|_| VmError::revert("SW: unknown call"))?;
    let state = frame.wallet(frame.address()).copied().unwrap_or_default();

    let output = match call {
        Calls::initialize_0(c) => {
            let params = InitParams::new(c.owner).with_fee(
                c.tokenAddr,
                c.tokenRecipient,
                c.tokenAmount,
                c.tokenGas,
            );
            wallet.initialize(frame, params)?;
            Vec::new()
        }
        Calls::initialize_1(c) => {
            let params = InitParams::new(c.owner)
                .with_fee(c.tokenAddr, c.tokenRecipient, c.tokenAmount, c.tokenGas)
                .with_extra(InitExtra::Logic {
                    logic: c.logic,
                    init_params: c.initParams,
                });
            wallet.initialize(frame, params)?;
            Vec::new()
        }
        Calls::initialize_2(c) => {
            let params = InitParams::new(c.owner)
                .with_fee(c.tokenAddr, c.tokenRecipient, c.tokenAmount, c.tokenGas)
                .with_extra(InitExtra::Call {
                    to: c.to,
                    value: c.value,
                    gas: c.gas,
                    data: c.data,
                });
            wallet.initialize(frame, params)?;
            Vec::new()
        }
        Calls::verify(c) => {
            wallet.verify(frame, &c.suffixData, &c.req, &c.sig)?;
            Vec::new()
        }
        Calls::execute(c) => {
            let output = wallet.execute(frame, &c.suffixData, &c.req, c.feesReceiver, &c.sig)?;
            ISmartWallet::executeCall::abi_encode_returns(&output)
        }
        Calls::directExecute(c) => {
            let output = wallet.direct_execute(frame, c.to, &c.data)?;
            ISmartWallet::directExecuteCall::abi_encode_returns(&output)
        }
        Calls::owner(_) => ISmartWallet::ownerCall::abi_encode_returns(&state.owner),
        Calls::nonce(_) => ISmartWallet::nonceCall::abi_encode_returns(&state.nonce),
        Calls::domainSeparator(_) => {
            ISmartWallet::domainSeparatorCall::abi_encode_returns(&state.domain_separator)
        }
        Calls::isInitialized(_) => {
            ISmartWallet::isInitializedCall::abi_encode_returns(&state.initialized)
        }
    };
    Ok(output.into())
}
