//! Minimal wallet for swap flows.
//!
//! The destination call is what funds this wallet (typically a claim from a
//! swap contract), so the worker is paid after it, in native currency only,
//! and whatever is left goes straight to the owner. The wallet never holds a
//! balance between transactions.

use alloy_primitives::{Address, Bytes};
use enveloping::config::ProtocolConfig;

use super::{
    FeeOrder, Forwarder, InitExtra, InitParams, RelayFlow, RevertPolicy, WalletCore, WalletKind,
    dispatch, forward, saturating_u64, sweep_to_owner,
};
use crate::error::ForwarderError;
use crate::fees::{self, PaymentStage, SettlementMode};
use crate::ledger::{Contract, Frame, VmError};
use crate::types::{DeployRequest, ForwardRequest};

const FLOW: RelayFlow = RelayFlow {
    fee_order: FeeOrder::AfterCall,
    mode: SettlementMode::NativeOnly,
    sweep_to_owner: true,
};

const REVERT_POLICY: RevertPolicy = RevertPolicy::OrMessage("Unable to execute");

/// Wallet that pays the worker out of what its destination call brings in.
#[derive(Debug, Clone, Default)]
pub struct MinimalBoltzSmartWallet {
    core: WalletCore,
}

impl MinimalBoltzSmartWallet {
    /// Creates a wallet template around `core`.
    #[must_use]
    pub const fn new(core: WalletCore) -> Self {
        Self { core }
    }

    /// Creates a wallet template from protocol configuration.
    #[must_use]
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(WalletCore::from_config(config))
    }
}

impl Forwarder for MinimalBoltzSmartWallet {
    fn kind(&self) -> WalletKind {
        WalletKind::MinimalBoltz
    }

    fn core(&self) -> &WalletCore {
        &self.core
    }

    fn initialize(&self, frame: &mut Frame<'_>, params: InitParams) -> Result<(), ForwarderError> {
        self.core.begin_init(frame, params.owner)?;
        let payment = params.payment();
        fees::preflight(&payment, PaymentStage::Deployment, FLOW.mode)?;

        if let InitExtra::Call {
            to,
            value,
            gas,
            data,
        } = &params.extra
            && !to.is_zero()
        {
            forward(
                frame,
                *to,
                *value,
                saturating_u64(*gas),
                data,
                REVERT_POLICY,
            )?;
        }

        fees::settle(frame, &payment, PaymentStage::Deployment, FLOW.mode)?;
        sweep_to_owner(frame)
    }

    fn execute(
        &self,
        frame: &mut Frame<'_>,
        suffix: &[u8],
        request: &ForwardRequest,
        fees_receiver: Address,
        signature: &[u8],
    ) -> Result<Bytes, ForwarderError> {
        self.core
            .relay(frame, suffix, request, fees_receiver, signature, FLOW, |frame| {
                forward(
                    frame,
                    request.to,
                    request.value,
                    saturating_u64(request.gas),
                    &request.data,
                    REVERT_POLICY,
                )
            })
    }

    fn direct_execute(
        &self,
        frame: &mut Frame<'_>,
        to: Address,
        data: &[u8],
    ) -> Result<Bytes, ForwarderError> {
        self.core.direct(frame, |frame| {
            let value = frame.value();
            forward(frame, to, value, u64::MAX, data, REVERT_POLICY)
        })
    }

    fn init_extra(&self, request: &DeployRequest) -> InitExtra {
        InitExtra::Call {
            to: request.to,
            value: request.value,
            gas: request.gas,
            data: request.data.clone(),
        }
    }
}

impl Contract for MinimalBoltzSmartWallet {
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        dispatch(self, frame, input)
    }
}
