//! The base smart wallet: pays the worker first, then forwards the call.

use alloy_primitives::{Address, Bytes};
use enveloping::config::ProtocolConfig;

use super::{
    FeeOrder, Forwarder, InitParams, RelayFlow, RevertPolicy, WalletCore, WalletKind, dispatch,
    forward, saturating_u64,
};
use crate::error::ForwarderError;
use crate::fees::{self, PaymentStage, SettlementMode};
use crate::ledger::{Contract, Frame, VmError};
use crate::types::ForwardRequest;

const FLOW: RelayFlow = RelayFlow {
    fee_order: FeeOrder::BeforeCall,
    mode: SettlementMode::TokenOrNative,
    sweep_to_owner: false,
};

/// Wallet that accepts fees in native currency or any ERC-20 and bubbles
/// destination failures verbatim.
#[derive(Debug, Clone, Default)]
pub struct SmartWallet {
    core: WalletCore,
}

impl SmartWallet {
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

impl Forwarder for SmartWallet {
    fn kind(&self) -> WalletKind {
        WalletKind::Smart
    }

    fn core(&self) -> &WalletCore {
        &self.core
    }

    fn initialize(&self, frame: &mut Frame<'_>, params: InitParams) -> Result<(), ForwarderError> {
        self.core.begin_init(frame, params.owner)?;
        fees::settle(frame, &params.payment(), PaymentStage::Deployment, FLOW.mode)
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
                    RevertPolicy::Verbatim,
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
            forward(frame, to, value, u64::MAX, data, RevertPolicy::Verbatim)
        })
    }
}

impl Contract for SmartWallet {
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        dispatch(self, frame, input)
    }
}
