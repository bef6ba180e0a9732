//! Smart wallet with pluggable logic.
//!
//! A logic contract attached at initialization takes over `execute` and
//! `directExecute` once the wallet's own checks and the fee have gone
//! through. The logic runs by delegate call, so it acts on the wallet's
//! balance and storage. Without logic the wallet behaves like
//! [`SmartWallet`](super::SmartWallet).

use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_sol_types::SolCall;
use enveloping::config::ProtocolConfig;

use super::{
    FeeOrder, Forwarder, InitExtra, InitParams, RelayFlow, RevertPolicy, WalletCore, WalletKind,
    WalletState, dispatch, forward, saturating_u64,
};
use crate::error::ForwarderError;
use crate::fees::{self, PaymentStage, SettlementMode};
use crate::ledger::{Contract, Frame, VmError, gas};
use crate::types::{DeployRequest, ForwardRequest, ICustomLogic};

const FLOW: RelayFlow = RelayFlow {
    fee_order: FeeOrder::BeforeCall,
    mode: SettlementMode::TokenOrNative,
    sweep_to_owner: false,
};

/// Wallet that delegates execution to an optional logic contract.
#[derive(Debug, Clone, Default)]
pub struct CustomSmartWallet {
    core: WalletCore,
}

impl CustomSmartWallet {
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

fn attached_logic(frame: &Frame<'_>) -> Address {
    frame
        .wallet(frame.address())
        .map(WalletState::logic)
        .unwrap_or_default()
}

fn delegate(frame: &mut Frame<'_>, logic: Address, input: &[u8]) -> Result<Bytes, ForwarderError> {
    frame
        .delegate_call(logic, u64::MAX, input)
        .map_err(|err| RevertPolicy::Verbatim.failure(err))
}

impl Forwarder for CustomSmartWallet {
    fn kind(&self) -> WalletKind {
        WalletKind::Custom
    }

    fn core(&self) -> &WalletCore {
        &self.core
    }

    fn initialize(&self, frame: &mut Frame<'_>, params: InitParams) -> Result<(), ForwarderError> {
        self.core.begin_init(frame, params.owner)?;
        fees::settle(frame, &params.payment(), PaymentStage::Deployment, FLOW.mode)?;

        if let InitExtra::Logic { logic, init_params } = params.extra
            && !logic.is_zero()
        {
            frame.charge(gas::SSTORE)?;
            frame.wallet_mut().logic = logic;
            let input = ICustomLogic::initializeCall {
                initParams: init_params,
            }
            .abi_encode();
            delegate(frame, logic, &input)?;

            #[cfg(feature = "telemetry")]
            tracing::debug!(wallet = %frame.address(), %logic, "custom logic attached");
        }
        Ok(())
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
                let logic = attached_logic(frame);
                if logic.is_zero() {
                    return forward(
                        frame,
                        request.to,
                        request.value,
                        saturating_u64(request.gas),
                        &request.data,
                        RevertPolicy::Verbatim,
                    );
                }
                let domain_separator = frame
                    .wallet(frame.address())
                    .map(WalletState::domain_separator)
                    .unwrap_or_default();
                let input = ICustomLogic::executeCall {
                    domainSeparator: domain_separator,
                    suffixData: Bytes::copy_from_slice(suffix),
                    req: request.clone(),
                    feesReceiver: fees_receiver,
                    sig: Bytes::copy_from_slice(signature),
                }
                .abi_encode();
                let output = delegate(frame, logic, &input)?;
                Ok(ICustomLogic::executeCall::abi_decode_returns(&output).unwrap_or(output))
            })
    }

    fn direct_execute(
        &self,
        frame: &mut Frame<'_>,
        to: Address,
        data: &[u8],
    ) -> Result<Bytes, ForwarderError> {
        self.core.direct(frame, |frame| {
            let logic = attached_logic(frame);
            if logic.is_zero() {
                let value = frame.value();
                return forward(frame, to, value, u64::MAX, data, RevertPolicy::Verbatim);
            }
            let input = ICustomLogic::directExecuteCall {
                to,
                data: Bytes::copy_from_slice(data),
            }
            .abi_encode();
            let output = delegate(frame, logic, &input)?;
            Ok(ICustomLogic::directExecuteCall::abi_decode_returns(&output).unwrap_or(output))
        })
    }

    fn init_extra(&self, request: &DeployRequest) -> InitExtra {
        InitExtra::Logic {
            logic: request.to,
            init_params: request.data.clone(),
        }
    }

    /// `keccak256(logic ‖ keccak256(initParams))`, or nothing without logic.
    fn extra_params_hash(&self, extra: &InitExtra) -> Option<B256> {
        match extra {
            InitExtra::Logic { logic, init_params } if !logic.is_zero() => {
                let mut packed = [0u8; 52];
                packed[..20].copy_from_slice(logic.as_slice());
                packed[20..].copy_from_slice(keccak256(init_params).as_slice());
                Some(keccak256(packed))
            }
            _ => None,
        }
    }
}

impl Contract for CustomSmartWallet {
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        dispatch(self, frame, input)
    }
}
