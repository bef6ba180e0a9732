//! Worker fee settlement.
//!
//! A request names a fee of `tokenAmount` units of `tokenContract`, paid from
//! the wallet to the fee receiver. A zero amount is a sponsored request and
//! moves nothing. [`NATIVE_TOKEN`] selects the chain's native currency;
//! anything else is called as an ERC-20 with at most `tokenGas` gas.
//!
//! Settlement always runs inside the same transaction as the destination
//! call, so a failure on either side undoes both.

use std::fmt;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::contract::IERC20;
use crate::error::ForwarderError;
use crate::ledger::Frame;
use crate::types::{ForwardRequest, NATIVE_TOKEN};

/// Gas forwarded with a native fee transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 2_300;

/// A fee owed to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payment {
    /// Who receives the fee.
    pub payee: Address,
    /// Token to pay in, or [`NATIVE_TOKEN`].
    pub token_contract: Address,
    /// Amount owed; zero means sponsored.
    pub token_amount: U256,
    /// Gas cap for the token transfer call.
    pub token_gas: U256,
}

impl Payment {
    /// The fee declared by a relay request, payable to `fees_receiver`.
    #[must_use]
    pub const fn for_relay(request: &ForwardRequest, fees_receiver: Address) -> Self {
        Self {
            payee: fees_receiver,
            token_contract: request.tokenContract,
            token_amount: request.tokenAmount,
            token_gas: request.tokenGas,
        }
    }

    /// Whether nothing is owed.
    #[must_use]
    pub fn is_sponsored(&self) -> bool {
        self.token_amount.is_zero()
    }

    /// Whether the fee is paid in native currency.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.token_contract == NATIVE_TOKEN
    }
}

/// Which operation a fee pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStage {
    /// A relayed `execute`.
    Relay,
    /// A wallet deployment (paid from `initialize`).
    Deployment,
}

impl fmt::Display for PaymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay => f.write_str("relay"),
            Self::Deployment => f.write_str("deployment"),
        }
    }
}

/// Currencies a wallet variant accepts for fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementMode {
    /// Native currency or any ERC-20.
    TokenOrNative,
    /// Native currency only.
    NativeOnly,
}

/// Why a fee could not be paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PaymentFailure {
    /// The wallet holds less native currency than the fee.
    #[error("insufficient native balance: holds {available}, owes {required}")]
    InsufficientNativeBalance {
        /// Native balance of the wallet.
        available: U256,
        /// Fee owed.
        required: U256,
    },
    /// The payee rejected the native transfer.
    #[error("native transfer failed")]
    NativeTransferFailed,
    /// The token transfer reverted, ran out of gas or returned `false`.
    #[error("token transfer rejected")]
    TokenTransferRejected,
    /// A token fee was declared to a wallet that only pays in native currency.
    #[error("RBTC necessary for payment")]
    NativeTokenRequired,
}

/// Checks that `payment` can be attempted under `mode` without moving funds.
///
/// # Errors
///
/// Returns [`ForwarderError::PaymentRejected`] with
/// [`PaymentFailure::NativeTokenRequired`] when a token fee is owed to a
/// native-only wallet.
pub fn preflight(
    payment: &Payment,
    stage: PaymentStage,
    mode: SettlementMode,
) -> Result<(), ForwarderError> {
    if payment.is_sponsored() || payment.is_native() || mode == SettlementMode::TokenOrNative {
        return Ok(());
    }
    Err(ForwarderError::PaymentRejected {
        stage,
        reason: PaymentFailure::NativeTokenRequired,
    })
}

/// Pays `payment` from the wallet executing in `frame`.
///
/// A token `transfer` that returns no data counts as paid, so an address
/// without code is accepted too. Vetting the token contract is the job of
/// the verifier that approved the request upstream.
///
/// # Errors
///
/// Returns [`ForwarderError::PaymentRejected`] describing which side of the
/// payment failed.
#[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
    wallet = %frame.address(),
    payee = %payment.payee,
    token = %payment.token_contract,
    amount = %payment.token_amount,
    stage = %stage,
)))]
pub fn settle(
    frame: &mut Frame<'_>,
    payment: &Payment,
    stage: PaymentStage,
    mode: SettlementMode,
) -> Result<(), ForwarderError> {
    if payment.is_sponsored() {
        return Ok(());
    }
    preflight(payment, stage, mode)?;
    let rejected = |reason| ForwarderError::PaymentRejected { stage, reason };

    if payment.is_native() {
        let available = frame.balance(frame.address());
        if available < payment.token_amount {
            return Err(rejected(PaymentFailure::InsufficientNativeBalance {
                available,
                required: payment.token_amount,
            }));
        }
        frame
            .call(
                payment.payee,
                payment.token_amount,
                NATIVE_TRANSFER_GAS,
                &[],
            )
            .map_err(|_| rejected(PaymentFailure::NativeTransferFailed))?;
    } else {
        let input = IERC20::transferCall {
            to: payment.payee,
            amount: payment.token_amount,
        }
        .abi_encode();
        let gas = u64::try_from(payment.token_gas).unwrap_or(u64::MAX);
        let output = frame
            .call(payment.token_contract, U256::ZERO, gas, &input)
            .map_err(|_| rejected(PaymentFailure::TokenTransferRejected))?;
        let accepted = output.is_empty()
            || IERC20::transferCall::abi_decode_returns(&output).unwrap_or(false);
        if !accepted {
            return Err(rejected(PaymentFailure::TokenTransferRejected));
        }
    }

    #[cfg(feature = "telemetry")]
    tracing::debug!("fee settled");
    Ok(())
}
