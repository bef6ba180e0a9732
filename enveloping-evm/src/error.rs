//! Error taxonomy shared by wallets, fee settlement and factories.
//!
//! Every variant is fatal to the enclosing transaction. When a wallet or
//! factory is reached through its ABI, errors become revert data: destination
//! payloads are bubbled verbatim and everything else becomes a Solidity
//! `Error(string)` carrying the display text.

use alloy_primitives::{Address, Bytes};

use crate::fees::{PaymentFailure, PaymentStage};
use crate::ledger::{VmError, revert_reason};

/// Errors raised by the forwarding protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwarderError {
    /// `initialize` ran on a wallet that is already initialized.
    #[error("Already initialized")]
    AlreadyInitialized,
    /// The request signer or direct caller is not the wallet owner.
    #[error("Not the owner of the SmartWallet")]
    NotOwner,
    /// The caller is not the relay hub the request names.
    #[error("Invalid caller")]
    InvalidCaller,
    /// The recovered signer does not match the expected one.
    #[error("Signature mismatch")]
    SignatureMismatch,
    /// The request nonce is not the wallet's current nonce.
    #[error("nonce mismatch")]
    NonceMismatch,
    /// The request's `validUntilTime` has passed.
    #[error("SW: request expired")]
    Expired,
    /// Not enough gas is left to give the destination call its declared gas.
    #[error("Not enough gas left")]
    InsufficientGas,
    /// The worker could not be paid.
    #[error("Unable to pay for {stage}: {reason}")]
    PaymentRejected {
        /// Whether the fee was due for a relay or a deployment.
        stage: PaymentStage,
        /// Why the payment failed.
        reason: PaymentFailure,
    },
    /// The destination call failed; carries its revert payload verbatim.
    #[error("{}", revert_reason(.0))]
    DestinationCallFailed(Bytes),
    /// A wallet already exists at the derived address.
    #[error("Unable to deploy: code already exists at {0}")]
    AlreadyDeployed(Address),
    /// Ledger-level failure such as running out of gas.
    #[error(transparent)]
    Vm(#[from] VmError),
}

impl ForwarderError {
    /// Revert payload observed by ABI callers.
    #[must_use]
    pub fn revert_data(&self) -> Bytes {
        VmError::from(self.clone()).into_revert_data()
    }
}

impl From<ForwarderError> for VmError {
    fn from(value: ForwarderError) -> Self {
        match value {
            ForwarderError::DestinationCallFailed(data) => Self::Revert(data),
            ForwarderError::Vm(err) => err,
            other => Self::revert(other.to_string()),
        }
    }
}
