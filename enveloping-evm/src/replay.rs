//! Per-wallet replay protection.
//!
//! Each wallet keeps a nonce that must match the one a relay request declares.
//! Consuming it bumps the nonce by one inside the running transaction, so a
//! failed execution rolls the bump back together with everything else.
//!
//! Deploy requests don't consume a nonce: a second deployment for the same
//! `(owner, recoverer, index)` fails because the derived address already
//! holds code.

use alloy_primitives::U256;

use crate::error::ForwarderError;
use crate::wallet::WalletState;

/// Fails with [`ForwarderError::NonceMismatch`] unless `presented` is the
/// wallet's current nonce.
///
/// # Errors
///
/// Returns [`ForwarderError::NonceMismatch`] on any difference.
pub fn check(state: &WalletState, presented: U256) -> Result<(), ForwarderError> {
    if state.nonce() == presented {
        Ok(())
    } else {
        Err(ForwarderError::NonceMismatch)
    }
}

/// Checks `presented` and advances the nonce by exactly one.
///
/// # Errors
///
/// Returns [`ForwarderError::NonceMismatch`] and leaves the nonce untouched
/// on any difference.
pub fn check_and_consume(state: &mut WalletState, presented: U256) -> Result<(), ForwarderError> {
    check(state, presented)?;
    state.nonce = presented + U256::from(1);
    #[cfg(feature = "telemetry")]
    tracing::debug!(nonce = %state.nonce, "nonce consumed");
    Ok(())
}
