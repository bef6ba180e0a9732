//! Storage-backed ERC-20 token running on the [`Ledger`].
//!
//! Used as the non-native fee currency. Balances live in the token's storage
//! under `keccak256(holder)`, so they roll back with the transaction like any
//! other contract state.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, SolEvent, SolInterface};

use super::{Contract, Frame, Ledger, VmError};
use crate::contract::IERC20;

/// Gas charged by a token transfer.
pub const TRANSFER_GAS: u64 = 25_000;

/// How the token answers `transfer`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferBehavior {
    /// Moves balances and returns `true`, reverting on insufficient balance.
    #[default]
    Standard,
    /// Returns `false` without moving anything.
    ReturnsFalse,
}

/// An ERC-20 token contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct Erc20Token {
    behavior: TransferBehavior,
}

impl Erc20Token {
    /// A token with standard transfer semantics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            behavior: TransferBehavior::Standard,
        }
    }

    /// A token whose transfers always return `false`.
    #[must_use]
    pub const fn returning_false() -> Self {
        Self {
            behavior: TransferBehavior::ReturnsFalse,
        }
    }

    /// Storage slot holding the balance of `holder`.
    #[must_use]
    pub fn balance_slot(holder: Address) -> B256 {
        keccak256(holder.into_word())
    }

    /// Balance of `holder` in the token deployed at `token`.
    #[must_use]
    pub fn balance(ledger: &Ledger, token: Address, holder: Address) -> U256 {
        U256::from_be_bytes(ledger.storage(token, Self::balance_slot(holder)).0)
    }

    /// Credits `amount` tokens to `holder` outside of any transaction.
    pub fn mint(ledger: &mut Ledger, token: Address, holder: Address, amount: U256) {
        let balance = Self::balance(ledger, token, holder).saturating_add(amount);
        ledger.set_storage(token, Self::balance_slot(holder), word(balance));
    }

    fn read(frame: &Frame<'_>, holder: Address) -> U256 {
        U256::from_be_bytes(frame.sload(Self::balance_slot(holder)).0)
    }

    fn transfer(&self, frame: &mut Frame<'_>, to: Address, amount: U256) -> Result<bool, VmError> {
        frame.charge(TRANSFER_GAS)?;
        if self.behavior == TransferBehavior::ReturnsFalse {
            return Ok(false);
        }
        let from = frame.caller();
        let available = Self::read(frame, from);
        if available < amount {
            return Err(VmError::revert("ERC20: transfer amount exceeds balance"));
        }
        frame.sstore(Self::balance_slot(from), word(available - amount))?;
        let credited = Self::read(frame, to).saturating_add(amount);
        frame.sstore(Self::balance_slot(to), word(credited))?;
        let event = IERC20::Transfer {
            from,
            to,
            value: amount,
        };
        frame.emit(event.encode_log_data())?;
        Ok(true)
    }
}

fn word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

impl Contract for Erc20Token {
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        let call = IERC20::IERC20Calls::abi_decode(input)
            .map_err(|_| VmError::revert("ERC20: unknown call"))?;
        let output = match call {
            IERC20::IERC20Calls::transfer(call) => {
                let ok = self.transfer(frame, call.to, call.amount)?;
                IERC20::transferCall::abi_encode_returns(&ok)
            }
            IERC20::IERC20Calls::balanceOf(call) => {
                let balance = Self::read(frame, call.account);
                IERC20::balanceOfCall::abi_encode_returns(&balance)
            }
        };
        Ok(output.into())
    }
}
