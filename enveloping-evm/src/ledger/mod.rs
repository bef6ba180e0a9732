//! In-process deterministic ledger.
//!
//! Wallets and factories run against [`Ledger`], a small EVM-flavoured world
//! state with native balances, contract code, a wallet-state arena, contract
//! storage and event logs. Every transaction is atomic: [`Ledger::transact`]
//! restores the previous state when the transaction fails, and every nested
//! call made through a [`Frame`] is rolled back on its own when it fails.
//!
//! Gas is charged explicitly at the operations the protocol cares about
//! (calls, value transfers, deployments, storage writes, logs, signature
//! recovery) and nested calls are capped with the EIP-150 63/64 rule.

pub mod erc20;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, Log, LogData, U256};
use alloy_sol_types::{Revert, SolError};
use enveloping::config::ProtocolConfig;
use enveloping::timestamp::UnixTimestamp;

use crate::chain::{Eip155ChainReference, UnsupportedChainError};
use crate::wallet::WalletState;

pub use erc20::Erc20Token;

/// Maximum nesting depth of calls.
pub const CALL_DEPTH_LIMIT: usize = 1024;

/// Gas limit used by [`TxEnv::new`].
pub const DEFAULT_TX_GAS_LIMIT: u64 = 6_800_000;

/// Gas costs charged by the ledger and the contracts running on it.
pub mod gas {
    /// Intrinsic cost of every transaction.
    pub const TX_BASE: u64 = 21_000;
    /// Cost of entering a nested call.
    pub const CALL: u64 = 700;
    /// Surcharge for a call that moves native value.
    pub const CALL_VALUE: u64 = 9_000;
    /// Cost of deploying code.
    pub const CREATE: u64 = 32_000;
    /// Cost of a storage write.
    pub const SSTORE: u64 = 5_000;
    /// Cost of emitting a log.
    pub const LOG: u64 = 375;
    /// Cost of recovering a signer.
    pub const ECRECOVER: u64 = 3_000;
}

/// Code installed at an address.
///
/// `frame` carries the calling context: `frame.address()` is the contract
/// being executed and `frame.caller()` the immediate caller. An empty `input`
/// is a plain native transfer.
pub trait Contract: Send + Sync + Debug {
    /// Executes a call against this contract.
    ///
    /// # Errors
    ///
    /// Returns [`VmError`] when the call fails; the ledger rolls back every
    /// state change made inside the call.
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError>;
}

/// Failure of a call or transaction on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// The callee reverted with the given payload.
    #[error("execution reverted: {}", revert_reason(.0))]
    Revert(Bytes),
    /// The frame ran out of gas.
    #[error("out of gas")]
    OutOfGas,
    /// A native transfer exceeded the sender's balance.
    #[error("insufficient balance: {address} holds {available}, needs {required}")]
    InsufficientBalance {
        /// Sender of the transfer.
        address: Address,
        /// Balance held by the sender.
        available: U256,
        /// Amount the transfer needed.
        required: U256,
    },
    /// Deployment target already holds code.
    #[error("code already exists at {0}")]
    CodeExists(Address),
    /// Nested calls went deeper than [`CALL_DEPTH_LIMIT`].
    #[error("max call depth exceeded")]
    CallDepthExceeded,
}

impl VmError {
    /// Builds a revert carrying a Solidity `Error(string)` payload.
    #[must_use]
    pub fn revert(reason: impl Into<String>) -> Self {
        Self::Revert(
            Revert {
                reason: reason.into(),
            }
            .abi_encode()
            .into(),
        )
    }

    /// Returns the revert payload a caller observes for this failure.
    ///
    /// Failures other than [`VmError::Revert`] carry no data.
    #[must_use]
    pub fn into_revert_data(self) -> Bytes {
        match self {
            Self::Revert(data) => data,
            _ => Bytes::new(),
        }
    }
}

/// Renders a revert payload: the reason of an `Error(string)`, hex otherwise.
pub(crate) fn revert_reason(data: &Bytes) -> String {
    Revert::abi_decode(data).map_or_else(|_| data.to_string(), |revert| revert.reason)
}

/// Block-level context shared by every frame of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockEnv {
    chain_id: u64,
    timestamp: UnixTimestamp,
}

/// Everything a transaction can mutate.
#[derive(Debug, Clone, Default)]
struct WorldState {
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Arc<dyn Contract>>,
    wallets: HashMap<Address, WalletState>,
    storage: HashMap<(Address, B256), B256>,
    logs: Vec<Log>,
}

impl WorldState {
    fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    fn move_value(&mut self, from: Address, to: Address, amount: U256) -> Result<(), VmError> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.balance(from);
        if available < amount {
            return Err(VmError::InsufficientBalance {
                address: from,
                available,
                required: amount,
            });
        }
        self.balances.insert(from, available - amount);
        let credited = self.balance(to).saturating_add(amount);
        self.balances.insert(to, credited);
        Ok(())
    }
}

/// Parameters of a top-level transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxEnv {
    /// Externally owned account sending the transaction.
    pub from: Address,
    /// Contract (or account) the transaction targets.
    pub to: Address,
    /// Native value moved from `from` to `to` before execution.
    pub value: U256,
    /// Gas available to the whole transaction.
    pub gas_limit: u64,
}

impl TxEnv {
    /// Creates a value-less transaction with [`DEFAULT_TX_GAS_LIMIT`].
    #[must_use]
    pub const fn new(from: Address, to: Address) -> Self {
        Self {
            from,
            to,
            value: U256::ZERO,
            gas_limit: DEFAULT_TX_GAS_LIMIT,
        }
    }

    /// Sets the native value sent along.
    #[must_use]
    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the transaction gas limit.
    #[must_use]
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}

/// A deterministic ledger with atomic transactions.
#[derive(Debug)]
pub struct Ledger {
    block: BlockEnv,
    state: WorldState,
    tx_gas_limit: u64,
}

impl Ledger {
    /// Creates an empty ledger for `chain_id` with the clock at the current time.
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            block: BlockEnv {
                chain_id,
                timestamp: UnixTimestamp::now(),
            },
            state: WorldState::default(),
            tx_gas_limit: DEFAULT_TX_GAS_LIMIT,
        }
    }

    /// Creates an empty ledger for the configured chain.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedChainError`] if the configured chain is not `eip155`.
    pub fn from_config(config: &ProtocolConfig) -> Result<Self, UnsupportedChainError> {
        let chain = Eip155ChainReference::try_from(&config.chain)?;
        let mut ledger = Self::new(chain.inner());
        ledger.tx_gas_limit = config.gas.tx_gas_limit;
        Ok(ledger)
    }

    /// Numeric chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.block.chain_id
    }

    /// Current block timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> UnixTimestamp {
        self.block.timestamp
    }

    /// Moves the clock to `timestamp`.
    pub const fn set_timestamp(&mut self, timestamp: UnixTimestamp) {
        self.block.timestamp = timestamp;
    }

    /// Moves the clock forward by `secs`.
    pub const fn advance(&mut self, secs: u64) {
        self.block.timestamp = self.block.timestamp.after(secs);
    }

    /// Creates a transaction envelope using this ledger's configured gas limit.
    #[must_use]
    pub const fn tx(&self, from: Address, to: Address) -> TxEnv {
        TxEnv::new(from, to).with_gas_limit(self.tx_gas_limit)
    }

    /// Credits `amount` of native currency to `address` out of thin air.
    pub fn fund(&mut self, address: Address, amount: U256) {
        let balance = self.state.balance(address).saturating_add(amount);
        self.state.balances.insert(address, balance);
    }

    /// Installs contract code at `address`, replacing anything there.
    pub fn install(&mut self, address: Address, code: Arc<dyn Contract>) {
        self.state.code.insert(address, code);
    }

    /// Native balance of `address`.
    #[must_use]
    pub fn balance_of(&self, address: Address) -> U256 {
        self.state.balance(address)
    }

    /// Whether `address` holds contract code.
    #[must_use]
    pub fn has_code(&self, address: Address) -> bool {
        self.state.code.contains_key(&address)
    }

    /// Wallet state recorded at `address`, if any wallet was ever initialized there.
    #[must_use]
    pub fn wallet(&self, address: Address) -> Option<&WalletState> {
        self.state.wallets.get(&address)
    }

    /// Reads a storage slot of `address`.
    #[must_use]
    pub fn storage(&self, address: Address, slot: B256) -> B256 {
        self.state
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default()
    }

    /// Writes a storage slot of `address` outside of any transaction.
    pub fn set_storage(&mut self, address: Address, slot: B256, value: B256) {
        self.state.storage.insert((address, slot), value);
    }

    /// Every log emitted by committed transactions, oldest first.
    #[must_use]
    pub fn logs(&self) -> &[Log] {
        &self.state.logs
    }

    /// Runs `f` as one atomic transaction.
    ///
    /// The frame handed to `f` executes as `tx.to` called by `tx.from`. The
    /// intrinsic gas and `tx.value` are taken before `f` runs. If anything
    /// fails, every change made by the transaction is discarded.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a [`VmError`] converted into `E` when
    /// the intrinsic gas or value transfer fails.
    pub fn transact<T, E, F>(&mut self, tx: TxEnv, f: F) -> Result<T, E>
    where
        E: From<VmError>,
        F: FnOnce(&mut Frame<'_>) -> Result<T, E>,
    {
        let snapshot = self.state.clone();
        let result = {
            let mut frame = Frame {
                state: &mut self.state,
                block: &self.block,
                caller: tx.from,
                address: tx.to,
                value: tx.value,
                gas_limit: tx.gas_limit,
                gas_used: 0,
                depth: 0,
            };
            frame
                .charge(gas::TX_BASE)
                .and_then(|()| frame.state.move_value(tx.from, tx.to, tx.value))
                .map_err(E::from)
                .and_then(|()| f(&mut frame))
        };
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }

    /// Sends `input` to the code at `tx.to` as one atomic transaction.
    ///
    /// # Errors
    ///
    /// Returns the [`VmError`] raised by the callee.
    pub fn call(&mut self, tx: TxEnv, input: &[u8]) -> Result<Bytes, VmError> {
        let code = self.state.code.get(&tx.to).cloned();
        self.transact(tx, |frame| match code {
            Some(code) => code.call(frame, input),
            None => Ok(Bytes::new()),
        })
    }
}

/// Execution context of one call.
#[derive(Debug)]
pub struct Frame<'a> {
    state: &'a mut WorldState,
    block: &'a BlockEnv,
    caller: Address,
    address: Address,
    value: U256,
    gas_limit: u64,
    gas_used: u64,
    depth: usize,
}

impl Frame<'_> {
    /// Immediate caller of this frame.
    #[must_use]
    pub const fn caller(&self) -> Address {
        self.caller
    }

    /// Address whose code, balance and storage this frame acts on.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Native value sent with this call.
    #[must_use]
    pub const fn value(&self) -> U256 {
        self.value
    }

    /// Numeric chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.block.chain_id
    }

    /// Current block timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> UnixTimestamp {
        self.block.timestamp
    }

    /// Gas still available to this frame.
    #[must_use]
    pub const fn gas_left(&self) -> u64 {
        self.gas_limit - self.gas_used
    }

    /// Consumes `amount` gas.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::OutOfGas`] and exhausts the frame when `amount`
    /// exceeds the gas left.
    pub const fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        if amount > self.gas_left() {
            self.gas_used = self.gas_limit;
            return Err(VmError::OutOfGas);
        }
        self.gas_used += amount;
        Ok(())
    }

    /// Native balance of `address`.
    #[must_use]
    pub fn balance(&self, address: Address) -> U256 {
        self.state.balance(address)
    }

    /// Whether `address` holds contract code.
    #[must_use]
    pub fn has_code(&self, address: Address) -> bool {
        self.state.code.contains_key(&address)
    }

    /// Calls the code at `to`, moving `value` from this frame's address.
    ///
    /// The callee receives at most `gas`, capped to 63/64 of what is left.
    /// Calling an address without code only moves the value.
    ///
    /// # Errors
    ///
    /// Returns the callee's failure. All of the callee's changes, including
    /// the value transfer, are rolled back.
    pub fn call(
        &mut self,
        to: Address,
        value: U256,
        gas: u64,
        input: &[u8],
    ) -> Result<Bytes, VmError> {
        let code = self.state.code.get(&to).cloned();
        self.enter(to, value, gas, |frame| match code {
            Some(code) => code.call(frame, input),
            None => Ok(Bytes::new()),
        })
    }

    /// Runs the code at `target` in this frame's context.
    ///
    /// Caller, address, value and storage stay those of the current frame.
    ///
    /// # Errors
    ///
    /// Returns the delegate's failure, rolling back its changes.
    pub fn delegate_call(
        &mut self,
        target: Address,
        gas: u64,
        input: &[u8],
    ) -> Result<Bytes, VmError> {
        let code = self.state.code.get(&target).cloned();
        let (caller, address, value) = (self.caller, self.address, self.value);
        self.nested(caller, address, value, U256::ZERO, gas, |frame| match code {
            Some(code) => code.call(frame, input),
            None => Ok(Bytes::new()),
        })
    }

    /// Runs `f` as a nested call to `to`, with typed results.
    ///
    /// Behaves like [`Frame::call`] but lets Rust code act as the callee.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, rolling back the nested changes on error.
    pub fn enter<T, E, F>(&mut self, to: Address, value: U256, gas: u64, f: F) -> Result<T, E>
    where
        E: From<VmError>,
        F: FnOnce(&mut Frame<'_>) -> Result<T, E>,
    {
        let caller = self.address;
        self.nested(caller, to, value, value, gas, f)
    }

    fn nested<T, E, F>(
        &mut self,
        caller: Address,
        address: Address,
        value: U256,
        transfer: U256,
        gas: u64,
        f: F,
    ) -> Result<T, E>
    where
        E: From<VmError>,
        F: FnOnce(&mut Frame<'_>) -> Result<T, E>,
    {
        if self.depth + 1 >= CALL_DEPTH_LIMIT {
            return Err(VmError::CallDepthExceeded.into());
        }
        let base = if transfer.is_zero() {
            gas::CALL
        } else {
            gas::CALL + gas::CALL_VALUE
        };
        self.charge(base)?;
        let gas = gas.min(self.gas_left() - self.gas_left() / 64);

        let snapshot = self.state.clone();
        let (result, used) = match self.state.move_value(self.address, address, transfer) {
            Err(err) => (Err(E::from(err)), 0),
            Ok(()) => {
                let mut frame = Frame {
                    state: &mut *self.state,
                    block: self.block,
                    caller,
                    address,
                    value,
                    gas_limit: gas,
                    gas_used: 0,
                    depth: self.depth + 1,
                };
                let result = f(&mut frame);
                (result, frame.gas_used)
            }
        };
        self.gas_used += used;
        if result.is_err() {
            *self.state = snapshot;
        }
        result
    }

    /// Moves native value from this frame's address without running any code.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::InsufficientBalance`] if the balance is too low.
    pub fn transfer(&mut self, to: Address, amount: U256) -> Result<(), VmError> {
        self.state.move_value(self.address, to, amount)
    }

    /// Installs `code` at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::CodeExists`] if the address already holds code.
    pub fn create(&mut self, address: Address, code: Arc<dyn Contract>) -> Result<(), VmError> {
        self.charge(gas::CREATE)?;
        if self.state.code.contains_key(&address) {
            return Err(VmError::CodeExists(address));
        }
        self.state.code.insert(address, code);
        Ok(())
    }

    /// Wallet state recorded at `address`.
    #[must_use]
    pub fn wallet(&self, address: Address) -> Option<&WalletState> {
        self.state.wallets.get(&address)
    }

    /// Wallet state of this frame's address, created empty on first access.
    pub fn wallet_mut(&mut self) -> &mut WalletState {
        self.state.wallets.entry(self.address).or_default()
    }

    /// Reads a storage slot of this frame's address.
    #[must_use]
    pub fn sload(&self, slot: B256) -> B256 {
        self.state
            .storage
            .get(&(self.address, slot))
            .copied()
            .unwrap_or_default()
    }

    /// Writes a storage slot of this frame's address.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::OutOfGas`] if the write can't be paid for.
    pub fn sstore(&mut self, slot: B256, value: B256) -> Result<(), VmError> {
        self.charge(gas::SSTORE)?;
        self.state.storage.insert((self.address, slot), value);
        Ok(())
    }

    /// Emits a log from this frame's address.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::OutOfGas`] if the log can't be paid for.
    pub fn emit(&mut self, data: LogData) -> Result<(), VmError> {
        self.charge(gas::LOG)?;
        self.state.logs.push(Log {
            address: self.address,
            data,
        });
        Ok(())
    }
}
