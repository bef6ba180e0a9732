#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM smart wallets for the Enveloping meta-transaction protocol.
//!
//! A user owns a smart wallet and signs requests off-chain; a relay worker
//! submits them, pays the gas, and is reimbursed by the wallet in a token or
//! in native currency, all inside one atomic transaction.
//!
//! # Architecture
//!
//! - [`types`] - Request structs (EIP-712 typed data) and the wallet/factory ABI
//! - [`codec`] - Domain separators, request digests and signer recovery
//! - [`replay`] - Per-wallet nonces
//! - [`fees`] - Worker fee settlement in native currency or ERC-20
//! - [`wallet`] - The wallet state machine and its variants
//! - [`factory`] - CREATE2 deployment of wallets at predictable addresses
//! - [`ledger`] - Deterministic in-process execution environment
//! - [`chain`] - EIP-155 chain references
//!
//! # Feature Flags
//!
//! - `client` - Off-chain request signing ([`client`])
//! - `telemetry` - Tracing instrumentation of wallet, factory and fee operations

pub mod chain;
#[cfg(feature = "client")]
pub mod client;
pub mod codec;
pub mod contract;
pub mod error;
pub mod factory;
pub mod fees;
pub mod ledger;
pub mod replay;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod testutil;

pub use codec::TypedRequestCodec;
pub use error::ForwarderError;
pub use factory::SmartWalletFactory;
pub use ledger::{Ledger, TxEnv};
pub use wallet::{
    CustomSmartWallet, Forwarder, InitExtra, InitParams, MinimalBoltzSmartWallet, SmartWallet,
    WalletCore, WalletKind, WalletState,
};

#[cfg(feature = "client")]
pub use client::{RequestSigner, SignedDeployRequest, SignedRelayRequest};
