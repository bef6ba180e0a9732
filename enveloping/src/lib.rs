#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the Enveloping meta-transaction protocol.
//!
//! Enveloping lets a relay worker submit and pay gas for a transaction on
//! behalf of a user's smart wallet, while the user reimburses the worker in a
//! token or native currency. Signatures, not caller identity, authorize every
//! state change.
//!
//! This crate holds the chain-agnostic pieces shared by every rendition of the
//! protocol. The EVM wallets, factory and typed-data codec live in
//! `enveloping-evm`.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2 chain identifiers
//! - [`config`] - Protocol configuration loaded from TOML
//! - [`networks`] - Registry of well-known networks
//! - [`timestamp`] - Block time and request deadlines
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod chain;
pub mod config;
pub mod networks;
pub mod timestamp;
