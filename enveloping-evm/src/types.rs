//! Request types and the ABI surface of wallets and factories.
//!
//! The structs in this module double as EIP-712 typed data. Field order is
//! part of the signed schema and MUST match what requesters sign off-chain:
//!
//! - [`ForwardRequest`] / [`DeployRequest`] hold the fixed fields that the
//!   wallet and factory parse individually.
//! - [`RelayRequest`] / [`DeployRelayRequest`] are the primary types a
//!   requester signs: the fixed fields flattened, followed by [`RelayData`].
//!   Everything after the fixed fields reaches the contracts only as the
//!   opaque suffix (see [`crate::codec`]).

use alloy_primitives::Address;
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};

/// Token address that selects payment in the chain's native currency.
pub const NATIVE_TOKEN: Address = Address::ZERO;

sol! {
    /// Fixed fields of a relay request.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct ForwardRequest {
        address relayHub;
        address from;
        address to;
        address tokenContract;
        uint256 value;
        uint256 gas;
        uint256 nonce;
        uint256 tokenAmount;
        uint256 tokenGas;
        uint256 validUntilTime;
        bytes data;
    }

    /// Fixed fields of a deploy request.
    ///
    /// `to`, `value`, `gas` and `data` carry variant-specific init params: the
    /// logic contract and its init data for custom wallets, or a destination
    /// call for minimal wallets.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct DeployRequest {
        address relayHub;
        address from;
        address to;
        address tokenContract;
        address recoverer;
        uint256 value;
        uint256 nonce;
        uint256 tokenAmount;
        uint256 tokenGas;
        uint256 validUntilTime;
        uint256 index;
        uint256 gas;
        bytes data;
    }

    /// Network metadata accompanying a request.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct RelayData {
        uint256 gasPrice;
        address feesReceiver;
        address callForwarder;
        address callVerifier;
    }

    /// EIP-712 primary type for relayed executions.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct RelayRequest {
        address relayHub;
        address from;
        address to;
        address tokenContract;
        uint256 value;
        uint256 gas;
        uint256 nonce;
        uint256 tokenAmount;
        uint256 tokenGas;
        uint256 validUntilTime;
        bytes data;
        RelayData relayData;
    }

    /// EIP-712 primary type for relayed wallet deployments.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct DeployRelayRequest {
        address relayHub;
        address from;
        address to;
        address tokenContract;
        address recoverer;
        uint256 value;
        uint256 nonce;
        uint256 tokenAmount;
        uint256 tokenGas;
        uint256 validUntilTime;
        uint256 index;
        uint256 gas;
        bytes data;
        RelayData relayData;
    }

    /// Smart wallet entry points.
    ///
    /// `initialize` is overloaded per variant: `_0` plain, `_1` with custom
    /// logic, `_2` with a destination call.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    interface ISmartWallet {
        function initialize(
            address owner,
            address tokenAddr,
            address tokenRecipient,
            uint256 tokenAmount,
            uint256 tokenGas
        ) external;
        function initialize(
            address owner,
            address tokenAddr,
            address tokenRecipient,
            uint256 tokenAmount,
            uint256 tokenGas,
            address logic,
            bytes initParams
        ) external;
        function initialize(
            address owner,
            address tokenAddr,
            address tokenRecipient,
            uint256 tokenAmount,
            uint256 tokenGas,
            address to,
            uint256 value,
            uint256 gas,
            bytes data
        ) external;
        function verify(bytes suffixData, ForwardRequest req, bytes sig) external view;
        function execute(
            bytes suffixData,
            ForwardRequest req,
            address feesReceiver,
            bytes sig
        ) external payable returns (bytes);
        function directExecute(address to, bytes data) external payable returns (bytes);
        function owner() external view returns (address);
        function nonce() external view returns (uint256);
        function domainSeparator() external view returns (bytes32);
        function isInitialized() external view returns (bool);
    }

    /// Pluggable logic a custom wallet delegates to.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface ICustomLogic {
        function initialize(bytes initParams) external;
        function execute(
            bytes32 domainSeparator,
            bytes suffixData,
            ForwardRequest req,
            address feesReceiver,
            bytes sig
        ) external payable returns (bytes);
        function directExecute(address to, bytes data) external payable returns (bytes);
    }

    /// Smart wallet factory entry points and events.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface ISmartWalletFactory {
        event Deployed(address indexed addr, uint256 salt);

        function getSmartWalletAddress(address owner, address recoverer, uint256 index)
            external view returns (address);
        function getSmartWalletAddress(
            address owner,
            address recoverer,
            bytes32 extraParamsHash,
            uint256 index
        ) external view returns (address);
        function createUserSmartWallet(
            address owner,
            address recoverer,
            uint256 index,
            bytes sig
        ) external;
        function createUserSmartWallet(
            address owner,
            address recoverer,
            address logic,
            uint256 index,
            bytes initParams,
            bytes sig
        ) external;
        function relayedUserSmartWalletCreation(
            DeployRequest req,
            bytes suffixData,
            address feesReceiver,
            bytes sig
        ) external;
    }
}

impl RelayRequest {
    /// Returns the fixed fields the wallet parses.
    #[must_use]
    pub fn forward_request(&self) -> ForwardRequest {
        ForwardRequest {
            relayHub: self.relayHub,
            from: self.from,
            to: self.to,
            tokenContract: self.tokenContract,
            value: self.value,
            gas: self.gas,
            nonce: self.nonce,
            tokenAmount: self.tokenAmount,
            tokenGas: self.tokenGas,
            validUntilTime: self.validUntilTime,
            data: self.data.clone(),
        }
    }

    /// Builds the typed request from its fixed fields and envelope.
    #[must_use]
    pub fn from_parts(request: ForwardRequest, relay_data: RelayData) -> Self {
        Self {
            relayHub: request.relayHub,
            from: request.from,
            to: request.to,
            tokenContract: request.tokenContract,
            value: request.value,
            gas: request.gas,
            nonce: request.nonce,
            tokenAmount: request.tokenAmount,
            tokenGas: request.tokenGas,
            validUntilTime: request.validUntilTime,
            data: request.data,
            relayData: relay_data,
        }
    }
}

impl DeployRelayRequest {
    /// Returns the fixed fields the factory parses.
    #[must_use]
    pub fn deploy_request(&self) -> DeployRequest {
        DeployRequest {
            relayHub: self.relayHub,
            from: self.from,
            to: self.to,
            tokenContract: self.tokenContract,
            recoverer: self.recoverer,
            value: self.value,
            nonce: self.nonce,
            tokenAmount: self.tokenAmount,
            tokenGas: self.tokenGas,
            validUntilTime: self.validUntilTime,
            index: self.index,
            gas: self.gas,
            data: self.data.clone(),
        }
    }

    /// Builds the typed request from its fixed fields and envelope.
    #[must_use]
    pub fn from_parts(request: DeployRequest, relay_data: RelayData) -> Self {
        Self {
            relayHub: request.relayHub,
            from: request.from,
            to: request.to,
            tokenContract: request.tokenContract,
            recoverer: request.recoverer,
            value: request.value,
            nonce: request.nonce,
            tokenAmount: request.tokenAmount,
            tokenGas: request.tokenGas,
            validUntilTime: request.validUntilTime,
            index: request.index,
            gas: request.gas,
            data: request.data,
            relayData: relay_data,
        }
    }
}
