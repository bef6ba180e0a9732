//! Fixtures shared by unit tests: accounts, signing helpers and a handful of
//! destination contracts.

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolInterface, SolStruct};

use crate::codec::TypedRequestCodec;
use crate::ledger::{Contract, Frame, Ledger, TxEnv, VmError};
use crate::types::{DeployRelayRequest, ICustomLogic, RelayData, RelayRequest};
use crate::wallet::{Forwarder, InitParams};

pub const HUB: Address = Address::with_last_byte(0x40);
pub const WORKER: Address = Address::with_last_byte(0xbe);
pub const VERIFIER: Address = Address::with_last_byte(0xe1);
pub const WALLET: Address = Address::with_last_byte(0xa1);
pub const RECORDER: Address = Address::with_last_byte(0x7a);
pub const REVERTER: Address = Address::with_last_byte(0x7b);
pub const SILENT_REVERTER: Address = Address::with_last_byte(0x7c);
pub const PAYER: Address = Address::with_last_byte(0x7d);
pub const LOGIC: Address = Address::with_last_byte(0x7e);
pub const BURNER: Address = Address::with_last_byte(0x7f);
pub const TOKEN: Address = Address::with_last_byte(0x70);

/// Gas [`Burner`] consumes per call in [`deployed`] ledgers.
pub const BURNED_GAS: u64 = 990_000;

pub fn owner_signer() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(0x11)).unwrap()
}

pub fn stranger_signer() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(0x22)).unwrap()
}

pub fn owner() -> Address {
    owner_signer().address()
}

pub fn relay_data(wallet: Address) -> RelayData {
    RelayData {
        gasPrice: U256::from(60_000_000),
        feesReceiver: WORKER,
        callForwarder: wallet,
        callVerifier: VERIFIER,
    }
}

/// A sponsored request from [`owner`] calling [`RECORDER`] with `data`.
pub fn relay_request(nonce: u64, data: &'static [u8]) -> RelayRequest {
    RelayRequest {
        relayHub: HUB,
        from: owner(),
        to: RECORDER,
        tokenContract: Address::ZERO,
        value: U256::ZERO,
        gas: U256::from(50_000),
        nonce: U256::from(nonce),
        tokenAmount: U256::ZERO,
        tokenGas: U256::ZERO,
        validUntilTime: U256::ZERO,
        data: Bytes::from_static(data),
        relayData: relay_data(WALLET),
    }
}

/// Suffix and signature of `request` for the wallet at `wallet`, signed by [`owner`].
pub fn sign_relay(ledger: &Ledger, wallet: Address, request: &RelayRequest) -> (Bytes, Bytes) {
    sign_relay_with(ledger, wallet, request, &owner_signer())
}

pub fn sign_relay_with(
    ledger: &Ledger,
    wallet: Address,
    request: &RelayRequest,
    signer: &PrivateKeySigner,
) -> (Bytes, Bytes) {
    let domain = TypedRequestCodec::default().domain(ledger.chain_id(), wallet);
    let hash = request.eip712_signing_hash(&domain);
    let signature = signer.sign_hash_sync(&hash).unwrap();
    (
        TypedRequestCodec::relay_suffix(request),
        Bytes::copy_from_slice(&signature.as_bytes()),
    )
}

/// Suffix and signature of `request` for a wallet predicted at `wallet`.
pub fn sign_deploy_with(
    ledger: &Ledger,
    wallet: Address,
    request: &DeployRelayRequest,
    signer: &PrivateKeySigner,
) -> (Bytes, Bytes) {
    let domain = TypedRequestCodec::default().domain(ledger.chain_id(), wallet);
    let hash = request.eip712_signing_hash(&domain);
    let signature = signer.sign_hash_sync(&hash).unwrap();
    (
        TypedRequestCodec::deploy_suffix(request),
        Bytes::copy_from_slice(&signature.as_bytes()),
    )
}

/// A ledger with `wallet` installed at [`WALLET`] and initialized for
/// [`owner`], plus [`RECORDER`], [`BURNER`] and both reverters.
pub fn deployed<W: Forwarder + 'static>(wallet: W) -> (Ledger, Arc<W>) {
    let mut ledger = Ledger::new(33);
    let wallet = Arc::new(wallet);
    ledger.install(WALLET, wallet.clone());
    ledger.install(RECORDER, Arc::new(Recorder));
    ledger.install(REVERTER, Arc::new(Reverter(Some("X"))));
    ledger.install(SILENT_REVERTER, Arc::new(Reverter(None)));
    ledger.install(BURNER, Arc::new(Burner(BURNED_GAS)));
    ledger
        .transact(TxEnv::new(owner(), WALLET), |frame| {
            wallet.initialize(frame, InitParams::new(owner()))
        })
        .unwrap();
    (ledger, wallet)
}

fn slot(n: u8) -> B256 {
    B256::with_last_byte(n)
}

fn word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

/// Remembers the last call it received and echoes the calldata.
#[derive(Debug)]
pub struct Recorder;

impl Recorder {
    pub fn calls(ledger: &Ledger) -> u64 {
        let count = U256::from_be_slice(ledger.storage(RECORDER, slot(3)).as_slice());
        count.to::<u64>()
    }

    pub fn was_called(ledger: &Ledger) -> bool {
        Self::calls(ledger) > 0
    }

    pub fn last_caller(ledger: &Ledger) -> Address {
        Address::from_word(ledger.storage(RECORDER, slot(0)))
    }

    pub fn last_value(ledger: &Ledger) -> U256 {
        U256::from_be_slice(ledger.storage(RECORDER, slot(1)).as_slice())
    }

    pub fn last_input_hash(ledger: &Ledger) -> B256 {
        ledger.storage(RECORDER, slot(2))
    }
}

impl Contract for Recorder {
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        let count = U256::from_be_slice(frame.sload(slot(3)).as_slice()) + U256::from(1);
        frame.sstore(slot(0), frame.caller().into_word())?;
        frame.sstore(slot(1), word(frame.value()))?;
        frame.sstore(slot(2), keccak256(input))?;
        frame.sstore(slot(3), word(count))?;
        Ok(Bytes::copy_from_slice(input))
    }
}

/// Always reverts, with an `Error(string)` reason or with no data at all.
#[derive(Debug)]
pub struct Reverter(pub Option<&'static str>);

impl Contract for Reverter {
    fn call(&self, _frame: &mut Frame<'_>, _input: &[u8]) -> Result<Bytes, VmError> {
        match self.0 {
            Some(reason) => Err(VmError::revert(reason)),
            None => Err(VmError::Revert(Bytes::new())),
        }
    }
}

/// Consumes a fixed amount of gas, failing out of gas when given less.
#[derive(Debug)]
pub struct Burner(pub u64);

impl Contract for Burner {
    fn call(&self, frame: &mut Frame<'_>, _input: &[u8]) -> Result<Bytes, VmError> {
        frame.charge(self.0)?;
        Ok(Bytes::new())
    }
}

/// Pays its whole native balance to whoever calls it.
#[derive(Debug)]
pub struct Payer;

impl Contract for Payer {
    fn call(&self, frame: &mut Frame<'_>, _input: &[u8]) -> Result<Bytes, VmError> {
        let balance = frame.balance(frame.address());
        frame.transfer(frame.caller(), balance)?;
        Ok(Bytes::new())
    }
}

/// Custom logic that records what reached it in the wallet's storage.
#[derive(Debug)]
pub struct TestLogic;

impl TestLogic {
    pub const INIT_SLOT: B256 = B256::with_last_byte(0xf1);
    pub const EXEC_SLOT: B256 = B256::with_last_byte(0xf2);
    pub const DIRECT_SLOT: B256 = B256::with_last_byte(0xf3);
}

impl Contract for TestLogic {
    fn call(&self, frame: &mut Frame<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        use ICustomLogic::ICustomLogicCalls as Calls;

        let call = Calls::abi_decode(input).map_err(|_| VmError::revert("logic: unknown call"))?;
        match call {
            Calls::initialize(c) => {
                frame.sstore(Self::INIT_SLOT, keccak256(&c.initParams))?;
                Ok(Bytes::new())
            }
            Calls::execute(c) => {
                frame.sstore(Self::EXEC_SLOT, c.domainSeparator)?;
                let gas = u64::try_from(c.req.gas).unwrap_or(u64::MAX);
                let output = frame.call(c.req.to, c.req.value, gas, &c.req.data)?;
                Ok(ICustomLogic::executeCall::abi_encode_returns(&output).into())
            }
            Calls::directExecute(c) => {
                frame.sstore(Self::DIRECT_SLOT, c.to.into_word())?;
                let value = frame.value();
                let output = frame.call(c.to, value, u64::MAX, &c.data)?;
                Ok(ICustomLogic::directExecuteCall::abi_encode_returns(&output).into())
            }
        }
    }
}
