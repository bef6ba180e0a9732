//! State-machine properties every wallet variant must satisfy.
//!
//! Each test body is written once, generic over the variant, and
//! instantiated per variant by `conformance_suite!`.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use enveloping::timestamp::UnixTimestamp;

use super::{Forwarder, InitParams};
use crate::error::ForwarderError;
use crate::ledger::{Erc20Token, Ledger, TxEnv, VmError, revert_reason};
use crate::testutil::{
    BURNER, HUB, RECORDER, REVERTER, Recorder, TOKEN, WALLET, WORKER, deployed,
    owner, relay_request, sign_relay, sign_relay_with, stranger_signer,
};
use crate::types::{ISmartWallet, RelayRequest};

fn execute<W: Forwarder>(
    ledger: &mut Ledger,
    wallet: &Arc<W>,
    submitter: Address,
    request: &RelayRequest,
    suffix: &Bytes,
    signature: &Bytes,
) -> Result<Bytes, ForwarderError> {
    ledger.transact(TxEnv::new(submitter, WALLET), |frame| {
        wallet.execute(
            frame,
            suffix,
            &request.forward_request(),
            WORKER,
            signature,
        )
    })
}

fn nonce(ledger: &Ledger) -> U256 {
    ledger.wallet(WALLET).map(super::WalletState::nonce).unwrap_or_default()
}

pub(super) fn initialize_twice_fails<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let err = ledger
        .transact(TxEnv::new(owner(), WALLET), |frame| {
            wallet.initialize(frame, InitParams::new(WORKER))
        })
        .unwrap_err();
    assert_eq!(err, ForwarderError::AlreadyInitialized);
    assert_eq!(ledger.wallet(WALLET).unwrap().owner(), owner());
}

pub(super) fn initialize_binds_owner_and_domain<W: Forwarder + 'static>(wallet: W) {
    let (ledger, wallet) = deployed(wallet);
    let state = ledger.wallet(WALLET).unwrap();
    assert!(state.is_initialized());
    assert_eq!(state.owner(), owner());
    assert_eq!(state.nonce(), U256::ZERO);
    assert_eq!(
        state.domain_separator(),
        wallet.core().codec().domain_separator(33, WALLET)
    );
}

pub(super) fn execute_succeeds_exactly_once<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let request = relay_request(0, b"\xca\xfe");
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);

    let output = execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature).unwrap();
    assert_eq!(output, Bytes::from_static(b"\xca\xfe"));
    assert_eq!(nonce(&ledger), U256::from(1));
    assert_eq!(Recorder::calls(&ledger), 1);
    assert_eq!(Recorder::last_caller(&ledger), WALLET);
    assert_eq!(
        Recorder::last_input_hash(&ledger),
        alloy_primitives::keccak256(b"\xca\xfe")
    );

    let replay = execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature);
    assert_eq!(replay, Err(ForwarderError::NonceMismatch));
    assert_eq!(nonce(&ledger), U256::from(1));
    assert_eq!(Recorder::calls(&ledger), 1);
}

pub(super) fn wrong_caller_is_rejected<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let request = relay_request(0, b"");
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    let err = execute(&mut ledger, &wallet, WORKER, &request, &suffix, &signature);
    assert_eq!(err, Err(ForwarderError::InvalidCaller));
    assert_eq!(nonce(&ledger), U256::ZERO);
}

pub(super) fn foreign_signatures_are_rejected<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let request = relay_request(0, b"");
    let (suffix, forged) = sign_relay_with(&ledger, WALLET, &request, &stranger_signer());
    let err = execute(&mut ledger, &wallet, HUB, &request, &suffix, &forged);
    assert_eq!(err, Err(ForwarderError::SignatureMismatch));

    let mut impostor = relay_request(0, b"");
    impostor.from = stranger_signer().address();
    let (suffix, signature) = sign_relay_with(&ledger, WALLET, &impostor, &stranger_signer());
    let err = execute(&mut ledger, &wallet, HUB, &impostor, &suffix, &signature);
    assert_eq!(err, Err(ForwarderError::NotOwner));
}

pub(super) fn verify_precedence_and_purity<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let request = relay_request(3, b"");
    let (suffix, forged) = sign_relay_with(&ledger, WALLET, &request, &stranger_signer());
    let result = ledger.transact(TxEnv::new(HUB, WALLET), |frame| {
        wallet.verify(frame, &suffix, &request.forward_request(), &forged)
    });
    assert_eq!(result, Err(ForwarderError::NonceMismatch));

    let request = relay_request(0, b"");
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    ledger
        .transact(TxEnv::new(HUB, WALLET), |frame| {
            wallet.verify(frame, &suffix, &request.forward_request(), &signature)
        })
        .unwrap();
    assert_eq!(nonce(&ledger), U256::ZERO);
}

pub(super) fn tampered_suffix_is_rejected<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let request = relay_request(0, b"");
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    let mut tampered = suffix.to_vec();
    tampered[31] ^= 0xff;
    let err = execute(
        &mut ledger,
        &wallet,
        HUB,
        &request,
        &tampered.into(),
        &signature,
    );
    assert_eq!(err, Err(ForwarderError::SignatureMismatch));
}

pub(super) fn sponsored_request_moves_no_funds<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let request = relay_request(0, b"");
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature).unwrap();
    assert_eq!(ledger.balance_of(WORKER), U256::ZERO);
}

pub(super) fn sponsored_token_request_leaves_token_untouched<W: Forwarder + 'static>(
    wallet: W,
) {
    let (mut ledger, wallet) = deployed(wallet);
    ledger.install(TOKEN, Arc::new(Erc20Token::new()));
    Erc20Token::mint(&mut ledger, TOKEN, WALLET, U256::from(100));
    let logs = ledger.logs().len();

    let mut request = relay_request(0, b"\x01");
    request.tokenContract = TOKEN;
    request.tokenGas = U256::from(60_000);
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature).unwrap();

    assert_eq!(Recorder::calls(&ledger), 1);
    assert_eq!(ledger.logs().len(), logs);
    assert_eq!(Erc20Token::balance(&ledger, TOKEN, WALLET), U256::from(100));
    assert_eq!(Erc20Token::balance(&ledger, TOKEN, WORKER), U256::ZERO);
}

pub(super) fn native_fee_is_exact<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    ledger.fund(WALLET, U256::from(100));
    let held = |ledger: &Ledger| ledger.balance_of(WALLET) + ledger.balance_of(owner());
    let before = held(&ledger);

    let mut request = relay_request(0, b"");
    request.tokenAmount = U256::from(10);
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature).unwrap();

    assert_eq!(ledger.balance_of(WORKER), U256::from(10));
    assert_eq!(held(&ledger), before - U256::from(10));
}

pub(super) fn destination_revert_is_bubbled_and_rolled_back<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    ledger.fund(WALLET, U256::from(100));
    let mut request = relay_request(0, b"");
    request.to = REVERTER;
    request.tokenAmount = U256::from(10);
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);

    let err = execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature).unwrap_err();
    assert_eq!(err.to_string(), "X");
    assert_eq!(revert_reason(&err.revert_data()), "X");
    assert_eq!(nonce(&ledger), U256::ZERO);
    assert_eq!(ledger.balance_of(WORKER), U256::ZERO);
    assert_eq!(ledger.balance_of(WALLET), U256::from(100));
}

pub(super) fn expiry_is_enforced<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    ledger.set_timestamp(UnixTimestamp::from_secs(1_000));

    let mut request = relay_request(0, b"");
    request.validUntilTime = U256::from(1_000);
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    let err = execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature);
    assert_eq!(err, Err(ForwarderError::Expired));

    request.validUntilTime = U256::from(1_001);
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature).unwrap();

    let mut request = relay_request(1, b"");
    request.validUntilTime = U256::from(1_030);
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    ledger.advance(30);
    let err = execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature);
    assert_eq!(err, Err(ForwarderError::Expired));
    assert_eq!(nonce(&ledger), U256::from(1));
}

pub(super) fn insufficient_gas_is_rejected<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let mut request = relay_request(0, b"");
    request.gas = U256::from(10_000_000);
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
    let err = execute(&mut ledger, &wallet, HUB, &request, &suffix, &signature);
    assert_eq!(err, Err(ForwarderError::InsufficientGas));
    assert_eq!(nonce(&ledger), U256::ZERO);
}

pub(super) fn declared_gas_reaches_destination<W: Forwarder + Clone + 'static>(wallet: W) {
    let mut request = relay_request(0, b"");
    request.to = BURNER;
    request.gas = U256::from(1_000_000);
    let (mut delivered, mut refused) = (0, 0);

    for gas_limit in (1_000_000..=1_200_000).step_by(2_000) {
        let (mut ledger, wallet) = deployed(wallet.clone());
        let (suffix, signature) = sign_relay(&ledger, WALLET, &request);
        let tx = TxEnv::new(HUB, WALLET).with_gas_limit(gas_limit);
        let result = ledger.transact(tx, |frame| {
            wallet.execute(frame, &suffix, &request.forward_request(), WORKER, &signature)
        });
        match result {
            Ok(_) => delivered += 1,
            Err(ForwarderError::InsufficientGas) => refused += 1,
            Err(err) => panic!("gas limit {gas_limit}: destination starved: {err}"),
        }
    }
    assert!(delivered > 0 && refused > 0);
}

pub(super) fn direct_execute_is_owner_only<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, wallet) = deployed(wallet);
    let err = ledger.transact(TxEnv::new(WORKER, WALLET), |frame| {
        wallet.direct_execute(frame, RECORDER, b"\x01")
    });
    assert_eq!(err, Err(ForwarderError::NotOwner));

    ledger.fund(WALLET, U256::from(30));
    ledger.fund(owner(), U256::from(5));
    let output = ledger
        .transact(
            TxEnv::new(owner(), WALLET).with_value(U256::from(5)),
            |frame| wallet.direct_execute(frame, RECORDER, b"\x01"),
        )
        .unwrap();
    assert_eq!(output, Bytes::from_static(b"\x01"));
    assert_eq!(Recorder::last_caller(&ledger), WALLET);
    assert_eq!(Recorder::last_value(&ledger), U256::from(5));
    assert_eq!(ledger.balance_of(owner()), U256::from(30));
    assert_eq!(ledger.balance_of(WALLET), U256::ZERO);
}

pub(super) fn abi_surface_matches_typed_surface<W: Forwarder + 'static>(wallet: W) {
    let (mut ledger, _wallet) = deployed(wallet);
    let request = relay_request(0, b"\x42");
    let (suffix, signature) = sign_relay(&ledger, WALLET, &request);

    let input = ISmartWallet::executeCall {
        suffixData: suffix,
        req: request.forward_request(),
        feesReceiver: WORKER,
        sig: signature,
    }
    .abi_encode();
    let output = ledger.call(TxEnv::new(HUB, WALLET), &input).unwrap();
    let returned = ISmartWallet::executeCall::abi_decode_returns(&output).unwrap();
    assert_eq!(returned, Bytes::from_static(b"\x42"));

    let replay = ledger.call(TxEnv::new(HUB, WALLET), &input).unwrap_err();
    assert_eq!(replay, VmError::revert("nonce mismatch"));

    let read = |ledger: &mut Ledger, input: Vec<u8>| {
        ledger.call(TxEnv::new(WORKER, WALLET), &input).unwrap()
    };
    let out = read(&mut ledger, ISmartWallet::nonceCall {}.abi_encode());
    assert_eq!(U256::abi_decode(&out).unwrap(), U256::from(1));
    let out = read(&mut ledger, ISmartWallet::ownerCall {}.abi_encode());
    assert_eq!(Address::abi_decode(&out).unwrap(), owner());
    let out = read(&mut ledger, ISmartWallet::isInitializedCall {}.abi_encode());
    assert!(bool::abi_decode(&out).unwrap());

    let again = ISmartWallet::initialize_0Call {
        owner: WORKER,
        tokenAddr: Address::ZERO,
        tokenRecipient: Address::ZERO,
        tokenAmount: U256::ZERO,
        tokenGas: U256::ZERO,
    }
    .abi_encode();
    let err = ledger.call(TxEnv::new(WORKER, WALLET), &again).unwrap_err();
    assert_eq!(err, VmError::revert("Already initialized"));
}

macro_rules! conformance_suite {
    ($variant:ident, $ctor:expr) => {
        mod $variant {
            use super::*;

            #[test]
            fn test_initialize_twice_fails() {
                initialize_twice_fails($ctor);
            }

            #[test]
            fn test_initialize_binds_owner_and_domain() {
                initialize_binds_owner_and_domain($ctor);
            }

            #[test]
            fn test_execute_succeeds_exactly_once() {
                execute_succeeds_exactly_once($ctor);
            }

            #[test]
            fn test_wrong_caller_is_rejected() {
                wrong_caller_is_rejected($ctor);
            }

            #[test]
            fn test_foreign_signatures_are_rejected() {
                foreign_signatures_are_rejected($ctor);
            }

            #[test]
            fn test_verify_precedence_and_purity() {
                verify_precedence_and_purity($ctor);
            }

            #[test]
            fn test_tampered_suffix_is_rejected() {
                tampered_suffix_is_rejected($ctor);
            }

            #[test]
            fn test_sponsored_request_moves_no_funds() {
                sponsored_request_moves_no_funds($ctor);
            }

            #[test]
            fn test_sponsored_token_request_leaves_token_untouched() {
                sponsored_token_request_leaves_token_untouched($ctor);
            }

            #[test]
            fn test_native_fee_is_exact() {
                native_fee_is_exact($ctor);
            }

            #[test]
            fn test_destination_revert_is_bubbled_and_rolled_back() {
                destination_revert_is_bubbled_and_rolled_back($ctor);
            }

            #[test]
            fn test_expiry_is_enforced() {
                expiry_is_enforced($ctor);
            }

            #[test]
            fn test_insufficient_gas_is_rejected() {
                insufficient_gas_is_rejected($ctor);
            }

            #[test]
            fn test_declared_gas_reaches_destination() {
                declared_gas_reaches_destination($ctor);
            }

            #[test]
            fn test_direct_execute_is_owner_only() {
                direct_execute_is_owner_only($ctor);
            }

            #[test]
            fn test_abi_surface_matches_typed_surface() {
                abi_surface_matches_typed_surface($ctor);
            }
        }
    };
}

conformance_suite!(smart, crate::wallet::SmartWallet::default());
conformance_suite!(custom, crate::wallet::CustomSmartWallet::default());
conformance_suite!(minimal_boltz, crate::wallet::MinimalBoltzSmartWallet::default());
