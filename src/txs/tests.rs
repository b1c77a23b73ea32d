use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_system_interface::program as system_program;

use crate::config::CommitmentSetting;
use crate::instructions::{CreateAccountRequest, system};
use crate::rpc::fake::FakeLedger;
use crate::rpc::{ConfirmationLevel, LedgerError, LedgerRpc, Rejection};

use super::orchestrator::PreparedTransaction;
use super::{OrchestratorConfig, TransactionOrchestrator, TxError};

const PAYER_FUNDS: u64 = 10_000_000_000;

fn make_config() -> OrchestratorConfig {
    OrchestratorConfig {
        commitment: CommitmentSetting::Confirmed,
        confirm_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(5),
        compute_unit_price_micro_lamports: 0,
    }
}

fn setup() -> (Arc<FakeLedger>, TransactionOrchestrator, Keypair) {
    let ledger = Arc::new(FakeLedger::new());
    let payer = Keypair::new();
    ledger.fund(&payer.pubkey(), PAYER_FUNDS);
    let rpc: Arc<dyn LedgerRpc> = ledger.clone();
    let orchestrator = TransactionOrchestrator::new(rpc, make_config());
    (ledger, orchestrator, payer)
}

fn rejection(err: &TxError) -> Option<&Rejection> {
    match err {
        TxError::Ledger(LedgerError::Rejected(rejection)) => Some(rejection),
        _ => None,
    }
}

fn payer_balance(ledger: &FakeLedger, payer: &Keypair) -> Option<u64> {
    ledger.account(&payer.pubkey()).map(|account| account.lamports)
}

fn create_request(space: u64) -> CreateAccountRequest {
    CreateAccountRequest {
        space,
        lamports: FakeLedger::rent_minimum(space),
        owner: system_program::ID,
    }
}

#[tokio::test]
async fn create_account_confirms_and_lands() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let request = create_request(100);
    let built = vec![system::create_account(
        &payer.pubkey(),
        &new_account.pubkey(),
        &request,
    )];

    let prepared = orchestrator
        .prepare("create_account", built, &payer, &[&new_account])
        .await
        .expect("transaction signed");
    assert_eq!(prepared.transaction.signatures.len(), 2);
    assert_eq!(ledger.submissions(), 0);

    let confirmed = orchestrator
        .submit("create_account", &prepared)
        .await
        .expect("transaction confirmed");
    assert_eq!(confirmed.signature, prepared.transaction.signatures[0]);
    let account = ledger.account(&new_account.pubkey()).expect("account exists");
    assert_eq!(account.lamports, request.lamports);
    assert_eq!(account.space, 100);
    assert_eq!(account.owner, system_program::ID);
}

#[tokio::test]
async fn missing_signer_fails_before_submission() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let built = vec![system::create_account(
        &payer.pubkey(),
        &new_account.pubkey(),
        &create_request(0),
    )];

    let err = orchestrator
        .execute("create_account", built, &payer, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, TxError::MissingSigner(key) if key == new_account.pubkey()));
    assert_eq!(err.kind(), "local");
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn wrong_keypair_for_new_account_is_missing_signer() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let impostor = Keypair::new();
    let built = vec![system::create_account(
        &payer.pubkey(),
        &new_account.pubkey(),
        &create_request(0),
    )];

    let err = orchestrator
        .execute("create_account", built, &payer, &[&impostor])
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::MissingSigner(_)));
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn missing_signer_detected_before_network() {
    let (ledger, orchestrator, payer) = setup();
    ledger.fail_transport(true);
    let base = Keypair::new();

    let err = orchestrator
        .execute(
            "assign",
            vec![system::assign(&base.pubkey(), &Pubkey::new_unique())],
            &payer,
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::MissingSigner(key) if key == base.pubkey()));
}

#[tokio::test]
async fn empty_instruction_list_rejected() {
    let (_ledger, orchestrator, payer) = setup();
    let err = orchestrator
        .execute("noop", Vec::new(), &payer, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::EmptyInstructions));
}

#[tokio::test]
async fn forged_payer_signature_rejected_remotely_without_state_change() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let built = vec![system::create_account(
        &payer.pubkey(),
        &new_account.pubkey(),
        &create_request(0),
    )];
    let mut prepared = orchestrator
        .prepare("create_account", built, &payer, &[&new_account])
        .await
        .expect("transaction signed");
    prepared.transaction.signatures = vec![Signature::new_unique(), Signature::default()];

    let err = orchestrator
        .submit("create_account", &prepared)
        .await
        .unwrap_err();
    assert_eq!(rejection(&err), Some(&Rejection::MissingSignature));
    assert!(ledger.account(&new_account.pubkey()).is_none());
    assert_eq!(payer_balance(&ledger, &payer), Some(PAYER_FUNDS));
}

#[tokio::test]
async fn omitted_new_account_signature_never_creates_account() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let request = create_request(64);
    let message = solana_sdk::message::Message::new(
        &[system::create_account(&payer.pubkey(), &new_account.pubkey(), &request).instruction],
        Some(&payer.pubkey()),
    );
    let anchor = ledger
        .query_latest_freshness_anchor()
        .await
        .expect("anchor available");
    let mut transaction = solana_sdk::transaction::Transaction::new_unsigned(message);
    transaction
        .try_partial_sign(&[&payer], anchor.blockhash)
        .expect("payer signs its own slot");
    assert_eq!(transaction.signatures[1], Signature::default());

    let err = orchestrator
        .submit(
            "create_account",
            &PreparedTransaction {
                transaction,
                anchor,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(rejection(&err), Some(&Rejection::MissingSignature));
    assert!(ledger.account(&new_account.pubkey()).is_none());
    assert_eq!(payer_balance(&ledger, &payer), Some(PAYER_FUNDS));
}

#[tokio::test]
async fn duplicate_resubmission_returns_same_signature() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let built = vec![system::create_account(
        &payer.pubkey(),
        &new_account.pubkey(),
        &create_request(0),
    )];
    let prepared = orchestrator
        .prepare("create_account", built, &payer, &[&new_account])
        .await
        .expect("transaction signed");
    let first = orchestrator
        .submit("create_account", &prepared)
        .await
        .expect("first submission confirmed");
    let accounts_after_first = ledger.account_count();
    let payer_after_first = payer_balance(&ledger, &payer);

    let again = orchestrator
        .submit("create_account", &prepared)
        .await
        .expect("duplicate resolves to the original signature");

    assert_eq!(again.signature, first.signature);
    assert_eq!(ledger.account_count(), accounts_after_first);
    assert_eq!(payer_balance(&ledger, &payer), payer_after_first);
    assert_eq!(ledger.submissions(), 2);
}

#[tokio::test]
async fn expired_anchor_is_distinguishable() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let built = vec![system::create_account(
        &payer.pubkey(),
        &new_account.pubkey(),
        &create_request(0),
    )];
    let prepared = orchestrator
        .prepare("create_account", built, &payer, &[&new_account])
        .await
        .expect("transaction signed");

    ledger.advance_blocks(500);
    let err = orchestrator
        .submit("create_account", &prepared)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TxError::AnchorExpired { last_valid_block_height }
            if last_valid_block_height == prepared.anchor.last_valid_block_height
    ));
    assert_eq!(err.kind(), "anchor_expired");
    assert_eq!(ledger.submissions(), 0);
    assert!(ledger.account(&new_account.pubkey()).is_none());
}

#[tokio::test]
async fn anchor_expiring_while_waiting_reported() {
    let (ledger, orchestrator, payer) = setup();
    ledger.withhold_status(true);
    ledger.advance_blocks_on_submit(1_000);

    let err = orchestrator
        .execute(
            "transfer",
            vec![system::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1_000_000)],
            &payer,
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::AnchorExpired { .. }));
}

#[tokio::test]
async fn confirmation_timeout_is_unknown_not_failure() {
    let (ledger, orchestrator, payer) = setup();
    ledger.withhold_status(true);
    let recipient = Pubkey::new_unique();

    let err = orchestrator
        .execute(
            "transfer",
            vec![system::transfer(&payer.pubkey(), &recipient, 1_000_000)],
            &payer,
            &[],
        )
        .await
        .unwrap_err();

    match err {
        TxError::ConfirmationUnknown { waited, .. } => {
            assert!(waited >= Duration::from_millis(200));
        }
        other => panic!("expected unknown outcome, got {other:?}"),
    }
    // 交易实际已落账，调用方需自行重新查询。
    assert_eq!(ledger.account(&recipient).map(|a| a.lamports), Some(1_000_000));
}

#[tokio::test]
async fn waits_for_configured_confirmation_level() {
    let (ledger, orchestrator, payer) = setup();
    ledger.set_confirmation_level(ConfirmationLevel::Processed);

    let err = orchestrator
        .execute(
            "transfer",
            vec![system::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1_000_000)],
            &payer,
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::ConfirmationUnknown { .. }));
}

#[tokio::test]
async fn transport_failure_surfaces_before_signing() {
    let (ledger, orchestrator, payer) = setup();
    ledger.fail_transport(true);

    let err = orchestrator
        .execute(
            "transfer",
            vec![system::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1)],
            &payer,
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::Ledger(LedgerError::Transport(_))));
    assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn insufficient_rent_rejected_with_no_account() {
    let (ledger, orchestrator, payer) = setup();
    let new_account = Keypair::new();
    let request = CreateAccountRequest {
        space: 100,
        lamports: FakeLedger::rent_minimum(100) - 1,
        owner: system_program::ID,
    };

    let err = orchestrator
        .execute(
            "create_account",
            vec![system::create_account(
                &payer.pubkey(),
                &new_account.pubkey(),
                &request,
            )],
            &payer,
            &[&new_account],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        rejection(&err),
        Some(Rejection::InsufficientFundsForRent { .. })
    ));
    assert!(ledger.account(&new_account.pubkey()).is_none());
    assert_eq!(payer_balance(&ledger, &payer), Some(PAYER_FUNDS));
}

#[tokio::test]
async fn compute_unit_price_prepended_when_configured() {
    let ledger = Arc::new(FakeLedger::new());
    let payer = Keypair::new();
    ledger.fund(&payer.pubkey(), PAYER_FUNDS);
    let rpc: Arc<dyn LedgerRpc> = ledger.clone();
    let config = OrchestratorConfig {
        compute_unit_price_micro_lamports: 1_000,
        ..make_config()
    };
    let orchestrator = TransactionOrchestrator::new(rpc, config);

    let prepared = orchestrator
        .prepare(
            "transfer",
            vec![system::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1_000_000)],
            &payer,
            &[],
        )
        .await
        .expect("transaction signed");
    assert_eq!(prepared.transaction.message.instructions.len(), 2);
    orchestrator
        .submit("transfer", &prepared)
        .await
        .expect("transaction confirmed");
}
