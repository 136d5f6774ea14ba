//! Confirmation loop behavior against scripted ledger responses

use solana_sdk::{signature::Keypair, signer::Signer, system_instruction};
use std::sync::atomic::Ordering;
use uuid::Uuid;

use super::test_helpers::{ConfirmScript, StubConnection};
use crate::audit::AuditLog;
use crate::batch::{Operation, OperationBatch, SignedOperation};
use crate::confirm::{self, ConfirmPolicy, SubmissionTag};
use crate::errors::PipelineError;
use crate::ledger::{FreshnessToken, LedgerConnection};

async fn signed_op(connection: &StubConnection, wallet: &Keypair) -> SignedOperation {
    let token = connection.fetch_freshness_token().await.unwrap();
    let mut op = Operation::new(token, wallet.pubkey());
    op.add_instruction(system_instruction::transfer(
        &wallet.pubkey(),
        &solana_sdk::pubkey::Pubkey::new_unique(),
        1,
    ));
    op.sign(wallet, &[]).unwrap()
}

fn token_of(height: u64) -> FreshnessToken {
    FreshnessToken {
        blockhash: solana_sdk::hash::Hash::new_unique(),
        last_valid_block_height: height,
    }
}

#[tokio::test]
async fn test_confirms_on_third_attempt_of_ten() {
    let connection = StubConnection::new(ConfirmScript::ConfirmOnPoll(3));
    let wallet = Keypair::new();
    let signed = signed_op(&connection, &wallet).await;
    let audit = AuditLog::sink();

    let confirmation = confirm::confirm(
        &connection,
        &signed,
        &ConfirmPolicy::new(10, 0),
        &SubmissionTag {
            audit: &audit,
            item_id: "item",
            stage: "issued",
            marker: Uuid::new_v4(),
        },
    )
    .await
    .unwrap();

    assert_eq!(confirmation.attempts, 3);
    assert_eq!(confirmation.signature, signed.signature());
    assert_eq!(connection.submission_count(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_time_out_with_monotonic_tokens() {
    let connection = StubConnection::new(ConfirmScript::AlwaysExpire);
    let wallet = Keypair::new();
    let signed = signed_op(&connection, &wallet).await;
    let audit = AuditLog::sink();

    let err = confirm::confirm(
        &connection,
        &signed,
        &ConfirmPolicy::new(4, 0),
        &SubmissionTag {
            audit: &audit,
            item_id: "item",
            stage: "issued",
            marker: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();

    match err {
        PipelineError::ConfirmationTimeout { attempts } => assert_eq!(attempts, 4),
        other => panic!("expected timeout, got {other}"),
    }
    assert_eq!(connection.submission_count(), 4);

    // Every failed attempt consumed a strictly newer token.
    let heights = connection.token_heights.lock().unwrap();
    // one extra fetch from building the signed op
    assert_eq!(heights.len(), 5);
    assert!(heights.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_failing_freshness_consumes_whole_budget() {
    let wallet = Keypair::new();
    // Sign against a healthy connection first, then confirm against one
    // whose freshness provider is down.
    let healthy = StubConnection::new(ConfirmScript::AlwaysConfirm);
    let signed = signed_op(&healthy, &wallet).await;

    let connection =
        StubConnection::new(ConfirmScript::AlwaysConfirm).with_failing_freshness();
    let audit = AuditLog::sink();

    let err = confirm::confirm(
        &connection,
        &signed,
        &ConfirmPolicy::new(10, 0),
        &SubmissionTag {
            audit: &audit,
            item_id: "item",
            stage: "issued",
            marker: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();

    match err {
        PipelineError::ConfirmationTimeout { attempts } => assert_eq!(attempts, 10),
        other => panic!("expected timeout, got {other}"),
    }
    // Nothing was ever submitted: every attempt died at the token fetch.
    assert_eq!(connection.submission_count(), 0);
    assert_eq!(connection.token_fetches.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_execution_failure_is_terminal() {
    let connection =
        StubConnection::new(ConfirmScript::FailExecution("custom program error: 0x1".into()));
    let wallet = Keypair::new();
    let signed = signed_op(&connection, &wallet).await;
    let audit = AuditLog::sink();

    let err = confirm::confirm(
        &connection,
        &signed,
        &ConfirmPolicy::new(10, 0),
        &SubmissionTag {
            audit: &audit,
            item_id: "item",
            stage: "issued",
            marker: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();

    match &err {
        PipelineError::ExecutionFailed { reason, .. } => {
            assert!(reason.contains("custom program error"));
        }
        other => panic!("expected execution failure, got {other}"),
    }
    assert!(!err.is_ambiguous());
    // No retry after a known on-chain failure.
    assert_eq!(connection.submission_count(), 1);
}

#[tokio::test]
async fn test_submit_batch_records_intent_before_confirmation() {
    let connection = StubConnection::new(ConfirmScript::AlwaysConfirm);
    let wallet = crate::wallet::WalletManager::from_keypair(Keypair::new());

    let file = tempfile::NamedTempFile::new().unwrap();
    let audit = AuditLog::open(file.path().to_str().unwrap()).unwrap();

    let mut batch = OperationBatch::new();
    batch.add_operation(Operation::new(token_of(1), wallet.pubkey()));

    confirm::submit_batch(
        &connection,
        &wallet,
        &batch,
        &ConfirmPolicy::new(3, 0),
        &audit,
        "item-1",
        "issued",
    )
    .await
    .unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    let events: Vec<String> = content
        .lines()
        .map(|line| {
            serde_json::from_str::<serde_json::Value>(line).unwrap()["event"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(events, vec!["submission_intent", "attempt", "confirmed"]);

    // The intent marker is carried through to the confirmation record.
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["marker"], lines[2]["marker"]);
}
