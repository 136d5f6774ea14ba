//! End-to-end pipeline runs over the scripted connection

use std::time::Duration;

use super::test_helpers::{resolved_item, ConfirmScript, TestEnv};
use crate::checkpoint::{CheckpointStore, StageCheckpoint};
use crate::errors::PipelineError;
use crate::metadata::MetadataClient;
use crate::pipeline::Pipeline;
use crate::types::{ItemState, StageOutputs, MAX_BATCH_ITEMS};

fn metadata_client() -> MetadataClient {
    MetadataClient::new(Duration::from_secs(1)).unwrap()
}

#[tokio::test]
async fn test_single_item_settles_through_all_stages() {
    let env = TestEnv::new(ConfirmScript::AlwaysConfirm, 3);
    let dir = tempfile::tempdir().unwrap();
    let checkpoints = CheckpointStore::open(dir.path().to_str().unwrap()).unwrap();
    let metadata = metadata_client();
    let pipeline = Pipeline::new(env.ctx(), &checkpoints, &metadata, MAX_BATCH_ITEMS);

    let item = resolved_item("https://meta/1.json", 1, 0);
    let summary = pipeline.run(vec![item]).await.unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.settled, vec!["https://meta/1.json".to_string()]);

    // issue 1, edition 1, escrow 4, auction 4, validate 1, start 1;
    // settlement itself submits nothing
    assert_eq!(env.connection.submission_count(), 12);

    // Settled items leave no checkpoint behind.
    assert!(checkpoints.get("https://meta/1.json").unwrap().is_none());
}

#[tokio::test]
async fn test_oversized_batch_is_rejected_before_any_submission() {
    let env = TestEnv::new(ConfirmScript::AlwaysConfirm, 3);
    let checkpoints = CheckpointStore::disabled();
    let metadata = metadata_client();
    let pipeline = Pipeline::new(env.ctx(), &checkpoints, &metadata, MAX_BATCH_ITEMS);

    let items: Vec<_> = (0..=MAX_BATCH_ITEMS)
        .map(|i| resolved_item(&format!("https://meta/{i}.json"), 1, 0))
        .collect();
    let err = pipeline.run(items).await.unwrap_err();

    assert!(matches!(err, PipelineError::InputValidation(_)));
    assert!(!err.is_item_scoped());
    assert_eq!(env.connection.submission_count(), 0);
}

#[tokio::test]
async fn test_malformed_item_aborts_before_any_submission() {
    let env = TestEnv::new(ConfirmScript::AlwaysConfirm, 3);
    let checkpoints = CheckpointStore::disabled();
    let metadata = metadata_client();
    let pipeline = Pipeline::new(env.ctx(), &checkpoints, &metadata, MAX_BATCH_ITEMS);

    // 300 sellable editions cannot be encoded into the validation range.
    let oversupplied = resolved_item("https://meta/1.json", 300, 0);
    let err = pipeline.run(vec![oversupplied]).await.unwrap_err();
    assert!(matches!(err, PipelineError::InputValidation(_)));
    assert_eq!(env.connection.submission_count(), 0);

    let mut priced_wrong = resolved_item("https://meta/2.json", 1, 0);
    priced_wrong.price = f64::NAN;
    let err = pipeline.run(vec![priced_wrong]).await.unwrap_err();
    assert!(matches!(err, PipelineError::InputValidation(_)));
    assert_eq!(env.connection.submission_count(), 0);
}

#[tokio::test]
async fn test_auction_open_failure_stops_later_stages() {
    // First six submissions (issue, edition, escrow's four) confirm; the
    // auction creation never does.
    let env = TestEnv::new(ConfirmScript::ConfirmFirstN(6), 2);
    let dir = tempfile::tempdir().unwrap();
    let checkpoints = CheckpointStore::open(dir.path().to_str().unwrap()).unwrap();
    let metadata = metadata_client();
    let pipeline = Pipeline::new(env.ctx(), &checkpoints, &metadata, MAX_BATCH_ITEMS);

    let item = resolved_item("https://meta/1.json", 1, 0);
    let summary = pipeline.run(vec![item]).await.unwrap();

    assert!(summary.settled.is_empty());
    assert_eq!(summary.abandoned.len(), 1);
    let abandoned = &summary.abandoned[0];
    assert_eq!(abandoned.item_id, "https://meta/1.json");
    assert_eq!(abandoned.stage, "auction_opened");
    assert!(abandoned.error.is_ambiguous());

    // Six confirmed plus the two retries of the failing submission; the
    // validate/start/settle stages were never attempted.
    assert_eq!(env.connection.submission_count(), 8);

    // The checkpoint still points at the last confirmed stage.
    let checkpoint = checkpoints.get("https://meta/1.json").unwrap().unwrap();
    assert_eq!(checkpoint.state, ItemState::EscrowFunded);
}

#[tokio::test]
async fn test_abandoned_item_does_not_stop_the_batch() {
    let env = TestEnv::new(ConfirmScript::ConfirmFirstN(6), 1);
    let checkpoints = CheckpointStore::disabled();
    let metadata = metadata_client();
    let pipeline = Pipeline::new(env.ctx(), &checkpoints, &metadata, MAX_BATCH_ITEMS);

    // The first item fails at auction open; the stub then confirms nothing
    // for the second either, but the run itself must still complete.
    let items = vec![
        resolved_item("https://meta/1.json", 1, 0),
        resolved_item("https://meta/2.json", 1, 0),
    ];
    let summary = pipeline.run(items).await.unwrap();

    assert_eq!(summary.abandoned.len(), 2);
    assert!(summary.settled.is_empty());
}

#[tokio::test]
async fn test_resume_skips_confirmed_stages() {
    let env = TestEnv::new(ConfirmScript::AlwaysConfirm, 3);
    let dir = tempfile::tempdir().unwrap();
    let checkpoints = CheckpointStore::open(dir.path().to_str().unwrap()).unwrap();
    let metadata = metadata_client();

    // A previous run confirmed everything up to the validated auction.
    let mut outputs = StageOutputs::default();
    outputs.mint = Some(solana_sdk::pubkey::Pubkey::new_unique().to_string());
    outputs.edition_mints = vec![solana_sdk::pubkey::Pubkey::new_unique().to_string()];
    outputs.auction = Some(solana_sdk::pubkey::Pubkey::new_unique().to_string());
    outputs.auction_manager = Some(solana_sdk::pubkey::Pubkey::new_unique().to_string());
    checkpoints
        .put(
            "https://meta/1.json",
            &StageCheckpoint {
                state: ItemState::AuctionValidated,
                outputs,
            },
        )
        .unwrap();

    let pipeline = Pipeline::new(env.ctx(), &checkpoints, &metadata, MAX_BATCH_ITEMS);
    let item = resolved_item("https://meta/1.json", 1, 0);
    let summary = pipeline.run(vec![item]).await.unwrap();

    assert_eq!(summary.settled.len(), 1);
    // Only the auction start was submitted; settlement is local.
    assert_eq!(env.connection.submission_count(), 1);
    assert!(checkpoints.get("https://meta/1.json").unwrap().is_none());
}
