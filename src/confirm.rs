//! Submission/confirmation loop
//!
//! Freshness tokens expire after a bounded block-height window, and a
//! submission built against an expired token is silently rejected, which
//! looks exactly like a dropped submission. The loop therefore re-fetches
//! a token on every attempt and bounds each confirmation poll with the
//! just-fetched expiry instead of trusting the original one.

use solana_sdk::signature::{Keypair, Signature};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::batch::{OperationBatch, SignedOperation};
use crate::errors::PipelineError;
use crate::ledger::{ConfirmationOutcome, LedgerConnection};
use crate::wallet::WalletManager;

/// Retry policy for one confirmation loop
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    /// Maximum submission attempts before giving up
    pub max_retries: u32,
    /// Fixed backoff between attempts
    pub backoff: Duration,
}

impl ConfirmPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

/// Terminal result of a confirmed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// Fee-payer signature identifying the submission
    pub signature: Signature,
    /// Attempts consumed, counting the successful one
    pub attempts: u32,
}

/// Audit identity of the submission being confirmed
pub struct SubmissionTag<'a> {
    pub audit: &'a AuditLog,
    pub item_id: &'a str,
    pub stage: &'a str,
    pub marker: Uuid,
}

/// Sign, submit, and poll until confirmed or the retry budget is spent
///
/// Each attempt fetches a fresh token, resubmits the same signed bytes, and
/// polls bounded by the fresh token's expiry. Success returns immediately.
/// An on-chain execution failure is terminal and returned at once; it is a
/// known outcome, unlike the ambiguous [`PipelineError::ConfirmationTimeout`]
/// returned when the budget runs out.
pub async fn confirm(
    connection: &dyn LedgerConnection,
    signed: &SignedOperation,
    policy: &ConfirmPolicy,
    tag: &SubmissionTag<'_>,
) -> Result<Confirmation, PipelineError> {
    let bytes = signed.to_bytes()?;
    let signature = signed.signature();

    for attempt in 0..policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(policy.backoff).await;
        }

        // A token used for a failed attempt is never reused.
        let token = match connection.fetch_freshness_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    item = tag.item_id,
                    stage = tag.stage,
                    attempt,
                    error = %e,
                    "Freshness fetch failed, attempt consumed"
                );
                continue;
            }
        };

        tag.audit
            .attempt(tag.item_id, tag.stage, tag.marker, &signature.to_string(), attempt);

        if let Err(e) = connection.submit_raw(&bytes).await {
            warn!(
                item = tag.item_id,
                stage = tag.stage,
                attempt,
                signature = %signature,
                error = %e,
                "Submission rejected"
            );
            continue;
        }

        match connection.poll_confirmation(&signature, &token).await {
            Ok(ConfirmationOutcome::Confirmed { slot }) => {
                let attempts = attempt + 1;
                info!(
                    item = tag.item_id,
                    stage = tag.stage,
                    signature = %signature,
                    slot,
                    attempts,
                    "Submission confirmed"
                );
                tag.audit
                    .confirmed(tag.item_id, tag.stage, tag.marker, &signature.to_string(), attempts);
                return Ok(Confirmation {
                    signature,
                    attempts,
                });
            }
            Ok(ConfirmationOutcome::ExecutionFailed(reason)) => {
                tag.audit.failed(
                    tag.item_id,
                    tag.stage,
                    Some(tag.marker),
                    &format!("execution failed: {reason}"),
                );
                return Err(PipelineError::ExecutionFailed {
                    signature: signature.to_string(),
                    reason,
                });
            }
            Ok(ConfirmationOutcome::Expired) => {
                warn!(
                    item = tag.item_id,
                    stage = tag.stage,
                    attempt,
                    signature = %signature,
                    "Token expired before confirmation, retrying"
                );
            }
            Err(e) => {
                warn!(
                    item = tag.item_id,
                    stage = tag.stage,
                    attempt,
                    signature = %signature,
                    error = %e,
                    "Confirmation poll failed"
                );
            }
        }
    }

    tag.audit.failed(
        tag.item_id,
        tag.stage,
        Some(tag.marker),
        &format!("confirmation timeout after {} attempts", policy.max_retries),
    );
    Err(PipelineError::ConfirmationTimeout {
        attempts: policy.max_retries,
    })
}

/// Merge, sign, and confirm one OperationBatch
///
/// Fetches the token the merged Operation is built against, signs with the
/// wallet plus the batch's auxiliary signers, records the submission intent
/// (with its idempotency marker) before any bytes leave the process, then
/// runs the confirmation loop.
pub async fn submit_batch(
    connection: &dyn LedgerConnection,
    wallet: &WalletManager,
    batch: &OperationBatch,
    policy: &ConfirmPolicy,
    audit: &AuditLog,
    item_id: &str,
    stage: &str,
) -> Result<Confirmation, PipelineError> {
    let marker = Uuid::new_v4();
    let token = connection.fetch_freshness_token().await?;
    let merged = batch.merged(token, wallet.pubkey());

    let extra: Vec<&Keypair> = batch.signers().iter().collect();
    let signed = merged.sign(wallet.keypair(), &extra)?;

    audit.submission_intent(item_id, stage, marker);

    confirm(
        connection,
        &signed,
        policy,
        &SubmissionTag {
            audit,
            item_id,
            stage,
            marker,
        },
    )
    .await
}
