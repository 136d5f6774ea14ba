//! Ledger connection seam
//!
//! The pipeline talks to the network through the [`LedgerConnection`] trait
//! so the confirmation loop and stage sequencing can be exercised against
//! scripted stubs. The production implementation wraps the nonblocking
//! Solana RPC client.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::TransactionConfirmationStatus;
use std::time::Duration;
use tracing::debug;

use crate::errors::PipelineError;

/// Short-lived submission reference: a recent blockhash and the block
/// height after which it is no longer accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessToken {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Result of polling one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The ledger applied the transaction
    Confirmed {
        /// Slot the confirmation was observed at
        slot: u64,
    },
    /// The ledger executed the transaction and it failed
    ///
    /// Terminal: the same bytes can never succeed.
    ExecutionFailed(String),
    /// The token's validity window passed without the signature appearing
    ///
    /// Indistinguishable from a dropped submission; the caller retries
    /// with a fresh token.
    Expired,
}

/// Narrow interface over the ledger network
///
/// All calls block on network I/O; none retry internally. Retry policy
/// lives entirely in the confirmation loop.
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Fetch the current freshness token
    async fn fetch_freshness_token(&self) -> Result<FreshnessToken, PipelineError>;

    /// Submit raw signed transaction bytes, returning the signature
    async fn submit_raw(&self, bytes: &[u8]) -> Result<Signature, PipelineError>;

    /// Poll for confirmation of a submission, bounded by the token's expiry
    async fn poll_confirmation(
        &self,
        signature: &Signature,
        token: &FreshnessToken,
    ) -> Result<ConfirmationOutcome, PipelineError>;

    /// Fetch raw account data, or `None` if the account does not exist
    async fn get_account_state(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, PipelineError>;

    /// Minimum lamports for rent exemption at the given data size
    async fn minimum_balance_for_rent_exemption(&self, size: usize)
        -> Result<u64, PipelineError>;
}

/// Production connection over the nonblocking Solana RPC client
pub struct RpcConnection {
    client: RpcClient,
    commitment: CommitmentConfig,
    poll_interval: Duration,
}

impl RpcConnection {
    /// Connect to an RPC endpoint with the given timeout and poll interval
    pub fn new(url: String, timeout: Duration, poll_interval: Duration) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url, timeout, commitment),
            commitment,
            poll_interval,
        }
    }
}

#[async_trait]
impl LedgerConnection for RpcConnection {
    async fn fetch_freshness_token(&self) -> Result<FreshnessToken, PipelineError> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| PipelineError::FreshnessFetch(e.to_string()))?;
        Ok(FreshnessToken {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn submit_raw(&self, bytes: &[u8]) -> Result<Signature, PipelineError> {
        let tx: Transaction = bincode::deserialize(bytes)
            .map_err(|e| PipelineError::Submission(format!("undecodable wire bytes: {e}")))?;
        self.client
            .send_transaction_with_config(
                &tx,
                RpcSendTransactionConfig {
                    preflight_commitment: Some(self.commitment.commitment),
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await
            .map_err(|e| PipelineError::Submission(e.to_string()))
    }

    async fn poll_confirmation(
        &self,
        signature: &Signature,
        token: &FreshnessToken,
    ) -> Result<ConfirmationOutcome, PipelineError> {
        loop {
            let statuses = self
                .client
                .get_signature_statuses(&[*signature])
                .await
                .map_err(|e| PipelineError::Rpc(e.to_string()))?;

            if let Some(Some(status)) = statuses.value.first() {
                if let Some(err) = &status.err {
                    return Ok(ConfirmationOutcome::ExecutionFailed(err.to_string()));
                }
                // Processed is not enough; the slot may still be skipped.
                if matches!(
                    status.confirmation_status,
                    Some(
                        TransactionConfirmationStatus::Confirmed
                            | TransactionConfirmationStatus::Finalized
                    )
                ) {
                    return Ok(ConfirmationOutcome::Confirmed { slot: status.slot });
                }
            }

            let block_height = self
                .client
                .get_block_height()
                .await
                .map_err(|e| PipelineError::Rpc(e.to_string()))?;
            if block_height > token.last_valid_block_height {
                debug!(
                    signature = %signature,
                    block_height,
                    last_valid = token.last_valid_block_height,
                    "Freshness token expired before confirmation"
                );
                return Ok(ConfirmationOutcome::Expired);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn get_account_state(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, PipelineError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| PipelineError::Rpc(e.to_string()))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn minimum_balance_for_rent_exemption(
        &self,
        size: usize,
    ) -> Result<u64, PipelineError> {
        self.client
            .get_minimum_balance_for_rent_exemption(size)
            .await
            .map_err(|e| PipelineError::Rpc(e.to_string()))
    }
}
