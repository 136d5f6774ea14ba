//! Mintpipe - Batch Issuance and Instant-Sale Pipeline
//!
//! This library exposes the pipeline modules for testing and integration
//! purposes.

pub mod audit;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod confirm;
pub mod errors;
pub mod instructions;
pub mod ledger;
pub mod metadata;
pub mod pipeline;
pub mod stages;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};

#[cfg(test)]
mod tests {
    // Include test modules
    mod batch_merge_tests;
    mod confirm_loop_tests;
    mod pipeline_tests;
    mod stage_flow_tests;
    mod test_helpers;
}
