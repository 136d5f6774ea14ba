//! Run orchestration
//!
//! Drives every batch item through the stage chain, checkpointing after
//! each confirmed transition. Items are independent: an item-scoped
//! failure abandons that item at its current state and the run continues;
//! a run-scoped failure (bad input, broken checkpoint store, internal bug)
//! aborts everything.

use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointStore, StageCheckpoint};
use crate::errors::PipelineError;
use crate::metadata::MetadataClient;
use crate::stages::{self, StageContext};
use crate::types::{AbandonedItem, BatchItem, ItemState, RunSummary, StageOutputs};

/// One batch run over a set of items
pub struct Pipeline<'a> {
    ctx: StageContext<'a>,
    checkpoints: &'a CheckpointStore,
    metadata: &'a MetadataClient,
    max_items: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        ctx: StageContext<'a>,
        checkpoints: &'a CheckpointStore,
        metadata: &'a MetadataClient,
        max_items: usize,
    ) -> Self {
        Self {
            ctx,
            checkpoints,
            metadata,
            max_items,
        }
    }

    /// Run the whole batch
    ///
    /// Input is validated before any network call; descriptor resolution
    /// drops unreachable items before any ledger interaction. Items run
    /// sequentially so every submission shares one fee payer without nonce
    /// contention.
    pub async fn run(&self, items: Vec<BatchItem>) -> Result<RunSummary, PipelineError> {
        if items.len() > self.max_items {
            return Err(PipelineError::InputValidation(format!(
                "batch holds {} items, limit is {}",
                items.len(),
                self.max_items
            )));
        }
        for item in &items {
            item.validate()?;
        }

        let mut summary = RunSummary::default();

        let (resolved, skipped) = self.metadata.resolve_items(items).await;
        // fetch failures were logged at fetch time; keep only the tally
        summary.skipped.extend(skipped.into_iter().map(|(uri, _)| uri));

        info!(items = resolved.len(), "Starting pipeline run");

        for item in resolved {
            match self.run_item(&item).await {
                Ok(()) => {
                    info!(item = item.id(), "Item settled");
                    summary.settled.push(item.id().to_string());
                }
                Err((stage, e)) if e.is_item_scoped() => {
                    error!(
                        item = item.id(),
                        stage,
                        category = e.category(),
                        ambiguous = e.is_ambiguous(),
                        error = %e,
                        "Abandoning item"
                    );
                    summary.abandoned.push(AbandonedItem {
                        item_id: item.id().to_string(),
                        stage,
                        error: e,
                    });
                }
                Err((stage, e)) => {
                    error!(item = item.id(), stage, error = %e, "Run-scoped failure, aborting");
                    return Err(e);
                }
            }
        }

        Ok(summary)
    }

    /// Drive one item forward from its last checkpoint to settlement
    ///
    /// A failed transition leaves the item's checkpoint at the last state
    /// that actually confirmed; no later stage is ever attempted for it.
    async fn run_item(&self, item: &BatchItem) -> Result<(), (&'static str, PipelineError)> {
        let checkpoint = self
            .checkpoints
            .get(item.id())
            .map_err(|e| ("resume", e))?;

        let (mut outputs, mut next) = match checkpoint {
            Some(cp) => {
                warn!(
                    item = item.id(),
                    resumed_from = cp.state.name(),
                    "Resuming item from checkpoint"
                );
                (cp.outputs, cp.state.next())
            }
            None => (StageOutputs::default(), Some(ItemState::Issued)),
        };

        while let Some(target) = next {
            stages::run_stage(&self.ctx, item, target, &mut outputs)
                .await
                .map_err(|e| (target.name(), e))?;

            self.checkpoints
                .put(
                    item.id(),
                    &StageCheckpoint {
                        state: target,
                        outputs: outputs.clone(),
                    },
                )
                .map_err(|e| (target.name(), e))?;

            next = target.next();
        }

        self.checkpoints
            .remove(item.id())
            .map_err(|e| ("cleanup", e))?;
        Ok(())
    }
}
