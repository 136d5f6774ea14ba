//! Stage-record persistence
//!
//! Durable workflow state lives on the ledger; this store only remembers
//! which stage each item last confirmed, so a crashed run can resume an
//! item from there instead of re-submitting its whole chain.

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::types::{ItemState, StageOutputs};

/// Last confirmed stage of one item, plus the outputs later stages consume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCheckpoint {
    pub state: ItemState,
    pub outputs: StageOutputs,
}

/// Sled-backed checkpoint store keyed by item id
pub struct CheckpointStore {
    tree: Option<sled::Db>,
}

impl CheckpointStore {
    /// Open the store at the given path
    pub fn open(path: &str) -> Result<Self, PipelineError> {
        let tree = sled::open(path)
            .map_err(|e| PipelineError::Checkpoint(format!("open {path}: {e}")))?;
        Ok(Self { tree: Some(tree) })
    }

    /// In-memory no-op store used when checkpointing is disabled
    pub fn disabled() -> Self {
        Self { tree: None }
    }

    /// Load the checkpoint for an item, if one was persisted
    pub fn get(&self, item_id: &str) -> Result<Option<StageCheckpoint>, PipelineError> {
        let Some(tree) = &self.tree else {
            return Ok(None);
        };
        let Some(bytes) = tree
            .get(item_id.as_bytes())
            .map_err(|e| PipelineError::Checkpoint(e.to_string()))?
        else {
            return Ok(None);
        };
        let checkpoint = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::Checkpoint(format!("decode {item_id}: {e}")))?;
        Ok(Some(checkpoint))
    }

    /// Persist the checkpoint for an item, flushing before returning
    ///
    /// Called only after the stage's submissions confirmed; records are
    /// replaced whole, never mutated in place.
    pub fn put(&self, item_id: &str, checkpoint: &StageCheckpoint) -> Result<(), PipelineError> {
        let Some(tree) = &self.tree else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(checkpoint)
            .map_err(|e| PipelineError::Checkpoint(e.to_string()))?;
        tree.insert(item_id.as_bytes(), bytes)
            .map_err(|e| PipelineError::Checkpoint(e.to_string()))?;
        tree.flush()
            .map_err(|e| PipelineError::Checkpoint(e.to_string()))?;
        Ok(())
    }

    /// Remove an item's checkpoint once it has fully settled
    pub fn remove(&self, item_id: &str) -> Result<(), PipelineError> {
        let Some(tree) = &self.tree else {
            return Ok(());
        };
        tree.remove(item_id.as_bytes())
            .map_err(|e| PipelineError::Checkpoint(e.to_string()))?;
        tree.flush()
            .map_err(|e| PipelineError::Checkpoint(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().to_str().unwrap()).unwrap();

        assert!(store.get("item-a").unwrap().is_none());

        let mut outputs = StageOutputs::default();
        outputs.mint = Some("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".into());
        let checkpoint = StageCheckpoint {
            state: ItemState::EscrowFunded,
            outputs,
        };
        store.put("item-a", &checkpoint).unwrap();

        let loaded = store.get("item-a").unwrap().unwrap();
        assert_eq!(loaded.state, ItemState::EscrowFunded);
        assert_eq!(
            loaded.outputs.mint.as_deref(),
            Some("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin")
        );

        store.remove("item-a").unwrap();
        assert!(store.get("item-a").unwrap().is_none());
    }

    #[test]
    fn test_disabled_store_is_silent() {
        let store = CheckpointStore::disabled();
        let checkpoint = StageCheckpoint {
            state: ItemState::Issued,
            outputs: StageOutputs::default(),
        };
        store.put("x", &checkpoint).unwrap();
        assert!(store.get("x").unwrap().is_none());
        store.remove("x").unwrap();
    }
}
