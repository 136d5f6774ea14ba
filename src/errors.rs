//! Error types for the issuance pipeline
//!
//! One taxonomy covers the whole run: input validation, metadata retrieval,
//! submission, confirmation, and stage sequencing. Errors carry enough
//! context to distinguish the ambiguous cases (a confirmation timeout may
//! mean the transaction landed late) from the definite ones.

use thiserror::Error;

/// Error type for all pipeline operations
///
/// Scope matters more than kind here: item-scoped errors abandon one item
/// and the run continues; run-scoped errors abort the whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed or oversized batch input, rejected before any network call
    #[error("Invalid batch input: {0}")]
    InputValidation(String),

    /// Descriptor retrieval failed for one item; that item is skipped
    #[error("Metadata fetch failed for {uri}: {reason}")]
    MetadataFetch {
        /// Descriptor URI that could not be resolved
        uri: String,
        /// Underlying HTTP/parse failure
        reason: String,
    },

    /// Raw submission rejected synchronously by the RPC node
    ///
    /// Consumed by the confirmation loop's retry budget; a fresh blockhash
    /// is fetched before the next attempt.
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// Retry budget exhausted without an observed confirmation
    ///
    /// Ambiguous outcome: the transaction may still land after the last
    /// poll. Surfaced prominently for operator reconciliation; never
    /// auto-retried from scratch because of duplicate-submission risk.
    #[error("Transaction confirmation timed out after {attempts} attempts")]
    ConfirmationTimeout {
        /// Attempts consumed before giving up
        attempts: u32,
    },

    /// The ledger executed the transaction and reported a failure
    ///
    /// Terminal and distinct from a timeout: the outcome is known, retrying
    /// the same bytes cannot succeed.
    #[error("On-chain execution failed for {signature}: {reason}")]
    ExecutionFailed {
        /// Signature of the failed submission
        signature: String,
        /// Error string reported by the ledger
        reason: String,
    },

    /// A prior stage's output account is missing or malformed
    ///
    /// Indicates a sequencing or logic bug rather than a transient network
    /// condition; fatal to the item with no retry.
    #[error("Dependency state error: {0}")]
    DependencyState(String),

    /// Freshness token (recent blockhash) fetch failed
    #[error("Freshness token fetch failed: {0}")]
    FreshnessFetch(String),

    /// RPC communication failure outside the submit/poll path
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Transaction signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Checkpoint store failure (run-scoped: resume guarantees are gone)
    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    /// Internal invariant violation, e.g. an instruction encoder rejecting
    /// constant inputs; indicates a bug
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether this error abandons one item rather than aborting the run
    pub fn is_item_scoped(&self) -> bool {
        match self {
            Self::MetadataFetch { .. } => true,
            Self::Submission(_) => true,
            Self::ConfirmationTimeout { .. } => true,
            Self::ExecutionFailed { .. } => true,
            Self::DependencyState(_) => true,
            Self::FreshnessFetch(_) => true,
            Self::Rpc(_) => true,
            Self::Signing(_) => true,

            // Run-scoped
            Self::InputValidation(_) => false,
            Self::Checkpoint(_) => false,
            Self::Internal(_) => false,
            Self::External(_) => false,
        }
    }

    /// Whether the outcome of the submission is unknown to the engine
    ///
    /// True only for exhausted confirmation retries: the transaction may
    /// have landed after the last poll, so the operator must reconcile
    /// against the audit log before re-running.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. })
    }

    /// Error category for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "input",
            Self::MetadataFetch { .. } => "metadata",
            Self::Submission(_) => "submission",
            Self::ConfirmationTimeout { .. } => "confirmation",
            Self::ExecutionFailed { .. } => "execution",
            Self::DependencyState(_) => "dependency",
            Self::FreshnessFetch(_) => "freshness",
            Self::Rpc(_) => "rpc",
            Self::Signing(_) => "signing",
            Self::Checkpoint(_) => "checkpoint",
            Self::Internal(_) => "internal",
            Self::External(_) => "external",
        }
    }
}

// Convenience constructors for common scenarios
impl PipelineError {
    /// Create a metadata fetch error for a specific URI
    pub fn metadata_failed(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MetadataFetch {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a dependency state error
    pub fn missing_account(what: impl Into<String>) -> Self {
        Self::DependencyState(format!("required account missing: {}", what.into()))
    }

    /// Create a signing error
    pub fn signing_failed(reason: impl Into<String>) -> Self {
        Self::Signing(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::ConfirmationTimeout { attempts: 10 };
        assert_eq!(
            err.to_string(),
            "Transaction confirmation timed out after 10 attempts"
        );

        let err = PipelineError::metadata_failed("https://x/1.json", "404");
        assert_eq!(
            err.to_string(),
            "Metadata fetch failed for https://x/1.json: 404"
        );
    }

    #[test]
    fn test_error_scope() {
        assert!(PipelineError::ConfirmationTimeout { attempts: 1 }.is_item_scoped());
        assert!(PipelineError::DependencyState("x".into()).is_item_scoped());
        assert!(PipelineError::metadata_failed("u", "r").is_item_scoped());

        assert!(!PipelineError::InputValidation("too many".into()).is_item_scoped());
        assert!(!PipelineError::Checkpoint("io".into()).is_item_scoped());
    }

    #[test]
    fn test_ambiguity() {
        assert!(PipelineError::ConfirmationTimeout { attempts: 3 }.is_ambiguous());
        assert!(!PipelineError::ExecutionFailed {
            signature: "sig".into(),
            reason: "custom program error".into()
        }
        .is_ambiguous());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            PipelineError::InputValidation("x".into()).category(),
            "input"
        );
        assert_eq!(
            PipelineError::ConfirmationTimeout { attempts: 1 }.category(),
            "confirmation"
        );
        assert_eq!(
            PipelineError::ExecutionFailed {
                signature: "s".into(),
                reason: "r".into()
            }
            .category(),
            "execution"
        );
    }
}
