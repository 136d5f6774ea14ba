//! Operation batching and merging
//!
//! Business logic builds many small [`Operation`]s; the ledger accepts one
//! freshness token and one fee payer per submitted unit. [`OperationBatch`]
//! keeps the before/main/after ordering, and [`Operation::merge`] collapses
//! a flattened batch into a single submittable unit.

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};

use crate::errors::PipelineError;
use crate::ledger::FreshnessToken;

/// One submittable unit: ordered instructions bound to a freshness token
/// and a fee payer
///
/// Immutable after merging except for signing. An Operation is never
/// retried itself; the confirmation loop re-derives freshness per attempt
/// and a new Operation is built for a new logical submission.
#[derive(Debug, Clone)]
pub struct Operation {
    instructions: Vec<Instruction>,
    token: FreshnessToken,
    payer: Pubkey,
}

impl Operation {
    /// Create an empty Operation bound to the given token and payer
    pub fn new(token: FreshnessToken, payer: Pubkey) -> Self {
        Self {
            instructions: Vec::new(),
            token,
            payer,
        }
    }

    /// Create an Operation from an instruction list
    pub fn with_instructions(
        instructions: Vec<Instruction>,
        token: FreshnessToken,
        payer: Pubkey,
    ) -> Self {
        Self {
            instructions,
            token,
            payer,
        }
    }

    /// Append one instruction, preserving order
    pub fn add_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn token(&self) -> &FreshnessToken {
        &self.token
    }

    pub fn payer(&self) -> Pubkey {
        self.payer
    }

    /// Merge several Operations into one
    ///
    /// The result's instruction list is the concatenation, in order, of
    /// every input's instructions. Tokens and payers the inputs carried are
    /// discarded in favor of the single supplied pair. Merging an empty
    /// slice yields a valid empty Operation.
    pub fn merge(operations: &[Operation], token: FreshnessToken, payer: Pubkey) -> Operation {
        let instructions = operations
            .iter()
            .flat_map(|op| op.instructions.iter().cloned())
            .collect();
        Operation {
            instructions,
            token,
            payer,
        }
    }

    /// Sign into a wire transaction
    ///
    /// The primary signer pays fees; `extra` holds the batch's auxiliary
    /// keypairs (newly created accounts, transfer authorities).
    pub fn sign(
        &self,
        primary: &Keypair,
        extra: &[&Keypair],
    ) -> Result<SignedOperation, PipelineError> {
        let mut tx = Transaction::new_with_payer(&self.instructions, Some(&self.payer));
        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(1 + extra.len());
        signers.push(primary);
        for keypair in extra {
            signers.push(*keypair);
        }
        tx.try_sign(&signers, self.token.blockhash)
            .map_err(|e| PipelineError::signing_failed(e.to_string()))?;

        let signature = tx.signatures[0];
        Ok(SignedOperation {
            transaction: tx,
            signature,
        })
    }
}

/// A signed Operation ready for raw submission
#[derive(Debug, Clone)]
pub struct SignedOperation {
    transaction: Transaction,
    signature: Signature,
}

impl SignedOperation {
    /// The fee-payer signature identifying this submission
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        bincode::serialize(&self.transaction)
            .map_err(|e| PipelineError::signing_failed(format!("serialize: {e}")))
    }
}

/// Ordered collection of Operations split into before/main/after phases,
/// plus the auxiliary signers the phases require
///
/// Concatenation order is always `before ++ main ++ after` and is never
/// reordered. No deduplication is performed; callers are responsible for
/// not adding semantically duplicate operations.
#[derive(Debug, Default)]
pub struct OperationBatch {
    before: Vec<Operation>,
    main: Vec<Operation>,
    after: Vec<Operation>,
    signers: Vec<Keypair>,
}

impl OperationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the main phase
    pub fn add_operation(&mut self, operation: Operation) {
        self.main.push(operation);
    }

    /// Append to the before phase
    pub fn add_before_operation(&mut self, operation: Operation) {
        self.before.push(operation);
    }

    /// Append to the after phase
    pub fn add_after_operation(&mut self, operation: Operation) {
        self.after.push(operation);
    }

    /// Register an auxiliary signer required beyond the primary
    pub fn add_signer(&mut self, signer: Keypair) {
        self.signers.push(signer);
    }

    /// All operations in submission order: `before ++ main ++ after`
    pub fn flatten(&self) -> Vec<&Operation> {
        self.before
            .iter()
            .chain(self.main.iter())
            .chain(self.after.iter())
            .collect()
    }

    pub fn signers(&self) -> &[Keypair] {
        &self.signers
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.main.is_empty() && self.after.is_empty()
    }

    /// Merge the flattened batch into one Operation
    ///
    /// The whole batch is flattened first so a single payer/commit unit is
    /// never fragmented across phase boundaries.
    pub fn merged(&self, token: FreshnessToken, payer: Pubkey) -> Operation {
        let flattened: Vec<Operation> = self.flatten().into_iter().cloned().collect();
        Operation::merge(&flattened, token, payer)
    }
}
