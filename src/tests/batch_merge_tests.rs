//! Property coverage for batch flattening and merge ordering

use proptest::prelude::*;
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::batch::{Operation, OperationBatch};
use crate::ledger::FreshnessToken;

fn token() -> FreshnessToken {
    FreshnessToken {
        blockhash: Hash::new_unique(),
        last_valid_block_height: 42,
    }
}

fn tagged_op(tag: u8, payer: Pubkey) -> Operation {
    Operation::with_instructions(
        vec![Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[tag],
            vec![AccountMeta::new(Pubkey::new_unique(), false)],
        )],
        token(),
        payer,
    )
}

proptest! {
    /// Flattening never reorders: before-phase tags come out first in
    /// insertion order, then main, then after.
    #[test]
    fn prop_flatten_is_phase_then_insertion_order(
        phases in proptest::collection::vec(0u8..3, 0..24)
    ) {
        let payer = Pubkey::new_unique();
        let mut batch = OperationBatch::new();
        let mut expected: [Vec<u8>; 3] = Default::default();

        for (tag, phase) in phases.iter().enumerate() {
            let tag = tag as u8;
            let op = tagged_op(tag, payer);
            match phase {
                0 => batch.add_before_operation(op),
                1 => batch.add_operation(op),
                _ => batch.add_after_operation(op),
            }
            expected[usize::from(*phase)].push(tag);
        }

        let flat: Vec<u8> = batch
            .flatten()
            .iter()
            .map(|op| op.instructions()[0].data[0])
            .collect();
        let want: Vec<u8> = expected.concat();
        prop_assert_eq!(flat, want);
    }

    /// Merging preserves the flattened instruction sequence exactly and
    /// adopts the supplied token/payer.
    #[test]
    fn prop_merged_batch_matches_flattened_sequence(
        phases in proptest::collection::vec(0u8..3, 1..16)
    ) {
        let payer = Pubkey::new_unique();
        let mut batch = OperationBatch::new();
        for (tag, phase) in phases.iter().enumerate() {
            let op = tagged_op(tag as u8, payer);
            match phase {
                0 => batch.add_before_operation(op),
                1 => batch.add_operation(op),
                _ => batch.add_after_operation(op),
            }
        }

        let final_token = token();
        let final_payer = Pubkey::new_unique();
        let merged = batch.merged(final_token, final_payer);

        let flat: Vec<u8> = batch
            .flatten()
            .iter()
            .flat_map(|op| op.instructions().iter().map(|ix| ix.data[0]))
            .collect();
        let merged_tags: Vec<u8> = merged.instructions().iter().map(|ix| ix.data[0]).collect();
        prop_assert_eq!(merged_tags, flat);
        prop_assert_eq!(merged.token(), &final_token);
        prop_assert_eq!(merged.payer(), final_payer);
    }
}
