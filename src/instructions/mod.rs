//! Instruction encoders and address derivation
//!
//! One thin module per on-chain program family. Encoders are pure
//! functions from typed parameters to a `solana_sdk` [`Instruction`]
//! (program id, account list, data bytes); the orchestration engine treats
//! them as opaque. PDA helpers live alongside because later stages locate
//! prior-stage state through them.

pub mod auction;
pub mod ids;
pub mod pda;
pub mod token;
pub mod token_metadata;
pub mod vault;

use crate::errors::PipelineError;

/// Minimal borsh-compatible field encoders shared by the manual encoders
pub(crate) mod encode {
    /// u32-length-prefixed UTF-8 string
    pub fn string(buf: &mut Vec<u8>, value: &str) {
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(value.as_bytes());
    }

    pub fn u64(buf: &mut Vec<u8>, value: u64) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn option_u64(buf: &mut Vec<u8>, value: Option<u64>) {
        match value {
            Some(v) => {
                buf.push(1);
                u64(buf, v);
            }
            None => buf.push(0),
        }
    }

    pub fn none(buf: &mut Vec<u8>) {
        buf.push(0);
    }
}

pub(crate) fn encode_error(program: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Internal(format!("{program} instruction encode: {e}"))
}
