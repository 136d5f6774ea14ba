//! Deterministic address derivation
//!
//! PDA-style addresses locate ledger state without a private key; each
//! stage derives the addresses the next stage reads.

use solana_sdk::pubkey::Pubkey;

use super::ids::{AUCTION_ID, METADATA_PROGRAM_ID, METAPLEX_ID, VAULT_ID};

/// Metadata account for a mint
pub fn metadata_account(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM_ID,
    )
    .0
}

/// Master edition account for a mint
pub fn master_edition(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &METADATA_PROGRAM_ID,
    )
    .0
}

/// Edition marker account for a print number
///
/// Markers are paged 248 editions to an account.
pub fn edition_marker(master_mint: &Pubkey, edition: u64) -> Pubkey {
    let page = (edition / 248).to_string();
    Pubkey::find_program_address(
        &[
            b"metadata",
            METADATA_PROGRAM_ID.as_ref(),
            master_mint.as_ref(),
            b"edition",
            page.as_bytes(),
        ],
        &METADATA_PROGRAM_ID,
    )
    .0
}

/// Vault authority PDA
pub fn vault_authority(vault: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"vault", VAULT_ID.as_ref(), vault.as_ref()], &VAULT_ID).0
}

/// Safety deposit box for a token inside a vault
pub fn safety_deposit_box(vault: &Pubkey, token_mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"vault", vault.as_ref(), token_mint.as_ref()], &VAULT_ID).0
}

/// Auction account for a vault resource
pub fn auction(vault: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"auction", AUCTION_ID.as_ref(), vault.as_ref()],
        &AUCTION_ID,
    )
    .0
}

/// Extended auction data account
pub fn auction_extended(vault: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"auction", AUCTION_ID.as_ref(), vault.as_ref(), b"extended"],
        &AUCTION_ID,
    )
    .0
}

/// Auction manager for an auction
pub fn auction_manager(auction: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metaplex", METAPLEX_ID.as_ref(), auction.as_ref()],
        &METAPLEX_ID,
    )
    .0
}

/// Winner token-type tracker for an auction manager
pub fn token_tracker(auction_manager: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metaplex",
            METAPLEX_ID.as_ref(),
            auction_manager.as_ref(),
            b"totals",
        ],
        &METAPLEX_ID,
    )
    .0
}

/// Store account for a store owner
pub fn store(store_owner: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metaplex", METAPLEX_ID.as_ref(), store_owner.as_ref()],
        &METAPLEX_ID,
    )
    .0
}

/// Whitelisted creator entry in a store
pub fn whitelisted_creator(store: &Pubkey, creator: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metaplex",
            METAPLEX_ID.as_ref(),
            store.as_ref(),
            creator.as_ref(),
        ],
        &METAPLEX_ID,
    )
    .0
}

/// Original-authority lookup account for an auction/metadata pair
pub fn original_authority(auction: &Pubkey, metadata: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metaplex", auction.as_ref(), metadata.as_ref()],
        &METAPLEX_ID,
    )
    .0
}

/// Safety-deposit validation config for a box under an auction manager
pub fn safety_deposit_config(auction_manager: &Pubkey, safety_deposit_box: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metaplex",
            METAPLEX_ID.as_ref(),
            auction_manager.as_ref(),
            safety_deposit_box.as_ref(),
        ],
        &METAPLEX_ID,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivations_are_deterministic() {
        let mint = Pubkey::new_unique();
        assert_eq!(metadata_account(&mint), metadata_account(&mint));
        assert_ne!(metadata_account(&mint), master_edition(&mint));

        let vault = Pubkey::new_unique();
        assert_ne!(auction(&vault), auction_extended(&vault));
    }

    #[test]
    fn test_edition_marker_pages() {
        let mint = Pubkey::new_unique();
        assert_eq!(edition_marker(&mint, 0), edition_marker(&mint, 247));
        assert_ne!(edition_marker(&mint, 247), edition_marker(&mint, 248));
    }
}
