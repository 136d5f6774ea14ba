//! Auction and auction-manager program encoders
//!
//! Instant-sale listings: a capped-winner auction priced at the instant
//! sale amount, managed by an auction manager that takes authority over
//! both the auction and the vault.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
    sysvar,
};

use super::encode;
use super::ids::{AUCTION_ID, METADATA_PROGRAM_ID, METAPLEX_ID, NATIVE_MINT};
use crate::errors::PipelineError;

const CREATE_AUCTION_V2: u8 = 7;
const AUCTION_SET_AUTHORITY: u8 = 5;

const INIT_AUCTION_MANAGER_V2: u8 = 17;
const VALIDATE_SAFETY_DEPOSIT_BOX_V2: u8 = 18;
const START_AUCTION: u8 = 5;

/// Winner limit: capped at a fixed count
const WINNER_LIMIT_CAPPED: u8 = 1;

/// Price floor: minimum price
const PRICE_FLOOR_MINIMUM: u8 = 1;

/// Safety deposit config account key byte
const SAFETY_DEPOSIT_CONFIG_KEY: u8 = 9;

/// Winning config: PrintingV2, prints a new edition per winner
const WINNING_CONFIG_PRINTING_V2: u8 = 3;

/// Tuple width marker for u8-sized amount ranges
const TUPLE_U8: u8 = 1;

/// Instant-sale auction parameters
pub struct AuctionSettings {
    /// Winner cap; one winner per sellable edition
    pub winners: u64,
    /// Price floor and instant-sale price, in lamports
    pub price_lamports: u64,
}

/// Create the auction and its extended-data account for a vault resource
pub fn create_auction_v2(
    auction: &Pubkey,
    auction_extended: &Pubkey,
    creator: &Pubkey,
    vault: &Pubkey,
    settings: &AuctionSettings,
) -> Instruction {
    let mut data = vec![CREATE_AUCTION_V2];
    // winners
    data.push(WINNER_LIMIT_CAPPED);
    encode::u64(&mut data, settings.winners);
    encode::none(&mut data); // end_auction_at
    encode::none(&mut data); // auction_gap
    data.extend_from_slice(NATIVE_MINT.as_ref()); // token_mint
    data.extend_from_slice(creator.as_ref()); // authority
    data.extend_from_slice(vault.as_ref()); // resource
    // price floor: variant tag plus a 32-byte payload, price in the low 8
    data.push(PRICE_FLOOR_MINIMUM);
    let mut floor = [0u8; 32];
    floor[..8].copy_from_slice(&settings.price_lamports.to_le_bytes());
    data.extend_from_slice(&floor);
    encode::none(&mut data); // tick_size
    encode::none(&mut data); // gap_tick_size_percentage
    encode::option_u64(&mut data, Some(settings.price_lamports)); // instant_sale_price
    encode::none(&mut data); // name

    Instruction::new_with_bytes(
        AUCTION_ID,
        &data,
        vec![
            AccountMeta::new_readonly(*creator, true),
            AccountMeta::new(*auction, false),
            AccountMeta::new(*auction_extended, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Hand auction authority to the auction manager
pub fn set_auction_authority(
    auction: &Pubkey,
    current_authority: &Pubkey,
    new_authority: &Pubkey,
) -> Instruction {
    Instruction::new_with_bytes(
        AUCTION_ID,
        &[AUCTION_SET_AUTHORITY],
        vec![
            AccountMeta::new(*auction, false),
            AccountMeta::new_readonly(*current_authority, true),
            AccountMeta::new_readonly(*new_authority, false),
        ],
    )
}

/// Accounts for auction-manager initialization
pub struct InitAuctionManagerAccounts {
    pub auction_manager: Pubkey,
    pub token_tracker: Pubkey,
    pub auction: Pubkey,
    pub vault: Pubkey,
    pub authority: Pubkey,
    pub payer: Pubkey,
    pub accept_payment_account: Pubkey,
    pub store: Pubkey,
}

pub fn init_auction_manager_v2(accounts: &InitAuctionManagerAccounts, max_ranges: u64) -> Instruction {
    let mut data = vec![INIT_AUCTION_MANAGER_V2, TUPLE_U8, TUPLE_U8];
    encode::u64(&mut data, max_ranges);

    Instruction::new_with_bytes(
        METAPLEX_ID,
        &data,
        vec![
            AccountMeta::new(accounts.auction_manager, false),
            AccountMeta::new(accounts.token_tracker, false),
            AccountMeta::new_readonly(accounts.auction, false),
            AccountMeta::new_readonly(accounts.vault, false),
            AccountMeta::new_readonly(accounts.authority, false),
            AccountMeta::new_readonly(accounts.payer, true),
            AccountMeta::new_readonly(accounts.accept_payment_account, false),
            AccountMeta::new_readonly(accounts.store, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
    )
}

/// Accounts for validating a safety deposit box against the auction manager
pub struct ValidateBoxAccounts {
    pub safety_deposit_config: Pubkey,
    pub token_tracker: Pubkey,
    pub auction_manager: Pubkey,
    pub metadata: Pubkey,
    pub original_authority: Pubkey,
    pub whitelisted_creator: Pubkey,
    pub store: Pubkey,
    pub safety_deposit_box: Pubkey,
    pub token_store: Pubkey,
    pub mint: Pubkey,
    pub edition: Pubkey,
    pub vault: Pubkey,
    pub authority: Pubkey,
}

/// Validate the deposited master edition, declaring one winner per
/// sellable print
///
/// The range length rides a u8-width tuple, so `sellable` above 255 is
/// unencodable and rejected here.
pub fn validate_safety_deposit_box_v2(
    accounts: &ValidateBoxAccounts,
    sellable: u64,
) -> Result<Instruction, PipelineError> {
    let range_length = u8::try_from(sellable).map_err(|_| {
        PipelineError::Internal(format!(
            "amount range length {sellable} does not fit the u8 tuple width"
        ))
    })?;

    let mut data = vec![VALIDATE_SAFETY_DEPOSIT_BOX_V2, SAFETY_DEPOSIT_CONFIG_KEY];
    data.extend_from_slice(system_program::id().as_ref()); // auction_manager placeholder
    encode::u64(&mut data, 0); // order
    data.push(WINNING_CONFIG_PRINTING_V2);
    data.push(TUPLE_U8); // amount_type
    data.push(TUPLE_U8); // length_type
    // one amount range covering every winner, u8-width tuples
    data.extend_from_slice(&1u32.to_le_bytes());
    data.push(1); // amount per winner
    data.push(range_length);
    encode::none(&mut data); // participation_config
    encode::none(&mut data); // participation_state

    Ok(Instruction::new_with_bytes(
        METAPLEX_ID,
        &data,
        vec![
            AccountMeta::new(accounts.safety_deposit_config, false),
            AccountMeta::new(accounts.token_tracker, false),
            AccountMeta::new(accounts.auction_manager, false),
            AccountMeta::new(accounts.metadata, false),
            AccountMeta::new(accounts.original_authority, false),
            AccountMeta::new_readonly(accounts.whitelisted_creator, false),
            AccountMeta::new_readonly(accounts.store, false),
            AccountMeta::new_readonly(accounts.safety_deposit_box, false),
            AccountMeta::new_readonly(accounts.token_store, false),
            AccountMeta::new_readonly(accounts.mint, false),
            AccountMeta::new_readonly(accounts.edition, false),
            AccountMeta::new_readonly(accounts.vault, false),
            AccountMeta::new_readonly(accounts.authority, true),
            AccountMeta::new_readonly(accounts.authority, true),
            AccountMeta::new_readonly(accounts.authority, true),
            AccountMeta::new_readonly(METADATA_PROGRAM_ID, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
    ))
}

/// Flip the managed auction into its started state
pub fn start_auction(
    auction: &Pubkey,
    auction_manager: &Pubkey,
    authority: &Pubkey,
    store: &Pubkey,
) -> Instruction {
    Instruction::new_with_bytes(
        METAPLEX_ID,
        &[START_AUCTION],
        vec![
            AccountMeta::new(*auction_manager, false),
            AccountMeta::new(*auction, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new_readonly(*store, false),
            AccountMeta::new_readonly(AUCTION_ID, false),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_auction_caps_winners_and_sets_instant_sale() {
        let key = Pubkey::new_unique();
        let settings = AuctionSettings {
            winners: 5,
            price_lamports: 2_000_000_000,
        };
        let ix = create_auction_v2(&key, &key, &key, &key, &settings);
        assert_eq!(ix.program_id, AUCTION_ID);
        assert_eq!(ix.data[0], CREATE_AUCTION_V2);
        assert_eq!(ix.data[1], WINNER_LIMIT_CAPPED);
        assert_eq!(&ix.data[2..10], &5u64.to_le_bytes());
        // instant sale price is the last option before the trailing name none
        let tail = &ix.data[ix.data.len() - 10..];
        assert_eq!(tail[0], 1);
        assert_eq!(&tail[1..9], &2_000_000_000u64.to_le_bytes());
        assert_eq!(tail[9], 0);
    }

    #[test]
    fn test_validate_range_covers_sellable_editions() {
        let key = Pubkey::new_unique();
        let accounts = ValidateBoxAccounts {
            safety_deposit_config: key,
            token_tracker: key,
            auction_manager: key,
            metadata: key,
            original_authority: key,
            whitelisted_creator: key,
            store: key,
            safety_deposit_box: key,
            token_store: key,
            mint: key,
            edition: key,
            vault: key,
            authority: key,
        };
        let ix = validate_safety_deposit_box_v2(&accounts, 4).unwrap();
        assert_eq!(ix.data[0], VALIDATE_SAFETY_DEPOSIT_BOX_V2);
        assert_eq!(*ix.data.last().unwrap(), 0);
        // trailing: amount=1, length=4, two none markers
        let tail = &ix.data[ix.data.len() - 4..];
        assert_eq!(tail, &[1, 4, 0, 0]);
    }

    #[test]
    fn test_validate_rejects_range_beyond_tuple_width() {
        let key = Pubkey::new_unique();
        let accounts = ValidateBoxAccounts {
            safety_deposit_config: key,
            token_tracker: key,
            auction_manager: key,
            metadata: key,
            original_authority: key,
            whitelisted_creator: key,
            store: key,
            safety_deposit_box: key,
            token_store: key,
            mint: key,
            edition: key,
            vault: key,
            authority: key,
        };
        let ix = validate_safety_deposit_box_v2(&accounts, 255).unwrap();
        assert_eq!(ix.data[ix.data.len() - 3], 255);

        let err = validate_safety_deposit_box_v2(&accounts, 256).unwrap_err();
        assert!(matches!(err, PipelineError::Internal(_)));
    }

    #[test]
    fn test_start_auction_is_bare_discriminator() {
        let key = Pubkey::new_unique();
        let ix = start_auction(&key, &key, &key, &key);
        assert_eq!(ix.program_id, METAPLEX_ID);
        assert_eq!(ix.data, vec![START_AUCTION]);
        assert_eq!(ix.accounts.len(), 6);
    }
}
