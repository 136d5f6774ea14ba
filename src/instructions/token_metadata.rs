//! Token-metadata program encoders
//!
//! Manual data encodings; discriminators follow the program's instruction
//! enum (CreateMetadataAccountV2 = 16, CreateMasterEditionV3 = 17,
//! MintNewEditionFromMasterEditionViaToken = 11).

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
    sysvar,
};

use super::encode;
use super::ids::METADATA_PROGRAM_ID;
use crate::errors::PipelineError;
use crate::types::CreatorShare;

/// Metadata fields written on creation
pub struct MetadataArgs<'a> {
    pub name: &'a str,
    pub symbol: &'a str,
    pub uri: &'a str,
    pub seller_fee_basis_points: u16,
    pub creators: &'a [CreatorShare],
}

/// Create the metadata account for a mint
pub fn create_metadata_v2(
    metadata: &Pubkey,
    mint: &Pubkey,
    mint_authority: &Pubkey,
    payer: &Pubkey,
    update_authority: &Pubkey,
    args: &MetadataArgs<'_>,
) -> Result<Instruction, PipelineError> {
    let mut data = vec![16];
    encode::string(&mut data, args.name);
    encode::string(&mut data, args.symbol);
    encode::string(&mut data, args.uri);
    data.extend_from_slice(&args.seller_fee_basis_points.to_le_bytes());
    if args.creators.is_empty() {
        encode::none(&mut data);
    } else {
        data.push(1);
        data.extend_from_slice(&(args.creators.len() as u32).to_le_bytes());
        for creator in args.creators {
            let address: Pubkey = creator.address.parse().map_err(|e| {
                PipelineError::DependencyState(format!(
                    "creator address {}: {e}",
                    creator.address
                ))
            })?;
            data.extend_from_slice(address.as_ref());
            data.push(creator.verified as u8);
            data.push(creator.share);
        }
    }
    encode::none(&mut data); // collection
    encode::none(&mut data); // uses
    data.push(1); // is_mutable

    Ok(Instruction::new_with_bytes(
        METADATA_PROGRAM_ID,
        &data,
        vec![
            AccountMeta::new(*metadata, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*mint_authority, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*update_authority, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
    ))
}

/// Create the master edition for a mint, capping print supply
pub fn create_master_edition_v3(
    edition: &Pubkey,
    mint: &Pubkey,
    metadata: &Pubkey,
    authority: &Pubkey,
    payer: &Pubkey,
    max_supply: Option<u64>,
) -> Instruction {
    let mut data = vec![17];
    encode::option_u64(&mut data, max_supply);

    Instruction::new_with_bytes(
        METADATA_PROGRAM_ID,
        &data,
        vec![
            AccountMeta::new(*edition, false),
            AccountMeta::new(*mint, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new(*metadata, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
    )
}

/// Accounts for minting one print from a master edition
pub struct EditionPrintAccounts {
    pub new_metadata: Pubkey,
    pub new_edition: Pubkey,
    pub master_edition: Pubkey,
    pub new_mint: Pubkey,
    pub edition_marker: Pubkey,
    pub master_token_account: Pubkey,
    pub master_metadata: Pubkey,
}

/// Mint print number `edition` from the master edition via its token
pub fn mint_edition_from_master(
    accounts: &EditionPrintAccounts,
    authority: &Pubkey,
    payer: &Pubkey,
    edition: u64,
) -> Instruction {
    let mut data = vec![11];
    encode::u64(&mut data, edition);

    Instruction::new_with_bytes(
        METADATA_PROGRAM_ID,
        &data,
        vec![
            AccountMeta::new(accounts.new_metadata, false),
            AccountMeta::new(accounts.new_edition, false),
            AccountMeta::new(accounts.master_edition, false),
            AccountMeta::new(accounts.new_mint, false),
            AccountMeta::new(accounts.edition_marker, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new_readonly(accounts.master_token_account, false),
            AccountMeta::new_readonly(*authority, false),
            AccountMeta::new_readonly(accounts.master_metadata, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_edition_encodes_supply_option() {
        let key = Pubkey::new_unique();
        let capped = create_master_edition_v3(&key, &key, &key, &key, &key, Some(3));
        assert_eq!(capped.data[0], 17);
        assert_eq!(capped.data[1], 1);
        assert_eq!(&capped.data[2..10], &3u64.to_le_bytes());

        let open = create_master_edition_v3(&key, &key, &key, &key, &key, None);
        assert_eq!(open.data[1], 0);
        assert_eq!(open.data.len(), 2);
    }

    #[test]
    fn test_print_carries_edition_number() {
        let key = Pubkey::new_unique();
        let accounts = EditionPrintAccounts {
            new_metadata: key,
            new_edition: key,
            master_edition: key,
            new_mint: key,
            edition_marker: key,
            master_token_account: key,
            master_metadata: key,
        };
        let ix = mint_edition_from_master(&accounts, &key, &key, 7);
        assert_eq!(ix.data[0], 11);
        assert_eq!(&ix.data[1..9], &7u64.to_le_bytes());
        assert_eq!(ix.program_id, METADATA_PROGRAM_ID);
    }
}
