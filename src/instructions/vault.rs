//! Token-vault program encoders
//!
//! Escrow lifecycle: price the vault (external price account), initialize
//! it, deposit the asset into a safety deposit box, activate, then combine
//! so the auction manager can take custody. Discriminators follow the
//! program's instruction enum.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
    sysvar,
};

use super::encode;
use super::ids::{NATIVE_MINT, VAULT_ID};

const INIT_VAULT: u8 = 0;
const ADD_TOKEN_TO_INACTIVE_VAULT: u8 = 1;
const ACTIVATE_VAULT: u8 = 2;
const COMBINE_VAULT: u8 = 3;
const UPDATE_EXTERNAL_PRICE_ACCOUNT: u8 = 9;
const SET_AUTHORITY: u8 = 10;

/// External price account data key byte
const EXTERNAL_PRICE_ACCOUNT_KEY: u8 = 2;

/// Write pricing data into a freshly created external price account
///
/// Zero price per share with combining allowed: the vault is an escrow
/// wrapper, not a fractionalization.
pub fn update_external_price_account(external_price_account: &Pubkey) -> Instruction {
    let mut data = vec![UPDATE_EXTERNAL_PRICE_ACCOUNT, EXTERNAL_PRICE_ACCOUNT_KEY];
    encode::u64(&mut data, 0); // price_per_share
    data.extend_from_slice(NATIVE_MINT.as_ref());
    data.push(1); // allowed_to_combine

    Instruction::new_with_bytes(
        VAULT_ID,
        &data,
        vec![AccountMeta::new(*external_price_account, false)],
    )
}

/// Accounts backing a vault initialization
pub struct InitVaultAccounts {
    pub vault: Pubkey,
    pub vault_authority: Pubkey,
    pub fraction_mint: Pubkey,
    pub redeem_treasury: Pubkey,
    pub fraction_treasury: Pubkey,
    pub pricing_lookup: Pubkey,
}

pub fn init_vault(accounts: &InitVaultAccounts, allow_further_share_creation: bool) -> Instruction {
    let data = vec![INIT_VAULT, allow_further_share_creation as u8];

    Instruction::new_with_bytes(
        VAULT_ID,
        &data,
        vec![
            AccountMeta::new(accounts.fraction_mint, false),
            AccountMeta::new(accounts.redeem_treasury, false),
            AccountMeta::new(accounts.fraction_treasury, false),
            AccountMeta::new(accounts.vault, false),
            AccountMeta::new_readonly(accounts.vault_authority, false),
            AccountMeta::new_readonly(accounts.pricing_lookup, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
    )
}

/// Accounts for depositing a token into an inactive vault
pub struct AddTokenAccounts {
    pub vault: Pubkey,
    pub vault_authority: Pubkey,
    pub safety_deposit_box: Pubkey,
    pub token_account: Pubkey,
    pub token_store: Pubkey,
    pub transfer_authority: Pubkey,
    pub payer: Pubkey,
}

pub fn add_token_to_inactive_vault(accounts: &AddTokenAccounts, amount: u64) -> Instruction {
    let mut data = vec![ADD_TOKEN_TO_INACTIVE_VAULT];
    encode::u64(&mut data, amount);

    Instruction::new_with_bytes(
        VAULT_ID,
        &data,
        vec![
            AccountMeta::new(accounts.safety_deposit_box, false),
            AccountMeta::new(accounts.token_account, false),
            AccountMeta::new(accounts.token_store, false),
            AccountMeta::new(accounts.vault, false),
            AccountMeta::new_readonly(accounts.vault_authority, true),
            AccountMeta::new_readonly(accounts.payer, true),
            AccountMeta::new_readonly(accounts.transfer_authority, true),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Activate the vault, minting `number_of_shares` fractional shares
pub fn activate_vault(
    vault: &Pubkey,
    fraction_mint: &Pubkey,
    fraction_treasury: &Pubkey,
    fraction_mint_authority: &Pubkey,
    vault_authority: &Pubkey,
    number_of_shares: u64,
) -> Instruction {
    let mut data = vec![ACTIVATE_VAULT];
    encode::u64(&mut data, number_of_shares);

    Instruction::new_with_bytes(
        VAULT_ID,
        &data,
        vec![
            AccountMeta::new(*vault, false),
            AccountMeta::new(*fraction_mint, false),
            AccountMeta::new(*fraction_treasury, false),
            AccountMeta::new_readonly(*fraction_mint_authority, false),
            AccountMeta::new_readonly(*vault_authority, true),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
    )
}

/// Accounts for combining an active vault back under one authority
pub struct CombineVaultAccounts {
    pub vault: Pubkey,
    pub outstanding_share_account: Pubkey,
    pub paying_token_account: Pubkey,
    pub fraction_mint: Pubkey,
    pub fraction_treasury: Pubkey,
    pub redeem_treasury: Pubkey,
    pub new_vault_authority: Pubkey,
    pub vault_authority: Pubkey,
    pub transfer_authority: Pubkey,
    pub burn_authority: Pubkey,
    pub external_price_account: Pubkey,
}

pub fn combine_vault(accounts: &CombineVaultAccounts) -> Instruction {
    Instruction::new_with_bytes(
        VAULT_ID,
        &[COMBINE_VAULT],
        vec![
            AccountMeta::new(accounts.vault, false),
            AccountMeta::new(accounts.outstanding_share_account, false),
            AccountMeta::new(accounts.paying_token_account, false),
            AccountMeta::new(accounts.fraction_mint, false),
            AccountMeta::new(accounts.fraction_treasury, false),
            AccountMeta::new(accounts.redeem_treasury, false),
            AccountMeta::new_readonly(accounts.new_vault_authority, false),
            AccountMeta::new_readonly(accounts.vault_authority, true),
            AccountMeta::new_readonly(accounts.transfer_authority, true),
            AccountMeta::new_readonly(accounts.burn_authority, false),
            AccountMeta::new_readonly(accounts.external_price_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
    )
}

/// Hand vault authority to the auction manager
pub fn set_vault_authority(
    vault: &Pubkey,
    current_authority: &Pubkey,
    new_authority: &Pubkey,
) -> Instruction {
    Instruction::new_with_bytes(
        VAULT_ID,
        &[SET_AUTHORITY],
        vec![
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*current_authority, true),
            AccountMeta::new_readonly(*new_authority, false),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_account_data_layout() {
        let epa = Pubkey::new_unique();
        let ix = update_external_price_account(&epa);
        assert_eq!(ix.program_id, VAULT_ID);
        assert_eq!(ix.data[0], UPDATE_EXTERNAL_PRICE_ACCOUNT);
        assert_eq!(ix.data[1], EXTERNAL_PRICE_ACCOUNT_KEY);
        // instruction + key + u64 price + mint + bool
        assert_eq!(ix.data.len(), 1 + 1 + 8 + 32 + 1);
        assert_eq!(*ix.data.last().unwrap(), 1);
    }

    #[test]
    fn test_set_authority_is_bare_discriminator() {
        let key = Pubkey::new_unique();
        let ix = set_vault_authority(&key, &key, &key);
        assert_eq!(ix.data, vec![SET_AUTHORITY]);
        assert_eq!(ix.accounts.len(), 3);
        assert!(ix.accounts[1].is_signer);
    }

    #[test]
    fn test_add_token_amount_encoding() {
        let key = Pubkey::new_unique();
        let accounts = AddTokenAccounts {
            vault: key,
            vault_authority: key,
            safety_deposit_box: key,
            token_account: key,
            token_store: key,
            transfer_authority: key,
            payer: key,
        };
        let ix = add_token_to_inactive_vault(&accounts, 1);
        assert_eq!(ix.data[0], ADD_TOKEN_TO_INACTIVE_VAULT);
        assert_eq!(&ix.data[1..9], &1u64.to_le_bytes());
    }
}
