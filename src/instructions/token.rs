//! SPL token and system-program encoders

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use solana_sdk::program_pack::Pack;
use spl_token::state::{Account, Mint};

use super::encode_error;
use crate::errors::PipelineError;

/// Rent sizing for a mint account
pub const MINT_SIZE: usize = Mint::LEN;

/// Rent sizing for a token account
pub const TOKEN_ACCOUNT_SIZE: usize = Account::LEN;

/// Create and initialize a zero-decimals mint
pub fn create_mint(
    payer: &Pubkey,
    mint: &Pubkey,
    mint_rent: u64,
    authority: &Pubkey,
) -> Result<Vec<Instruction>, PipelineError> {
    let create = system_instruction::create_account(
        payer,
        mint,
        mint_rent,
        Mint::LEN as u64,
        &spl_token::id(),
    );
    let init = spl_token::instruction::initialize_mint(
        &spl_token::id(),
        mint,
        authority,
        Some(authority),
        0,
    )
    .map_err(|e| encode_error("spl-token", e))?;
    Ok(vec![create, init])
}

/// Create and initialize a token account for `mint` owned by `owner`
pub fn create_token_account(
    payer: &Pubkey,
    account: &Pubkey,
    account_rent: u64,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<Vec<Instruction>, PipelineError> {
    let create = system_instruction::create_account(
        payer,
        account,
        account_rent,
        Account::LEN as u64,
        &spl_token::id(),
    );
    let init = spl_token::instruction::initialize_account(&spl_token::id(), account, mint, owner)
        .map_err(|e| encode_error("spl-token", e))?;
    Ok(vec![create, init])
}

/// Create the associated token account for `wallet`/`mint`, returning its
/// address alongside the instruction
pub fn create_associated_account(payer: &Pubkey, wallet: &Pubkey, mint: &Pubkey) -> (Instruction, Pubkey) {
    let address = spl_associated_token_account::get_associated_token_address(wallet, mint);
    let ix = spl_associated_token_account::instruction::create_associated_token_account(
        payer,
        wallet,
        mint,
        &spl_token::id(),
    );
    (ix, address)
}

/// Associated token account address without the creation instruction
pub fn associated_account(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}

pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<Instruction, PipelineError> {
    spl_token::instruction::mint_to(&spl_token::id(), mint, destination, authority, &[], amount)
        .map_err(|e| encode_error("spl-token", e))
}

pub fn transfer(
    source: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction, PipelineError> {
    spl_token::instruction::transfer(&spl_token::id(), source, destination, owner, &[], amount)
        .map_err(|e| encode_error("spl-token", e))
}

/// Delegate `amount` from `account` to `delegate`
pub fn approve(
    account: &Pubkey,
    delegate: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction, PipelineError> {
    spl_token::instruction::approve(&spl_token::id(), account, delegate, owner, &[], amount)
        .map_err(|e| encode_error("spl-token", e))
}
