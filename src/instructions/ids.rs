//! Program identifiers for the on-chain program families

use solana_sdk::pubkey::Pubkey;

/// Token metadata program
pub const METADATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Token vault program
pub const VAULT_ID: Pubkey = solana_sdk::pubkey!("yvaUJxtAiuphyL7JiVMMdY7uTJe1ekb4LmHXtBv5SFd");

/// Auction program
pub const AUCTION_ID: Pubkey = solana_sdk::pubkey!("yauNkf2KVyLp9YBQb4mNeiwFCCWu1Vei9Tx3EsgCESG");

/// Metaplex auction-manager program
pub const METAPLEX_ID: Pubkey = solana_sdk::pubkey!("yp1ZrQ2ghLMDNdaGdYLiwi8QRFyws2tAHNa7JG2VuTq");

/// Wrapped SOL mint, the payment token for auctions
pub const NATIVE_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Vault account size for rent sizing
pub const VAULT_ACCOUNT_SIZE: usize = 205;

/// External price account size for rent sizing
pub const EXTERNAL_PRICE_ACCOUNT_SIZE: usize = 42;
