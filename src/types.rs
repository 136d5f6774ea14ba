//! Common types used throughout the pipeline

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Maximum number of items accepted per run
///
/// Exceeding it is rejected before any submission begins.
pub const MAX_BATCH_ITEMS: usize = 200;

/// Most edition prints a single item may put up for sale
///
/// The on-chain validation instruction encodes the winner range length as
/// a single byte, so a larger complement cannot be represented.
pub const MAX_EDITION_PRINTS: u64 = 255;

/// One entry of the driving batch file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// URI of the item's metadata descriptor
    pub uri: String,

    /// Maximum supply of limited edition prints from the master
    pub max_supply: u64,

    /// Instant sale price in SOL
    pub price: f64,

    /// Number of prints reserved off-auction
    pub reserved: u64,

    /// Resolved descriptor, populated by metadata retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ItemMetadata>,
}

impl BatchItem {
    /// Stable identifier used for audit records and checkpoints
    ///
    /// The URI is the only field guaranteed unique per item in the input
    /// contract, so it doubles as the item key.
    pub fn id(&self) -> &str {
        &self.uri
    }

    /// Number of edition prints to mint before the sale stage
    pub fn editions_to_mint(&self) -> u64 {
        self.max_supply.saturating_sub(self.reserved)
    }

    /// Check the fields the workflow relies on, before any network call
    pub fn validate(&self) -> Result<(), crate::errors::PipelineError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(crate::errors::PipelineError::InputValidation(format!(
                "item {}: price {} is not a finite non-negative number",
                self.uri, self.price
            )));
        }
        if self.editions_to_mint() > MAX_EDITION_PRINTS {
            return Err(crate::errors::PipelineError::InputValidation(format!(
                "item {}: {} sellable editions exceed the limit of {}",
                self.uri,
                self.editions_to_mint(),
                MAX_EDITION_PRINTS
            )));
        }
        Ok(())
    }
}

/// Resolved metadata fields the workflow needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub name: String,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    #[serde(default)]
    pub creators: Vec<CreatorShare>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// A creator and their royalty share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorShare {
    pub address: String,
    pub share: u8,
    #[serde(default)]
    pub verified: bool,
}

/// One trait attribute from the descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

/// Raw descriptor JSON as served at the item URI
///
/// Only the fields the workflow consumes; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataJson {
    pub name: String,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    pub properties: MetadataJsonProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataJsonProperties {
    #[serde(default)]
    pub creators: Vec<CreatorShare>,
}

/// Workflow state of one item
///
/// Transitions are strictly forward; a failed transition abandons the item
/// at its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemState {
    /// Master asset minted
    Issued,
    /// Reserved-complement edition prints minted and sent to the
    /// distribution wallet
    EditionsMinted,
    /// Vault created, funded with the master token, and combined
    EscrowFunded,
    /// Auction and auction manager created, authorities transferred
    AuctionOpened,
    /// Safety deposit box validated against the auction manager
    AuctionValidated,
    /// Auction started
    AuctionStarted,
    /// Sale hand-off complete
    Settled,
}

impl ItemState {
    /// The next state in the chain, if any
    pub fn next(self) -> Option<ItemState> {
        match self {
            ItemState::Issued => Some(ItemState::EditionsMinted),
            ItemState::EditionsMinted => Some(ItemState::EscrowFunded),
            ItemState::EscrowFunded => Some(ItemState::AuctionOpened),
            ItemState::AuctionOpened => Some(ItemState::AuctionValidated),
            ItemState::AuctionValidated => Some(ItemState::AuctionStarted),
            ItemState::AuctionStarted => Some(ItemState::Settled),
            ItemState::Settled => None,
        }
    }

    /// Stage name used in audit records
    pub fn name(self) -> &'static str {
        match self {
            ItemState::Issued => "issued",
            ItemState::EditionsMinted => "editions_minted",
            ItemState::EscrowFunded => "escrow_funded",
            ItemState::AuctionOpened => "auction_opened",
            ItemState::AuctionValidated => "auction_validated",
            ItemState::AuctionStarted => "auction_started",
            ItemState::Settled => "settled",
        }
    }
}

/// Addresses and identifiers accumulated across stage transitions
///
/// Each stage fills in the fields it produces; later stages read them.
/// Pubkeys are stored base58-encoded so the record round-trips through the
/// checkpoint store and audit log unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOutputs {
    pub mint: Option<String>,
    pub token_account: Option<String>,
    pub metadata_account: Option<String>,
    pub master_edition: Option<String>,
    pub edition_mints: Vec<String>,
    pub external_price_account: Option<String>,
    pub vault: Option<String>,
    pub fraction_mint: Option<String>,
    pub fraction_treasury: Option<String>,
    pub redeem_treasury: Option<String>,
    pub token_store: Option<String>,
    pub auction: Option<String>,
    pub auction_extended: Option<String>,
    pub auction_manager: Option<String>,
    pub token_tracker: Option<String>,
    pub accept_payment_account: Option<String>,
}

impl StageOutputs {
    /// Read a required pubkey produced by an earlier stage
    pub fn require(
        &self,
        field: Option<&String>,
        what: &str,
    ) -> Result<Pubkey, crate::errors::PipelineError> {
        let value = field.ok_or_else(|| crate::errors::PipelineError::missing_account(what))?;
        value
            .parse::<Pubkey>()
            .map_err(|e| crate::errors::PipelineError::DependencyState(format!("{what}: {e}")))
    }
}

/// Why an item was abandoned, for the final summary
#[derive(Debug)]
pub struct AbandonedItem {
    pub item_id: String,
    pub stage: &'static str,
    pub error: crate::errors::PipelineError,
}

/// Final outcome of one run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Items that completed the full chain
    pub settled: Vec<String>,
    /// Items abandoned mid-chain, with the failing stage and error
    pub abandoned: Vec<AbandonedItem>,
    /// Items skipped before any ledger interaction (metadata failures)
    pub skipped: Vec<String>,
}

impl RunSummary {
    /// Whether the run completed without losing any item
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty() && self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_chain_terminates() {
        let mut state = ItemState::Issued;
        let mut hops = 0;
        while let Some(next) = state.next() {
            state = next;
            hops += 1;
        }
        assert_eq!(state, ItemState::Settled);
        assert_eq!(hops, 6);
    }

    #[test]
    fn test_editions_to_mint() {
        let item = BatchItem {
            uri: "u".into(),
            max_supply: 3,
            price: 1.0,
            reserved: 1,
            metadata: None,
        };
        assert_eq!(item.editions_to_mint(), 2);

        let exhausted = BatchItem {
            reserved: 5,
            ..item.clone()
        };
        assert_eq!(exhausted.editions_to_mint(), 0);
    }

    #[test]
    fn test_validate_rejects_bad_price() {
        let mut item = BatchItem {
            uri: "u".into(),
            max_supply: 3,
            price: 1.0,
            reserved: 0,
            metadata: None,
        };
        assert!(item.validate().is_ok());

        item.price = -0.5;
        assert!(item.validate().is_err());

        item.price = f64::NAN;
        assert!(item.validate().is_err());

        item.price = f64::INFINITY;
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_validate_caps_sellable_editions() {
        let mut item = BatchItem {
            uri: "u".into(),
            max_supply: MAX_EDITION_PRINTS,
            price: 1.0,
            reserved: 0,
            metadata: None,
        };
        assert!(item.validate().is_ok());

        item.max_supply = MAX_EDITION_PRINTS + 1;
        assert!(matches!(
            item.validate(),
            Err(crate::errors::PipelineError::InputValidation(_))
        ));

        // A large supply is fine as long as the reserve brings the
        // sellable complement back under the cap.
        item.reserved = 1;
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_outputs_require() {
        let mut outputs = StageOutputs::default();
        assert!(outputs.require(outputs.vault.as_ref(), "vault").is_err());

        outputs.vault = Some(Pubkey::new_unique().to_string());
        assert!(outputs.require(outputs.vault.as_ref(), "vault").is_ok());

        outputs.auction = Some("not-a-pubkey".into());
        assert!(outputs.require(outputs.auction.as_ref(), "auction").is_err());
    }
}
