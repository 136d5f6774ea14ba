//! Stage transition builders
//!
//! Each workflow state has one builder that assembles the operations for
//! the transition into it, submits them through the confirmation loop, and
//! records the addresses it produced in [`StageOutputs`]. Builders read
//! only prior-stage outputs, so a resumed item re-enters the chain at any
//! state boundary.

use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tracing::info;

use crate::audit::AuditLog;
use crate::batch::{Operation, OperationBatch};
use crate::confirm::{self, ConfirmPolicy};
use crate::errors::PipelineError;
use crate::instructions::ids::{
    EXTERNAL_PRICE_ACCOUNT_SIZE, LAMPORTS_PER_SOL, NATIVE_MINT, VAULT_ACCOUNT_SIZE, VAULT_ID,
};
use crate::instructions::{auction, pda, token, token_metadata, vault};
use crate::ledger::LedgerConnection;
use crate::types::{BatchItem, ItemState, StageOutputs};
use crate::wallet::WalletManager;

/// Everything a stage builder needs, threaded explicitly
pub struct StageContext<'a> {
    pub connection: &'a dyn LedgerConnection,
    pub wallet: &'a WalletManager,
    pub policy: &'a ConfirmPolicy,
    pub audit: &'a AuditLog,
    /// Owner whose store and creator whitelist the auction runs under
    pub store_owner: Pubkey,
    /// Wallet receiving the pre-minted editions at settlement
    pub distribution_wallet: Pubkey,
}

impl StageContext<'_> {
    fn payer(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    async fn rent(&self, size: usize) -> Result<u64, PipelineError> {
        self.connection.minimum_balance_for_rent_exemption(size).await
    }

    async fn submit(
        &self,
        batch: &OperationBatch,
        item: &BatchItem,
        stage: ItemState,
    ) -> Result<(), PipelineError> {
        confirm::submit_batch(
            self.connection,
            self.wallet,
            batch,
            self.policy,
            self.audit,
            item.id(),
            stage.name(),
        )
        .await?;
        Ok(())
    }
}

/// Run the transition into `target`, assuming every earlier state's outputs
/// are present
pub async fn run_stage(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    target: ItemState,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    match target {
        ItemState::Issued => issue_asset(ctx, item, outputs).await,
        ItemState::EditionsMinted => mint_editions(ctx, item, outputs).await,
        ItemState::EscrowFunded => fund_escrow(ctx, item, outputs).await,
        ItemState::AuctionOpened => open_auction(ctx, item, outputs).await,
        ItemState::AuctionValidated => validate_auction(ctx, item, outputs).await,
        ItemState::AuctionStarted => start_auction(ctx, item, outputs).await,
        ItemState::Settled => settle(ctx, item, outputs).await,
    }
}

fn lamports(price_sol: f64) -> u64 {
    (price_sol * LAMPORTS_PER_SOL as f64) as u64
}

/// Mint the master asset: mint account, metadata, recipient token account,
/// supply of one, master edition capping prints at `max_supply`
async fn issue_asset(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    let metadata = item
        .metadata
        .as_ref()
        .ok_or_else(|| PipelineError::DependencyState("metadata not resolved".into()))?;

    let token_ref = ctx.connection.fetch_freshness_token().await?;
    let payer = ctx.payer();
    let mint = Keypair::new();
    let mint_rent = ctx.rent(token::MINT_SIZE).await?;

    let metadata_pda = pda::metadata_account(&mint.pubkey());
    let master_edition_pda = pda::master_edition(&mint.pubkey());

    // Creators self-verify only when they are the submitting wallet.
    let creators: Vec<_> = metadata
        .creators
        .iter()
        .map(|c| crate::types::CreatorShare {
            verified: c.address == payer.to_string(),
            ..c.clone()
        })
        .collect();

    let mut batch = OperationBatch::new();
    batch.add_signer(mint.insecure_clone());

    batch.add_operation(Operation::with_instructions(
        token::create_mint(&payer, &mint.pubkey(), mint_rent, &payer)?,
        token_ref,
        payer,
    ));
    batch.add_operation(Operation::with_instructions(
        vec![token_metadata::create_metadata_v2(
            &metadata_pda,
            &mint.pubkey(),
            &payer,
            &payer,
            &payer,
            &token_metadata::MetadataArgs {
                name: &metadata.name,
                symbol: &metadata.symbol,
                uri: &item.uri,
                seller_fee_basis_points: metadata.seller_fee_basis_points,
                creators: &creators,
            },
        )?],
        token_ref,
        payer,
    ));

    let (create_ata, recipient) = token::create_associated_account(&payer, &payer, &mint.pubkey());
    batch.add_operation(Operation::with_instructions(
        vec![
            create_ata,
            token::mint_to(&mint.pubkey(), &recipient, &payer, 1)?,
        ],
        token_ref,
        payer,
    ));
    batch.add_operation(Operation::with_instructions(
        vec![token_metadata::create_master_edition_v3(
            &master_edition_pda,
            &mint.pubkey(),
            &metadata_pda,
            &payer,
            &payer,
            Some(item.max_supply),
        )],
        token_ref,
        payer,
    ));

    ctx.submit(&batch, item, ItemState::Issued).await?;

    outputs.mint = Some(mint.pubkey().to_string());
    outputs.token_account = Some(recipient.to_string());
    outputs.metadata_account = Some(metadata_pda.to_string());
    outputs.master_edition = Some(master_edition_pda.to_string());
    Ok(())
}

/// Mint the editions not reserved for the sale, one submission per print,
/// each print handed to the distribution wallet in the same submission
///
/// Print numbers are allocated sequentially from one; each submission is
/// confirmed before the next is built so the marker accounts never race.
/// Because the transfer rides the print's own submission, a confirmed
/// print is always already distributed.
async fn mint_editions(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    let master_mint = outputs.require(outputs.mint.as_ref(), "master mint")?;
    let payer = ctx.payer();
    let master_edition_pda = pda::master_edition(&master_mint);
    let master_metadata_pda = pda::metadata_account(&master_mint);
    let master_token_account = token::associated_account(&payer, &master_mint);
    let mint_rent = ctx.rent(token::MINT_SIZE).await?;

    let count = item.editions_to_mint();
    info!(item = item.id(), count, "Minting editions");

    for edition in 1..=count {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let mint = Keypair::new();
        let new_metadata = pda::metadata_account(&mint.pubkey());
        let new_edition = pda::master_edition(&mint.pubkey());
        let marker = pda::edition_marker(&master_mint, edition);

        let mut batch = OperationBatch::new();
        batch.add_signer(mint.insecure_clone());

        let mut prep = Operation::with_instructions(
            token::create_mint(&payer, &mint.pubkey(), mint_rent, &payer)?,
            token_ref,
            payer,
        );
        let (create_ata, recipient) =
            token::create_associated_account(&payer, &payer, &mint.pubkey());
        prep.add_instruction(create_ata);
        prep.add_instruction(token::mint_to(&mint.pubkey(), &recipient, &payer, 1)?);
        batch.add_before_operation(prep);

        batch.add_operation(Operation::with_instructions(
            vec![token_metadata::mint_edition_from_master(
                &token_metadata::EditionPrintAccounts {
                    new_metadata,
                    new_edition,
                    master_edition: master_edition_pda,
                    new_mint: mint.pubkey(),
                    edition_marker: marker,
                    master_token_account,
                    master_metadata: master_metadata_pda,
                },
                &payer,
                &payer,
                edition,
            )],
            token_ref,
            payer,
        ));

        let destination = token::associated_account(&ctx.distribution_wallet, &mint.pubkey());
        let mut send = Operation::new(token_ref, payer);
        if ctx.connection.get_account_state(&destination).await?.is_none() {
            let (create, _) =
                token::create_associated_account(&payer, &ctx.distribution_wallet, &mint.pubkey());
            send.add_instruction(create);
        }
        send.add_instruction(token::transfer(&recipient, &destination, &payer, 1)?);
        batch.add_after_operation(send);

        ctx.submit(&batch, item, ItemState::EditionsMinted).await?;
        outputs.edition_mints.push(mint.pubkey().to_string());
    }
    Ok(())
}

/// Escrow the master token: price account, vault, deposit, activate and
/// combine
///
/// Four confirmed submissions; each builds only on accounts the previous
/// one created, so a retry of any of them is safe.
async fn fund_escrow(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    let master_token_account =
        outputs.require(outputs.token_account.as_ref(), "master token account")?;
    let master_mint = outputs.require(outputs.mint.as_ref(), "master mint")?;
    let payer = ctx.payer();

    let account_rent = ctx.rent(token::TOKEN_ACCOUNT_SIZE).await?;
    let mint_rent = ctx.rent(token::MINT_SIZE).await?;
    let vault_rent = ctx.rent(VAULT_ACCOUNT_SIZE).await?;
    let epa_rent = ctx.rent(EXTERNAL_PRICE_ACCOUNT_SIZE).await?;

    // 1. External price account
    let epa = Keypair::new();
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let mut batch = OperationBatch::new();
        batch.add_operation(Operation::with_instructions(
            vec![
                solana_sdk::system_instruction::create_account(
                    &payer,
                    &epa.pubkey(),
                    epa_rent,
                    EXTERNAL_PRICE_ACCOUNT_SIZE as u64,
                    &VAULT_ID,
                ),
                vault::update_external_price_account(&epa.pubkey()),
            ],
            token_ref,
            payer,
        ));
        batch.add_signer(epa.insecure_clone());
        ctx.submit(&batch, item, ItemState::EscrowFunded).await?;
    }

    // 2. Vault with treasuries
    let vault_key = Keypair::new();
    let fraction_mint = Keypair::new();
    let redeem_treasury = Keypair::new();
    let fraction_treasury = Keypair::new();
    let vault_authority = pda::vault_authority(&vault_key.pubkey());
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let mut batch = OperationBatch::new();
        batch.add_operation(Operation::with_instructions(
            token::create_mint(&payer, &fraction_mint.pubkey(), mint_rent, &vault_authority)?,
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            token::create_token_account(
                &payer,
                &redeem_treasury.pubkey(),
                account_rent,
                &NATIVE_MINT,
                &vault_authority,
            )?,
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            token::create_token_account(
                &payer,
                &fraction_treasury.pubkey(),
                account_rent,
                &fraction_mint.pubkey(),
                &vault_authority,
            )?,
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            vec![
                solana_sdk::system_instruction::create_account(
                    &payer,
                    &vault_key.pubkey(),
                    vault_rent,
                    VAULT_ACCOUNT_SIZE as u64,
                    &VAULT_ID,
                ),
                vault::init_vault(
                    &vault::InitVaultAccounts {
                        vault: vault_key.pubkey(),
                        vault_authority: payer,
                        fraction_mint: fraction_mint.pubkey(),
                        redeem_treasury: redeem_treasury.pubkey(),
                        fraction_treasury: fraction_treasury.pubkey(),
                        pricing_lookup: epa.pubkey(),
                    },
                    true,
                ),
            ],
            token_ref,
            payer,
        ));
        batch.add_signer(fraction_mint.insecure_clone());
        batch.add_signer(redeem_treasury.insecure_clone());
        batch.add_signer(fraction_treasury.insecure_clone());
        batch.add_signer(vault_key.insecure_clone());
        ctx.submit(&batch, item, ItemState::EscrowFunded).await?;
    }

    // 3. Deposit the master token into a safety deposit box
    let token_store = Keypair::new();
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let transfer_authority = Keypair::new();
        let safety_deposit_box = pda::safety_deposit_box(&vault_key.pubkey(), &master_mint);

        let mut batch = OperationBatch::new();
        batch.add_operation(Operation::with_instructions(
            token::create_token_account(
                &payer,
                &token_store.pubkey(),
                account_rent,
                &master_mint,
                &vault_authority,
            )?,
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            vec![
                token::approve(
                    &master_token_account,
                    &transfer_authority.pubkey(),
                    &payer,
                    1,
                )?,
                vault::add_token_to_inactive_vault(
                    &vault::AddTokenAccounts {
                        vault: vault_key.pubkey(),
                        vault_authority: payer,
                        safety_deposit_box,
                        token_account: master_token_account,
                        token_store: token_store.pubkey(),
                        transfer_authority: transfer_authority.pubkey(),
                        payer,
                    },
                    1,
                ),
            ],
            token_ref,
            payer,
        ));
        batch.add_signer(token_store.insecure_clone());
        batch.add_signer(transfer_authority);
        ctx.submit(&batch, item, ItemState::EscrowFunded).await?;
    }

    // 4. Activate on one share, then combine back under the wallet
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let outstanding_shares = Keypair::new();
        let paying_account = Keypair::new();
        let transfer_authority = Keypair::new();

        let mut batch = OperationBatch::new();
        batch.add_operation(Operation::with_instructions(
            vec![vault::activate_vault(
                &vault_key.pubkey(),
                &fraction_mint.pubkey(),
                &fraction_treasury.pubkey(),
                &vault_authority,
                &payer,
                1,
            )],
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            token::create_token_account(
                &payer,
                &outstanding_shares.pubkey(),
                account_rent,
                &fraction_mint.pubkey(),
                &payer,
            )?,
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            token::create_token_account(
                &payer,
                &paying_account.pubkey(),
                account_rent,
                &NATIVE_MINT,
                &payer,
            )?,
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            vec![
                token::approve(
                    &paying_account.pubkey(),
                    &transfer_authority.pubkey(),
                    &payer,
                    0,
                )?,
                token::approve(
                    &outstanding_shares.pubkey(),
                    &transfer_authority.pubkey(),
                    &payer,
                    0,
                )?,
                vault::combine_vault(&vault::CombineVaultAccounts {
                    vault: vault_key.pubkey(),
                    outstanding_share_account: outstanding_shares.pubkey(),
                    paying_token_account: paying_account.pubkey(),
                    fraction_mint: fraction_mint.pubkey(),
                    fraction_treasury: fraction_treasury.pubkey(),
                    redeem_treasury: redeem_treasury.pubkey(),
                    new_vault_authority: payer,
                    vault_authority: payer,
                    transfer_authority: transfer_authority.pubkey(),
                    burn_authority: vault_authority,
                    external_price_account: epa.pubkey(),
                }),
            ],
            token_ref,
            payer,
        ));
        batch.add_signer(outstanding_shares);
        batch.add_signer(paying_account);
        batch.add_signer(transfer_authority);
        ctx.submit(&batch, item, ItemState::EscrowFunded).await?;
    }

    outputs.external_price_account = Some(epa.pubkey().to_string());
    outputs.vault = Some(vault_key.pubkey().to_string());
    outputs.fraction_mint = Some(fraction_mint.pubkey().to_string());
    outputs.fraction_treasury = Some(fraction_treasury.pubkey().to_string());
    outputs.redeem_treasury = Some(redeem_treasury.pubkey().to_string());
    outputs.token_store = Some(token_store.pubkey().to_string());
    Ok(())
}

/// Create the auction and its manager, then transfer both authorities to
/// the manager
async fn open_auction(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    let vault_key = outputs.require(outputs.vault.as_ref(), "vault")?;
    let payer = ctx.payer();

    let auction_pda = pda::auction(&vault_key);
    let auction_extended_pda = pda::auction_extended(&vault_key);
    let manager_pda = pda::auction_manager(&auction_pda);
    let tracker_pda = pda::token_tracker(&manager_pda);
    let store_pda = pda::store(&ctx.store_owner);
    let account_rent = ctx.rent(token::TOKEN_ACCOUNT_SIZE).await?;

    // 1. Auction with instant-sale pricing
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let mut batch = OperationBatch::new();
        batch.add_operation(Operation::with_instructions(
            vec![auction::create_auction_v2(
                &auction_pda,
                &auction_extended_pda,
                &payer,
                &vault_key,
                &auction::AuctionSettings {
                    winners: item.max_supply,
                    price_lamports: lamports(item.price),
                },
            )],
            token_ref,
            payer,
        ));
        ctx.submit(&batch, item, ItemState::AuctionOpened).await?;
    }

    // 2. Auction manager, fronted by its payment account
    let accept_payment = Keypair::new();
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let mut batch = OperationBatch::new();
        batch.add_before_operation(Operation::with_instructions(
            token::create_token_account(
                &payer,
                &accept_payment.pubkey(),
                account_rent,
                &NATIVE_MINT,
                &manager_pda,
            )?,
            token_ref,
            payer,
        ));
        batch.add_operation(Operation::with_instructions(
            vec![auction::init_auction_manager_v2(
                &auction::InitAuctionManagerAccounts {
                    auction_manager: manager_pda,
                    token_tracker: tracker_pda,
                    auction: auction_pda,
                    vault: vault_key,
                    authority: payer,
                    payer,
                    accept_payment_account: accept_payment.pubkey(),
                    store: store_pda,
                },
                10,
            )],
            token_ref,
            payer,
        ));
        batch.add_signer(accept_payment.insecure_clone());
        ctx.submit(&batch, item, ItemState::AuctionOpened).await?;
    }

    // 3. Hand the auction to the manager
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let mut batch = OperationBatch::new();
        batch.add_operation(Operation::with_instructions(
            vec![auction::set_auction_authority(&auction_pda, &payer, &manager_pda)],
            token_ref,
            payer,
        ));
        ctx.submit(&batch, item, ItemState::AuctionOpened).await?;
    }

    // 4. Hand the vault to the manager
    {
        let token_ref = ctx.connection.fetch_freshness_token().await?;
        let mut batch = OperationBatch::new();
        batch.add_operation(Operation::with_instructions(
            vec![vault::set_vault_authority(&vault_key, &payer, &manager_pda)],
            token_ref,
            payer,
        ));
        ctx.submit(&batch, item, ItemState::AuctionOpened).await?;
    }

    outputs.auction = Some(auction_pda.to_string());
    outputs.auction_extended = Some(auction_extended_pda.to_string());
    outputs.auction_manager = Some(manager_pda.to_string());
    outputs.token_tracker = Some(tracker_pda.to_string());
    outputs.accept_payment_account = Some(accept_payment.pubkey().to_string());
    Ok(())
}

/// Validate the deposited master edition against the auction manager
///
/// The auction and manager accounts are read back first; a missing account
/// means a prior transition did not actually land and the item cannot
/// proceed.
async fn validate_auction(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    let vault_key = outputs.require(outputs.vault.as_ref(), "vault")?;
    let master_mint = outputs.require(outputs.mint.as_ref(), "master mint")?;
    let metadata_pda = outputs.require(outputs.metadata_account.as_ref(), "metadata account")?;
    let auction_pda = outputs.require(outputs.auction.as_ref(), "auction")?;
    let manager_pda = outputs.require(outputs.auction_manager.as_ref(), "auction manager")?;
    let tracker_pda = outputs.require(outputs.token_tracker.as_ref(), "token tracker")?;
    let token_store = outputs.require(outputs.token_store.as_ref(), "token store")?;
    let payer = ctx.payer();

    for (address, what) in [(&auction_pda, "auction"), (&manager_pda, "auction manager")] {
        if ctx.connection.get_account_state(address).await?.is_none() {
            return Err(PipelineError::missing_account(what));
        }
    }

    let store_pda = pda::store(&ctx.store_owner);
    let safety_deposit_box = pda::safety_deposit_box(&vault_key, &master_mint);

    let token_ref = ctx.connection.fetch_freshness_token().await?;
    let mut batch = OperationBatch::new();
    batch.add_operation(Operation::with_instructions(
        vec![auction::validate_safety_deposit_box_v2(
            &auction::ValidateBoxAccounts {
                safety_deposit_config: pda::safety_deposit_config(&manager_pda, &safety_deposit_box),
                token_tracker: tracker_pda,
                auction_manager: manager_pda,
                metadata: metadata_pda,
                original_authority: pda::original_authority(&auction_pda, &metadata_pda),
                whitelisted_creator: pda::whitelisted_creator(&store_pda, &payer),
                store: store_pda,
                safety_deposit_box,
                token_store,
                mint: master_mint,
                edition: pda::master_edition(&master_mint),
                vault: vault_key,
                authority: payer,
            },
            item.editions_to_mint(),
        )?],
        token_ref,
        payer,
    ));
    ctx.submit(&batch, item, ItemState::AuctionValidated).await
}

/// Start the managed auction
async fn start_auction(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    let auction_pda = outputs.require(outputs.auction.as_ref(), "auction")?;
    let manager_pda = outputs.require(outputs.auction_manager.as_ref(), "auction manager")?;
    let payer = ctx.payer();

    let token_ref = ctx.connection.fetch_freshness_token().await?;
    let mut batch = OperationBatch::new();
    batch.add_operation(Operation::with_instructions(
        vec![auction::start_auction(
            &auction_pda,
            &manager_pda,
            &payer,
            &pda::store(&ctx.store_owner),
        )],
        token_ref,
        payer,
    ));
    ctx.submit(&batch, item, ItemState::AuctionStarted).await
}

/// Mark the item settled
///
/// Every print was already handed to the distribution wallet when it was
/// minted, and the sale and proceeds path runs on-chain under the auction
/// manager from here. Nothing is submitted; the live auction account is
/// read back as a final sanity check.
async fn settle(
    ctx: &StageContext<'_>,
    item: &BatchItem,
    outputs: &mut StageOutputs,
) -> Result<(), PipelineError> {
    let auction_pda = outputs.require(outputs.auction.as_ref(), "auction")?;

    if ctx.connection.get_account_state(&auction_pda).await?.is_none() {
        return Err(PipelineError::missing_account("auction"));
    }

    info!(
        item = item.id(),
        auction = %auction_pda,
        editions = outputs.edition_mints.len(),
        "Sale hand-off complete"
    );
    Ok(())
}
