//! Metadata descriptor retrieval
//!
//! Each item's descriptor is fetched once, before any ledger interaction.
//! A fetch failure is fatal to that item only; the rest of the batch
//! proceeds.

use std::time::Duration;
use tracing::warn;

use crate::errors::PipelineError;
use crate::types::{BatchItem, ItemMetadata, MetadataJson};

/// HTTP client for item descriptors
pub struct MetadataClient {
    http: reqwest::Client,
}

impl MetadataClient {
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Rpc(format!("http client: {e}")))?;
        Ok(Self { http })
    }

    /// Fetch and decode one descriptor
    pub async fn fetch(&self, uri: &str) -> Result<MetadataJson, PipelineError> {
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|e| PipelineError::metadata_failed(uri, e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| PipelineError::metadata_failed(uri, e.to_string()))?;
        response
            .json::<MetadataJson>()
            .await
            .map_err(|e| PipelineError::metadata_failed(uri, e.to_string()))
    }

    /// Resolve descriptors for a whole batch
    ///
    /// Items whose descriptor cannot be fetched are dropped from the
    /// returned list and reported in `skipped`.
    pub async fn resolve_items(
        &self,
        items: Vec<BatchItem>,
    ) -> (Vec<BatchItem>, Vec<(String, PipelineError)>) {
        let mut resolved = Vec::with_capacity(items.len());
        let mut skipped = Vec::new();

        for mut item in items {
            if item.metadata.is_some() {
                resolved.push(item);
                continue;
            }
            match self.fetch(&item.uri).await {
                Ok(json) => {
                    item.metadata = Some(ItemMetadata {
                        name: json.name,
                        symbol: json.symbol,
                        seller_fee_basis_points: json.seller_fee_basis_points,
                        creators: json.properties.creators,
                        attributes: json.attributes,
                    });
                    resolved.push(item);
                }
                Err(e) => {
                    warn!(uri = %item.uri, error = %e, "Skipping item: metadata fetch failed");
                    skipped.push((item.uri.clone(), e));
                }
            }
        }

        (resolved, skipped)
    }
}
