//! Catalog fetcher: one HTTP round-trip to the storefront promotions endpoint,
//! followed by classification of every returned element in response order.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use lootwatch_common::types::{FreePromotion, StoreLocale};

use crate::classifier::{self, CatalogEntry};

/// Default storefront promotions endpoint.
pub const DEFAULT_CATALOG_URL: &str =
    "https://store-site-backend-static.ak.epicgames.com/freeGamesPromotions";

/// JSON pointer to the element list inside the response body.
const ELEMENTS_POINTER: &str = "/data/Catalog/searchStore/elements";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Recoverable failure talking to the upstream catalog.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Catalog body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog body has unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// Anything that can report which promotions are free right now.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_free_now(&self) -> Result<Vec<FreePromotion>, FetchError>;
}

/// HTTP client for the Epic Games Store free-promotions endpoint.
pub struct EpicCatalogClient {
    client: reqwest::Client,
    base_url: String,
    locale: StoreLocale,
}

impl EpicCatalogClient {
    pub fn new(locale: StoreLocale, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_CATALOG_URL.to_string(),
            locale,
        })
    }

    /// Point the client at a different endpoint (e.g., a mirror or a local fixture server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn locale(&self) -> &StoreLocale {
        &self.locale
    }

    /// Fetch the raw catalog snapshot.
    pub async fn fetch_entries(&self) -> Result<Vec<CatalogEntry>, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("locale", self.locale.locale.as_str()),
                ("country", self.locale.country.as_str()),
                ("allowCountries", self.locale.country.as_str()),
            ])
            .header(reqwest::header::ACCEPT_LANGUAGE, self.locale.accept_language())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;

        catalog_elements(&body)
    }
}

#[async_trait]
impl CatalogSource for EpicCatalogClient {
    async fn fetch_free_now(&self) -> Result<Vec<FreePromotion>, FetchError> {
        let entries = self.fetch_entries().await?;
        let free = classify_all(&entries, &self.locale);

        tracing::info!(
            locale = %self.locale,
            total = entries.len(),
            free = free.len(),
            titles = ?free.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
            "Fetched catalog snapshot"
        );

        Ok(free)
    }
}

/// Extract the element list from a catalog response body.
pub fn catalog_elements(body: &Value) -> Result<Vec<CatalogEntry>, FetchError> {
    let elements = body
        .pointer(ELEMENTS_POINTER)
        .ok_or_else(|| FetchError::UnexpectedShape(format!("missing {}", ELEMENTS_POINTER)))?
        .as_array()
        .ok_or_else(|| {
            FetchError::UnexpectedShape(format!("{} is not an array", ELEMENTS_POINTER))
        })?;

    Ok(elements.iter().cloned().map(CatalogEntry::new).collect())
}

/// Classify entries, keeping response order.
pub fn classify_all(entries: &[CatalogEntry], locale: &StoreLocale) -> Vec<FreePromotion> {
    entries
        .iter()
        .filter_map(|entry| classifier::classify(entry, locale))
        .collect()
}

/// Parse a full response body straight into the free promotions it contains.
pub fn free_promotions_from_body(
    body: &Value,
    locale: &StoreLocale,
) -> Result<Vec<FreePromotion>, FetchError> {
    let entries = catalog_elements(body)?;
    Ok(classify_all(&entries, locale))
}
