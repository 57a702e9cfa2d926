//! Promotion classifier: decides which catalog entries are free right now.
//!
//! The upstream promotional schema is deeply nested and every level is optional:
//!
//! ```text
//! entry.promotions.promotionalOffers[]      (promotion groups)
//!      .promotionalOffers[]                 (dated offers)
//!      .discountSetting.discountPercentage
//!      .endDate
//! ```
//!
//! Every accessor here treats a missing or wrongly-typed field as absent.
//! Nothing in this module returns an error or panics on malformed input.

use chrono::{DateTime, Utc};
use serde_json::Value;

use lootwatch_common::types::{FreePromotion, StoreLocale};

const STORE_BASE_URL: &str = "https://store.epicgames.com";

/// One raw element of the upstream catalog listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    raw: Value,
}

impl CatalogEntry {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn id(&self) -> Option<&str> {
        self.non_empty_str("id")
    }

    pub fn title(&self) -> Option<&str> {
        self.non_empty_str("title")
    }

    /// Explicit direct link, if upstream provides one.
    pub fn url(&self) -> Option<&str> {
        self.non_empty_str("url")
    }

    pub fn product_slug(&self) -> Option<&str> {
        self.non_empty_str("productSlug")
    }

    /// `pageSlug` of the first offer mapping.
    pub fn first_mapping_slug(&self) -> Option<&str> {
        self.raw
            .get("offerMappings")
            .and_then(Value::as_array)
            .and_then(|mappings| mappings.first())
            .and_then(|mapping| mapping.get("pageSlug"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// `price.totalPrice.discountPrice`
    pub fn discount_price(&self) -> Option<f64> {
        self.raw
            .pointer("/price/totalPrice/discountPrice")
            .and_then(Value::as_f64)
    }

    /// Whether the entry carries a (non-null) promotions block at all.
    pub fn has_promotions(&self) -> bool {
        self.raw
            .get("promotions")
            .is_some_and(|p| !p.is_null())
    }

    /// All dated offers across all promotion groups, in document order.
    pub fn offers(&self) -> impl Iterator<Item = &Value> {
        self.raw
            .pointer("/promotions/promotionalOffers")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|group| group.get("promotionalOffers").and_then(Value::as_array))
            .flatten()
    }

    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.raw
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Whether the entry is discounted to zero cost right now.
///
/// An offer qualifies when its discount percentage is exactly 0, or when the
/// entry's total discount price is 0. Short-circuits on the first qualifying offer.
pub fn is_free(entry: &CatalogEntry) -> bool {
    let price_is_zero = entry.discount_price() == Some(0.0);

    entry.offers().any(|offer| {
        let percentage = offer
            .pointer("/discountSetting/discountPercentage")
            .and_then(Value::as_f64);
        percentage == Some(0.0) || price_is_zero
    })
}

/// First parseable `endDate` found across the nested offers, if any.
///
/// This is not simply the first non-null `endDate`: a value that is not an
/// RFC 3339 string is skipped and the search continues with the next offer,
/// so a malformed early offer never hides a valid later date.
pub fn promotion_end_date(entry: &CatalogEntry) -> Option<DateTime<Utc>> {
    entry
        .offers()
        .filter_map(|offer| offer.get("endDate").and_then(Value::as_str))
        .find_map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

/// Resolve the best available store link for an entry.
///
/// Priority: direct URL → product slug → first offer-mapping slug → id → title search.
pub fn build_game_url(entry: &CatalogEntry, locale: &StoreLocale) -> String {
    let lang = locale.language();

    if let Some(url) = entry.url() {
        return url.to_string();
    }

    if let Some(slug) = entry.product_slug() {
        return format!("{}/{}/p/{}", STORE_BASE_URL, lang, slug);
    }

    if let Some(slug) = entry.first_mapping_slug() {
        return format!("{}/{}/p/{}", STORE_BASE_URL, lang, slug);
    }

    if let Some(id) = entry.id() {
        return format!("{}/{}/p/{}", STORE_BASE_URL, lang, id);
    }

    format!(
        "{}/{}/browse?q={}",
        STORE_BASE_URL,
        lang,
        urlencoding::encode(entry.title().unwrap_or_default())
    )
}

/// Classify a catalog entry, producing a `FreePromotion` when it is free now.
///
/// Free entries without an id can't be tracked in the ledger and are skipped.
pub fn classify(entry: &CatalogEntry, locale: &StoreLocale) -> Option<FreePromotion> {
    if !is_free(entry) {
        return None;
    }

    let Some(id) = entry.id() else {
        tracing::debug!(
            title = entry.title().unwrap_or_default(),
            "Free catalog entry has no id, skipping"
        );
        return None;
    };

    Some(FreePromotion {
        id: id.to_string(),
        title: entry.title().unwrap_or_default().to_string(),
        url: build_game_url(entry, locale),
        end_date: promotion_end_date(entry),
    })
}

/// Breakdown of a catalog snapshot, used by the probe binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub total: usize,
    /// Entries that `classify` turns into a promotion
    pub free: usize,
    /// Free entries dropped because they have no id
    pub untracked: usize,
    pub paid: usize,
    /// Subset of `paid` with no promotions block at all
    pub without_promotions: usize,
}

pub fn summarize(entries: &[CatalogEntry], locale: &StoreLocale) -> CatalogSummary {
    let mut summary = CatalogSummary {
        total: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        if classify(entry, locale).is_some() {
            summary.free += 1;
        } else if is_free(entry) {
            summary.untracked += 1;
        } else {
            summary.paid += 1;
            if !entry.has_promotions() {
                summary.without_promotions += 1;
            }
        }
    }

    summary
}
