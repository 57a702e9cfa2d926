use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storefront locale used for catalog queries and store links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLocale {
    /// Full locale tag (e.g., "it-IT")
    pub locale: String,
    /// Two-letter country code (e.g., "IT")
    pub country: String,
}

impl StoreLocale {
    pub fn new(locale: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            country: country.into(),
        }
    }

    /// Lowercase language part of the locale, used as the store path segment.
    ///
    /// "it-IT" → "it", "en-US" → "en". Falls back to "en" for an empty locale.
    pub fn language(&self) -> String {
        let lang = self
            .locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if lang.is_empty() { "en".to_string() } else { lang }
    }

    /// `Accept-Language` header value matching this locale.
    pub fn accept_language(&self) -> String {
        format!("{},{};q=0.9,en;q=0.8", self.locale, self.language())
    }
}

impl Default for StoreLocale {
    fn default() -> Self {
        Self::new("it-IT", "IT")
    }
}

impl std::fmt::Display for StoreLocale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.locale, self.country)
    }
}

/// A catalog item currently discounted to zero cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePromotion {
    pub id: String,
    pub title: String,
    /// Store link resolved through the URL fallback chain
    pub url: String,
    /// End of the promotion, if the catalog exposes one
    pub end_date: Option<DateTime<Utc>>,
}

/// A promotion that has already been announced to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnnouncementRecord {
    pub id: String,
    pub title: String,
    pub announced_at: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl AnnouncementRecord {
    pub fn from_promotion(promotion: &FreePromotion, announced_at: DateTime<Utc>) -> Self {
        Self {
            id: promotion.id.clone(),
            title: promotion.title.clone(),
            announced_at,
            end_date: promotion.end_date,
        }
    }
}

/// A user registered for free-game notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscriber {
    pub id: i64,
    pub display_name: String,
    /// Channel-specific address (Telegram chat id)
    pub delivery_address: String,
    pub subscribed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_language_and_header() {
        let locale = StoreLocale::new("it-IT", "IT");
        assert_eq!(locale.language(), "it");
        assert_eq!(locale.accept_language(), "it-IT,it;q=0.9,en;q=0.8");
    }

    #[test]
    fn test_locale_language_fallback() {
        assert_eq!(StoreLocale::new("", "US").language(), "en");
        assert_eq!(StoreLocale::new("pt_BR", "BR").language(), "pt");
    }
}
