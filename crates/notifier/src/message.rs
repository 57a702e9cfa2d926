//! Rendering of announcement messages (Telegram legacy Markdown).

use lootwatch_common::types::FreePromotion;

/// Closing advisory sent after the per-promotion messages.
pub const CLOSING_MESSAGE: &str = "💡 *Tip:* Claim these games while they're free and they stay in your Epic Games library for good!";

const UNKNOWN_END_DATE: &str = "not available";

/// Intro summary, worded for the number of promotions.
pub fn intro(count: usize) -> String {
    if count == 1 {
        "🎮 *There is 1 free game on the Epic Games Store!*\n\nHere is the game you can claim:"
            .to_string()
    } else {
        format!(
            "🎮 *There are {} free games on the Epic Games Store!*\n\nHere are the games you can claim:",
            count
        )
    }
}

/// One message per promotion: title, end date, link.
pub fn promotion(promo: &FreePromotion) -> String {
    let end_date = promo
        .end_date
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| UNKNOWN_END_DATE.to_string());

    format!(
        "🎯 *{}*\n\n⏰ *Available until:* {}\n\n{}",
        escape_markdown(&promo.title),
        end_date,
        promo.url
    )
}

/// Escape the characters legacy Telegram Markdown treats as entity markers.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn promo(end_date: Option<chrono::DateTime<Utc>>) -> FreePromotion {
        FreePromotion {
            id: "A".to_string(),
            title: "Hades".to_string(),
            url: "https://store.epicgames.com/it/p/hades".to_string(),
            end_date,
        }
    }

    #[test]
    fn test_intro_singular_and_plural() {
        assert!(intro(1).contains("There is 1 free game"));
        assert!(intro(3).contains("There are 3 free games"));
    }

    #[test]
    fn test_promotion_with_end_date() {
        let msg = promotion(&promo(Some(
            Utc.with_ymd_and_hms(2024, 5, 23, 15, 0, 0).unwrap(),
        )));
        assert!(msg.contains("*Hades*"));
        assert!(msg.contains("23/05/2024"));
        assert!(msg.ends_with("https://store.epicgames.com/it/p/hades"));
    }

    #[test]
    fn test_promotion_unknown_end_date() {
        let msg = promotion(&promo(None));
        assert!(msg.contains("Available until:* not available"));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Kill_It *Now* [DX]"), "Kill\\_It \\*Now\\* \\[DX]");
        assert_eq!(escape_markdown("Plain"), "Plain");
    }
}
