//! Lootwatch Catalog Probe
//!
//! Fetches the storefront catalog once and prints how every entry classifies,
//! without touching the database or sending any notification.
//!
//! ## Usage
//!
//! ```bash
//! # Default storefront (it-IT / IT)
//! cargo run --bin catalog-probe
//!
//! # Another storefront
//! STORE_LOCALE=en-US STORE_COUNTRY=US cargo run --bin catalog-probe
//! ```

use std::time::{Duration, Instant};

use lootwatch_catalog::classifier::{self, CatalogSummary};
use lootwatch_catalog::fetcher::{EpicCatalogClient, classify_all};
use lootwatch_common::types::{FreePromotion, StoreLocale};

fn print_report(
    summary: &CatalogSummary,
    free: &[FreePromotion],
    locale: &StoreLocale,
    elapsed: Duration,
) {
    println!();
    println!("══════════════════════════════════════════════════════════════");
    println!("  CATALOG PROBE RESULTS");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("  Storefront:         {}", locale);
    println!("  Fetch Time:         {:.0}ms", elapsed.as_secs_f64() * 1000.0);
    println!();
    println!("  ── Classification ──────────────────────────────────────");
    println!("  Total Entries:      {}", summary.total);
    println!("  Free Now:           {}", summary.free);
    println!("  Free Without Id:    {}", summary.untracked);
    println!("  Not Free:           {}", summary.paid);
    println!("  Without Promotions: {}", summary.without_promotions);
    println!();

    if !free.is_empty() {
        println!("  ── Free Promotions ─────────────────────────────────────");
        for promo in free {
            let until = promo
                .end_date
                .map(|d| d.format("%d/%m/%Y %H:%M UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  • {} [{}]", promo.title, promo.id);
            println!("      until: {}", until);
            println!("      link:  {}", promo.url);
        }
        println!();
    }

    println!("══════════════════════════════════════════════════════════════");
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter("catalog_probe=info,lootwatch_catalog=debug,warn")
        .init();

    let locale = StoreLocale::new(
        std::env::var("STORE_LOCALE").unwrap_or_else(|_| "it-IT".to_string()),
        std::env::var("STORE_COUNTRY").unwrap_or_else(|_| "IT".to_string()),
    );
    let timeout_secs: u64 = std::env::var("FETCH_TIMEOUT_SECS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("FETCH_TIMEOUT_SECS must be a valid u64"))?;

    println!();
    println!("Lootwatch Catalog Probe");
    println!("───────────────────────────────────────");
    println!("Locale:  {}", locale.locale);
    println!("Country: {}", locale.country);
    println!();

    let client = EpicCatalogClient::new(locale.clone(), Duration::from_secs(timeout_secs))?;

    let started = Instant::now();
    let entries = client.fetch_entries().await?;
    let elapsed = started.elapsed();

    let summary = classifier::summarize(&entries, &locale);
    let free = classify_all(&entries, &locale);

    print_report(&summary, &free, &locale, elapsed);

    Ok(())
}
