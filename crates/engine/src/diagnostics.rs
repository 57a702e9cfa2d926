//! Startup diagnostics: a snapshot of subscribers, ledger and catalog state.

use lootwatch_catalog::fetcher::CatalogSource;
use lootwatch_common::error::AppError;
use lootwatch_common::types::AnnouncementRecord;

use crate::ledger::AnnouncementLedger;
use crate::subscribers::SubscriberDirectory;

/// How many recent announcements to include in the report.
const RECENT_ANNOUNCEMENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsReport {
    pub total_subscribers: usize,
    pub subscribed: usize,
    pub unsubscribed: usize,
    pub announced: usize,
    pub recent_announcements: Vec<AnnouncementRecord>,
    /// `None` when the catalog fetch failed
    pub currently_free: Option<usize>,
}

/// Collect a report. Storage errors are returned; a catalog failure is not,
/// since the report is still useful without it.
pub async fn collect(
    directory: &dyn SubscriberDirectory,
    ledger: &AnnouncementLedger,
    catalog: &dyn CatalogSource,
) -> Result<DiagnosticsReport, AppError> {
    let total_subscribers = directory.count_all().await?;
    let subscribed = directory.list_subscribed().await?.len();
    let history = ledger.history().await?;

    let currently_free = match catalog.fetch_free_now().await {
        Ok(free) => Some(free.len()),
        Err(e) => {
            tracing::warn!(error = %e, "Diagnostics: catalog fetch failed");
            None
        }
    };

    Ok(DiagnosticsReport {
        total_subscribers,
        subscribed,
        unsubscribed: total_subscribers.saturating_sub(subscribed),
        announced: history.len(),
        recent_announcements: history.into_iter().take(RECENT_ANNOUNCEMENTS).collect(),
        currently_free,
    })
}

impl DiagnosticsReport {
    pub fn log(&self) {
        tracing::info!(
            total_subscribers = self.total_subscribers,
            subscribed = self.subscribed,
            unsubscribed = self.unsubscribed,
            announced = self.announced,
            currently_free = ?self.currently_free,
            recent = ?self
                .recent_announcements
                .iter()
                .map(|r| r.title.as_str())
                .collect::<Vec<_>>(),
            "Diagnostics"
        );
    }
}
