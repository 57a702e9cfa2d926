//! Notification pipeline: one fetch → filter → record → dispatch cycle.
//!
//! 1. Fetch the promotions that are free right now
//! 2. Drop the ones the ledger has already seen
//! 3. Record every new promotion in the ledger
//! 4. Broadcast the recorded promotions to the live subscriber list
//!
//! Recording happens before dispatch. A promotion is therefore announced at most
//! once, even if delivery fails or the process dies mid-broadcast; the price is
//! that such a promotion is never re-sent.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use lootwatch_catalog::fetcher::CatalogSource;
use lootwatch_common::types::FreePromotion;
use lootwatch_notifier::dispatcher::{BroadcastReport, Dispatcher};

use crate::ledger::AnnouncementLedger;
use crate::subscribers::SubscriberDirectory;

/// Stage of a running cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Fetching,
    Filtering,
    Recording,
    Dispatching,
    Idle,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleState::Fetching => write!(f, "fetching"),
            CycleState::Filtering => write!(f, "filtering"),
            CycleState::Recording => write!(f, "recording"),
            CycleState::Dispatching => write!(f, "dispatching"),
            CycleState::Idle => write!(f, "idle"),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// The fetch failed; nothing else ran
    pub fetch_failed: bool,
    /// Free promotions returned by the catalog
    pub fetched: usize,
    /// Promotions skipped because the ledger already had them
    pub already_announced: usize,
    /// Promotions newly recorded in this cycle, in catalog order
    pub announced: Vec<FreePromotion>,
    /// Promotions skipped because a ledger read or write failed
    pub ledger_failures: usize,
    /// `None` when nothing was dispatched
    pub broadcast: Option<BroadcastReport>,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            fetch_failed: false,
            fetched: 0,
            already_announced: 0,
            announced: Vec::new(),
            ledger_failures: 0,
            broadcast: None,
        }
    }
}

pub struct NotificationPipeline {
    catalog: Arc<dyn CatalogSource>,
    ledger: AnnouncementLedger,
    directory: Arc<dyn SubscriberDirectory>,
    dispatcher: Dispatcher,
}

impl NotificationPipeline {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        ledger: AnnouncementLedger,
        directory: Arc<dyn SubscriberDirectory>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            catalog,
            ledger,
            directory,
            dispatcher,
        }
    }

    /// Run one full cycle. Never fails: every error is logged and reflected in
    /// the report, and the cycle always ends in `Idle`.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", cycle_id = %cycle_id);

        async move {
            let mut report = CycleReport::new(cycle_id);
            self.execute(&mut report).await;
            transition(CycleState::Idle);

            tracing::info!(
                fetched = report.fetched,
                already_announced = report.already_announced,
                announced = report.announced.len(),
                ledger_failures = report.ledger_failures,
                delivered = report.broadcast.as_ref().map(|b| b.delivered()).unwrap_or(0),
                failed = report.broadcast.as_ref().map(|b| b.failed()).unwrap_or(0),
                "Cycle finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, report: &mut CycleReport) {
        transition(CycleState::Fetching);
        let promotions = match self.catalog.fetch_free_now().await {
            Ok(promotions) => promotions,
            Err(e) => {
                tracing::warn!(error = %e, "Catalog fetch failed, ending cycle");
                report.fetch_failed = true;
                return;
            }
        };
        report.fetched = promotions.len();

        transition(CycleState::Filtering);
        let fresh = self.filter_new(promotions, report).await;

        transition(CycleState::Recording);
        let recorded = self.record_all(fresh, report).await;

        if recorded.is_empty() {
            tracing::info!("No new free promotions this cycle");
            return;
        }

        transition(CycleState::Dispatching);
        tracing::info!(count = recorded.len(), "New free promotions found");

        match self.directory.list_subscribed().await {
            Ok(recipients) => {
                let broadcast = self.dispatcher.broadcast(&recorded, &recipients).await;
                report.broadcast = Some(broadcast);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    promotions = recorded.len(),
                    "Failed to load subscribers; recorded promotions will not be announced"
                );
            }
        }
        report.announced = recorded;
    }

    /// Keep only promotions the ledger has never seen.
    async fn filter_new(
        &self,
        promotions: Vec<FreePromotion>,
        report: &mut CycleReport,
    ) -> Vec<FreePromotion> {
        let mut fresh = Vec::with_capacity(promotions.len());

        for promo in promotions {
            match self.ledger.is_announced(&promo.id).await {
                Ok(true) => {
                    tracing::debug!(promotion_id = %promo.id, "Already announced, skipping");
                    report.already_announced += 1;
                }
                Ok(false) => fresh.push(promo),
                Err(e) => {
                    tracing::error!(
                        promotion_id = %promo.id,
                        title = %promo.title,
                        error = %e,
                        "Ledger lookup failed, skipping promotion this cycle"
                    );
                    report.ledger_failures += 1;
                }
            }
        }

        fresh
    }

    /// Record each promotion; only successfully recorded ones are dispatched.
    async fn record_all(
        &self,
        promotions: Vec<FreePromotion>,
        report: &mut CycleReport,
    ) -> Vec<FreePromotion> {
        let mut recorded = Vec::with_capacity(promotions.len());

        for promo in promotions {
            match self.ledger.record_announced(&promo).await {
                Ok(_) => recorded.push(promo),
                Err(e) => {
                    tracing::error!(
                        promotion_id = %promo.id,
                        title = %promo.title,
                        error = %e,
                        "Failed to record promotion, not announcing it"
                    );
                    report.ledger_failures += 1;
                }
            }
        }

        recorded
    }
}

fn transition(state: CycleState) {
    tracing::debug!(state = %state, "Cycle state");
}
