//! Fixed-interval maintenance: treasury-stats refresh and incremental search
//! index resync, each fanned out over all configured networks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::{NetworkConfig, SchedulerConfig};
use crate::db::repository::PostRepository;
use crate::indexer;
use crate::search::client::SearchIndex;
use crate::treasury::{self, TreasuryStatsClient};

/// Everything the maintenance jobs need.
#[derive(Clone)]
pub struct MaintenanceJobs {
    pub post_repo: Arc<dyn PostRepository>,
    /// Index resync is skipped when search is not configured.
    pub search_index: Option<Arc<dyn SearchIndex>>,
    pub treasury_client: Arc<dyn TreasuryStatsClient>,
    pub networks: Vec<NetworkConfig>,
    pub max_record_bytes: usize,
    pub sync_concurrency: usize,
}

impl MaintenanceJobs {
    /// Refresh treasury stats of every network. Returns the number of failures.
    pub async fn refresh_treasury(&self) -> usize {
        treasury::refresh_all(self.treasury_client.as_ref(), &self.networks)
            .await
            .iter()
            .filter(|o| o.result.is_err())
            .count()
    }

    /// Resync posts updated since `since` on every network.
    ///
    /// Returns `true` only if every network synced without any failure.
    pub async fn resync_index(&self, since: Option<DateTime<Utc>>) -> bool {
        let Some(index) = self.search_index.as_deref() else {
            return true;
        };

        let names: Vec<String> = self.networks.iter().map(|n| n.name.clone()).collect();
        let results = indexer::sync_networks(
            self.post_repo.as_ref(),
            index,
            &names,
            since,
            self.max_record_bytes,
            self.sync_concurrency,
        )
        .await;

        let mut clean = true;
        for (network, result) in results {
            match result {
                Ok(report) => {
                    tracing::info!(
                        "Index resync of {network}: {} indexed, {} deleted, {} truncated, {} failed",
                        report.indexed,
                        report.deleted,
                        report.truncated,
                        report.failures.len()
                    );
                    clean &= report.failures.is_empty();
                }
                Err(_) => clean = false,
            }
        }
        clean
    }
}

/// Run the maintenance loop until `shutdown` turns `true` (or its sender is dropped).
///
/// Both jobs fire once immediately, then at their own interval. The index
/// resync only picks up posts updated since the start of the last clean round;
/// the first round is a full resync.
pub async fn run(jobs: MaintenanceJobs, config: SchedulerConfig, mut shutdown: watch::Receiver<bool>) {
    let mut treasury_tick =
        tokio::time::interval(Duration::from_secs(config.treasury_interval_secs.max(1)));
    let mut index_tick =
        tokio::time::interval(Duration::from_secs(config.index_interval_secs.max(1)));
    treasury_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    index_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut watermark: Option<DateTime<Utc>> = None;

    tracing::info!(
        "Scheduler started: treasury every {}s, index every {}s",
        config.treasury_interval_secs,
        config.index_interval_secs
    );

    loop {
        tokio::select! {
            _ = treasury_tick.tick() => {
                let failed = jobs.refresh_treasury().await;
                if failed > 0 {
                    tracing::warn!("Treasury refresh round finished with {failed} failed networks");
                }
            }
            _ = index_tick.tick() => {
                let started = Utc::now();
                if jobs.resync_index(watermark).await {
                    watermark = Some(started);
                } else {
                    tracing::warn!("Index resync round incomplete; next round starts from the previous watermark");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Scheduler stopping");
                    return;
                }
            }
        }
    }
}
