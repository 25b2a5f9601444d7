use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;
use crate::error::AppError;
use crate::format::{format_balance, FormatOptions};

/// Treasury figures returned by the governance API after a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryStats {
    pub network: String,
    /// Spendable balance in planck, as a decimal string.
    pub available_balance: String,
}

impl TreasuryStats {
    pub fn available_planck(&self) -> Option<u128> {
        self.available_balance.parse().ok()
    }
}

/// Trait for the upstream treasury-stats refresh call, enabling mock testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TreasuryStatsClient: Send + Sync {
    /// Ask the governance API to recompute and store one network's stats.
    async fn refresh(&self, network: &str) -> Result<TreasuryStats, AppError>;
}

/// HTTP implementation against the governance REST API.
pub struct HttpTreasuryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTreasuryClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn refresh_url(&self) -> String {
        format!("{}/api/v2/treasury/refresh-stats", self.base_url)
    }
}

#[async_trait]
impl TreasuryStatsClient for HttpTreasuryClient {
    async fn refresh(&self, network: &str) -> Result<TreasuryStats, AppError> {
        let response = self
            .http
            .post(self.refresh_url())
            .header("x-network", network)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Treasury refresh request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Treasury refresh rejected: {e}")))?;

        response
            .json::<TreasuryStats>()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid treasury stats response: {e}")))
    }
}

/// Outcome of refreshing one network.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub network: String,
    pub result: Result<TreasuryStats, AppError>,
}

/// Spendable balance of `stats` in compact display form, e.g. `1.23M DOT`.
pub fn available_display(stats: &TreasuryStats, network: &NetworkConfig) -> Option<String> {
    let balance_format = FormatOptions {
        with_unit: true,
        compact_notation: true,
        ..FormatOptions::default()
    };

    stats.available_planck().map(|planck| {
        format_balance(
            planck,
            network.token_decimals,
            &network.token_symbol,
            &balance_format,
        )
    })
}

/// Refresh treasury stats of all networks concurrently.
///
/// Each network is independent: a failure is logged and reported, never
/// propagated to the others.
pub async fn refresh_all(
    client: &dyn TreasuryStatsClient,
    networks: &[NetworkConfig],
) -> Vec<RefreshOutcome> {
    let calls = networks.iter().map(|network| async move {
        let result = client.refresh(&network.name).await;
        match &result {
            Ok(stats) => match available_display(stats, network) {
                Some(available) => tracing::info!(
                    "Refreshed treasury stats of {}: {available} available",
                    network.name
                ),
                None => tracing::info!("Refreshed treasury stats of {}", network.name),
            },
            Err(e) => tracing::warn!("Treasury refresh of {} failed: {e}", network.name),
        }
        RefreshOutcome {
            network: network.name.clone(),
            result,
        }
    });

    futures::future::join_all(calls).await
}
