use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::models::ReservationRecord;

/// Off-chain reservation persistence consumed by the provisioner.
///
/// The store upserts by order id, so re-submitting the same record after a
/// failure writes one logical row, never a duplicate.
#[async_trait::async_trait]
pub trait ReservationStore: Send + Sync {
    /// Returns whether the record is durably persisted.
    async fn upsert_reservation(&self, record: &ReservationRecord) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    persisted: bool,
}

/// Reservation store client backed by the HTTP persistence service
pub struct HttpReservationStore {
    config: Config,
    http_client: Client,
}

impl HttpReservationStore {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait::async_trait]
impl ReservationStore for HttpReservationStore {
    async fn upsert_reservation(&self, record: &ReservationRecord) -> Result<bool> {
        let url = format!(
            "{}/reservations/{}",
            self.config.store_url, record.order_id
        );

        let mut request = self.http_client.put(&url).json(record);
        if let Some(api_key) = &self.config.store_api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .context("Failed to send reservation upsert to store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Reservation store upsert failed (status {}): {}",
                status,
                body
            ));
        }

        let upsert: UpsertResponse = response
            .json()
            .await
            .context("Failed to parse reservation store response")?;

        Ok(upsert.persisted)
    }
}
