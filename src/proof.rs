use anyhow::{Context, Result, anyhow};
use reqwest::Client as HttpClient;
use serde::Serialize;

use crate::config::Config;
use crate::models::OrderId;

/// Proof-of-delivery contract operations consumed by the provisioner
#[async_trait::async_trait]
pub trait DeliveryProof: Send + Sync {
    async fn init_proof(&self, order_id: &OrderId) -> Result<()>;

    /// Registers one truck's checkpoint batch. The three slices are parallel
    /// arrays and must be the same length.
    async fn register_checkpoints(
        &self,
        order_id: &OrderId,
        lat_e6: &[i64],
        lon_e6: &[i64],
        planned_time_sec: &[i64],
    ) -> Result<()>;
}

#[derive(Serialize)]
struct RegisterCheckpointsBody<'a> {
    lat_e6: &'a [i64],
    lon_e6: &'a [i64],
    planned_time_sec: &'a [i64],
}

/// Proof contract client backed by the HTTP chain gateway
pub struct ChainProofClient {
    config: Config,
    http_client: HttpClient,
}

impl ChainProofClient {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = HttpClient::new();

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait::async_trait]
impl DeliveryProof for ChainProofClient {
    async fn init_proof(&self, order_id: &OrderId) -> Result<()> {
        let url = format!(
            "{}/proof/{}/init",
            self.config.chain_gateway_url, order_id
        );

        let mut request = self.http_client.post(&url);
        if let Some(api_key) = &self.config.chain_api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to submit proof initialization to chain gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chain gateway proof initialization failed (status {}): {}",
                status,
                body
            ));
        }

        Ok(())
    }

    async fn register_checkpoints(
        &self,
        order_id: &OrderId,
        lat_e6: &[i64],
        lon_e6: &[i64],
        planned_time_sec: &[i64],
    ) -> Result<()> {
        let url = format!(
            "{}/proof/{}/checkpoints",
            self.config.chain_gateway_url, order_id
        );

        let mut request = self.http_client.post(&url).json(&RegisterCheckpointsBody {
            lat_e6,
            lon_e6,
            planned_time_sec,
        });
        if let Some(api_key) = &self.config.chain_api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to submit checkpoint registration to chain gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chain gateway checkpoint registration failed (status {}): {}",
                status,
                body
            ));
        }

        Ok(())
    }
}
