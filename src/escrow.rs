use anyhow::{Context, Result, anyhow};
use reqwest::Client as HttpClient;
use serde::Serialize;

use crate::config::Config;
use crate::models::OrderId;

/// Escrow contract operations consumed by the provisioner
#[async_trait::async_trait]
pub trait EscrowFunder: Send + Sync {
    /// Locks `amount` of `currency` against the order for the payee.
    async fn fund_escrow(
        &self,
        order_id: &OrderId,
        payee: &str,
        amount: &str,
        currency: &str,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct FundEscrowBody<'a> {
    payee: &'a str,
    amount: &'a str,
    currency: &'a str,
}

/// Escrow contract client backed by the HTTP chain gateway
pub struct ChainEscrowClient {
    config: Config,
    http_client: HttpClient,
}

impl ChainEscrowClient {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = HttpClient::new();

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait::async_trait]
impl EscrowFunder for ChainEscrowClient {
    async fn fund_escrow(
        &self,
        order_id: &OrderId,
        payee: &str,
        amount: &str,
        currency: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/escrow/{}/fund",
            self.config.chain_gateway_url, order_id
        );

        let mut request = self.http_client.post(&url).json(&FundEscrowBody {
            payee,
            amount,
            currency,
        });
        if let Some(api_key) = &self.config.chain_api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to submit escrow funding to chain gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chain gateway escrow funding failed (status {}): {}",
                status,
                body
            ));
        }

        Ok(())
    }
}
