use anyhow::{Context, Result, anyhow};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::OrderId;

/// On-chain delivery ledger operations consumed by the provisioner.
///
/// `create_delivery` returns the minted order id directly; digging it out of
/// the transaction receipt is the implementation's concern, not the caller's.
#[async_trait::async_trait]
pub trait DeliveryLedger: Send + Sync {
    async fn create_delivery(
        &self,
        truck_id: &str,
        origin: &str,
        destination: &str,
        eta: i64,
    ) -> Result<OrderId>;

    async fn assign_carrier(&self, order_id: &OrderId, payee: &str) -> Result<()>;
}

/// The gateway accepted the create transaction but its receipt carried no
/// DeliveryCreated event
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("no DeliveryCreated event in the create receipt")]
pub struct MissingOrderId;

#[derive(Serialize)]
struct CreateDeliveryBody<'a> {
    truck_id: &'a str,
    origin: &'a str,
    destination: &'a str,
    eta: i64,
}

#[derive(Serialize)]
struct AssignCarrierBody<'a> {
    payee: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateReceipt {
    #[serde(default)]
    events: Vec<ReceiptEvent>,
}

#[derive(Debug, Deserialize)]
struct ReceiptEvent {
    event: String,
    #[serde(default)]
    order_id: Option<String>,
}

/// Ledger contract client backed by the HTTP chain gateway
pub struct ChainLedgerClient {
    config: Config,
    http_client: HttpClient,
}

impl ChainLedgerClient {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = HttpClient::new();

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait::async_trait]
impl DeliveryLedger for ChainLedgerClient {
    async fn create_delivery(
        &self,
        truck_id: &str,
        origin: &str,
        destination: &str,
        eta: i64,
    ) -> Result<OrderId> {
        let url = format!("{}/deliveries", self.config.chain_gateway_url);

        let mut request = self.http_client.post(&url).json(&CreateDeliveryBody {
            truck_id,
            origin,
            destination,
            eta,
        });
        if let Some(api_key) = &self.config.chain_api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to submit delivery create to chain gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chain gateway delivery create failed (status {}): {}",
                status,
                body
            ));
        }

        let receipt: CreateReceipt = response
            .json()
            .await
            .context("Failed to parse delivery create receipt")?;

        let order_id = receipt
            .events
            .iter()
            .find(|event| event.event == "DeliveryCreated")
            .and_then(|event| event.order_id.clone())
            .ok_or(MissingOrderId)?;

        Ok(OrderId(order_id))
    }

    async fn assign_carrier(&self, order_id: &OrderId, payee: &str) -> Result<()> {
        let url = format!(
            "{}/deliveries/{}/carrier",
            self.config.chain_gateway_url, order_id
        );

        let mut request = self
            .http_client
            .post(&url)
            .json(&AssignCarrierBody { payee });
        if let Some(api_key) = &self.config.chain_api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to submit carrier assignment to chain gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chain gateway carrier assignment failed (status {}): {}",
                status,
                body
            ));
        }

        Ok(())
    }
}
