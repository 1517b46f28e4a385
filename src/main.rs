use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use std::time::Duration;

use delivery_provisioner::{
    config::Config,
    escrow::ChainEscrowClient,
    ledger::ChainLedgerClient,
    models::ProvisioningRequest,
    proof::ChainProofClient,
    provision::Provisioner,
    store::HttpReservationStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let request_path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("Usage: delivery-provisioner <request.json>"))?;

    let raw = std::fs::read_to_string(&request_path)
        .with_context(|| format!("Failed to read request file {}", request_path))?;
    let request: ProvisioningRequest =
        serde_json::from_str(&raw).context("Failed to parse provisioning request")?;

    let provisioner = Provisioner::new(
        Arc::new(ChainLedgerClient::new(config.clone())?),
        Arc::new(ChainEscrowClient::new(config.clone())?),
        Arc::new(ChainProofClient::new(config.clone())?),
        Arc::new(HttpReservationStore::new(config.clone())?),
        config.escrow_currency.clone(),
        Duration::from_secs(config.call_timeout_secs),
    );

    println!(
        "[{}] Provisioning delivery for truck {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        request.truck_id
    );
    println!("================================");

    let result = provisioner.provision(request).await;

    if let Some(order_id) = &result.order_id {
        println!("🔗 Order: {}", order_id);
    }
    println!("{} Ledger entry created", mark(result.created));
    println!("{} Carrier assigned", mark(result.carrier_assigned));
    println!("{} Escrow funded", mark(result.escrow_funded));
    println!("{} Proof initialized", mark(result.proof_initialized));
    println!("{} Checkpoints registered", mark(result.checkpoints_registered));
    println!("{} Reservation persisted", mark(result.persisted));
    println!("================================");
    println!("{}", result.summary());

    if !result.is_complete() {
        std::process::exit(1);
    }

    Ok(())
}

fn mark(done: bool) -> &'static str {
    if done { "✅" } else { "❌" }
}
