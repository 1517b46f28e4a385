use serde::{Deserialize, Serialize};

/// Opaque order identifier minted by the delivery ledger at creation time.
/// Correlates every later provisioning step and the persisted reservation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A planned geofence checkpoint in decimal degrees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_millis: i64,
}

/// Checkpoint list for a single truck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckCheckpoints {
    pub truck_id: String,
    pub checkpoints: Vec<Checkpoint>,
}

/// Input to one provisioning attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub truck_id: String,
    pub origin: String,
    pub destination: String,
    pub eta: i64,                 // Unix seconds
    pub payee: String,
    pub amount: String,           // decimal currency units, e.g. "1.5"
    #[serde(default)]
    pub checkpoints: Vec<TruckCheckpoints>,
}

/// Reservation lifecycle status as stored off-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    InTransit,
    Delivered,
    Cancelled,
}

/// Durable reservation record, keyed by the on-chain order id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub order_id: OrderId,
    pub request: ProvisioningRequest,
    pub status: ReservationStatus,
    pub recorded_at: i64,
}
