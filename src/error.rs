use crate::models::OrderId;

/// Provisioning stages in execution order, as reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    LedgerCreated,
    CarrierAssigned,
    EscrowFunded,
    ProofInitialized,
    CheckpointsRegistered,
    Persisted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "Validate",
            Stage::LedgerCreated => "LedgerCreated",
            Stage::CarrierAssigned => "CarrierAssigned",
            Stage::EscrowFunded => "EscrowFunded",
            Stage::ProofInitialized => "ProofInitialized",
            Stage::CheckpointsRegistered => "CheckpointsRegistered",
            Stage::Persisted => "Persisted",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One truck's failed checkpoint registration
#[derive(Debug)]
pub struct CheckpointFailure {
    pub truck_id: String,
    pub reason: String,
}

/// First fatal error of a provisioning attempt.
///
/// Collaborator causes are wrapped, never swallowed; the orchestrator hands
/// the error back inside the attempt's result instead of throwing past it.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Request rejected before any collaborator call.
    #[error("invalid request: {message}")]
    InvalidInput { message: String },

    /// The ledger create call failed; no order exists on chain.
    #[error("ledger create failed: {source}")]
    LedgerCreate {
        #[source]
        source: anyhow::Error,
    },

    /// The create call went through but the ledger returned no order id.
    /// Distinct from a network failure: the delivery may exist on chain.
    #[error("delivery created but the ledger returned no order id")]
    MissingOrderId,

    #[error("carrier assignment failed for order {order_id}: {source}")]
    CarrierAssign {
        order_id: OrderId,
        #[source]
        source: anyhow::Error,
    },

    #[error("escrow funding failed for order {order_id}: {source}")]
    EscrowFund {
        order_id: OrderId,
        #[source]
        source: anyhow::Error,
    },

    #[error("proof initialization failed for order {order_id}: {source}")]
    ProofInit {
        order_id: OrderId,
        #[source]
        source: anyhow::Error,
    },

    /// Aggregated per-truck registration failures; trucks not listed here
    /// had their checkpoints registered.
    #[error("checkpoint registration failed for order {order_id}: {}", format_failures(.failures))]
    Checkpoint {
        order_id: OrderId,
        failures: Vec<CheckpointFailure>,
    },

    /// On-chain steps succeeded but the durable reservation record is
    /// missing. The only failure safe to retry as-is.
    #[error("reservation persistence failed for order {order_id}: {source}")]
    Persistence {
        order_id: OrderId,
        #[source]
        source: anyhow::Error,
    },
}

impl ProvisionError {
    /// Stage at which the attempt failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidInput { .. } => Stage::Validate,
            Self::LedgerCreate { .. } | Self::MissingOrderId => Stage::LedgerCreated,
            Self::CarrierAssign { .. } => Stage::CarrierAssigned,
            Self::EscrowFund { .. } => Stage::EscrowFunded,
            Self::ProofInit { .. } => Stage::ProofInitialized,
            Self::Checkpoint { .. } => Stage::CheckpointsRegistered,
            Self::Persistence { .. } => Stage::Persisted,
        }
    }

    /// Only the off-chain persistence step may be re-invoked as-is; every
    /// on-chain step risks double-submission.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

fn format_failures(failures: &[CheckpointFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{} ({})", failure.truck_id, failure.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
