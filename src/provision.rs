use anyhow::anyhow;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{CheckpointFailure, ProvisionError, Stage};
use crate::escrow::EscrowFunder;
use crate::geo::encode_checkpoint;
use crate::ledger::{DeliveryLedger, MissingOrderId};
use crate::models::{
    OrderId, ProvisioningRequest, ReservationRecord, ReservationStatus, TruckCheckpoints,
};
use crate::proof::DeliveryProof;
use crate::store::ReservationStore;

/// Outcome of one provisioning attempt.
///
/// The flags are the authoritative record of how far the attempt progressed;
/// on failure they tell the caller exactly what already exists externally so
/// remediation never double-submits an on-chain step.
#[derive(Debug, Default)]
pub struct ProvisioningResult {
    pub order_id: Option<OrderId>,
    pub created: bool,
    pub carrier_assigned: bool,
    pub escrow_funded: bool,
    pub proof_initialized: bool,
    pub checkpoints_registered: bool,
    pub persisted: bool,
    /// A call timed out while on-chain state was in flight; the remote
    /// operation may still have completed.
    pub ambiguous_outcome: bool,
    pub cancelled: bool,
    pub error: Option<ProvisionError>,
}

impl ProvisioningResult {
    pub fn is_complete(&self) -> bool {
        self.created
            && self.carrier_assigned
            && self.escrow_funded
            && self.proof_initialized
            && self.checkpoints_registered
            && self.persisted
    }

    /// Stage of the first fatal error, if the attempt failed.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.error.as_ref().map(|error| error.stage())
    }

    /// Whether any on-chain state already exists for this attempt.
    pub fn chain_state_exists(&self) -> bool {
        self.created
    }

    /// Operator-facing summary naming the failed stage and whether on-chain
    /// state already exists.
    pub fn summary(&self) -> String {
        if self.is_complete() {
            return match &self.order_id {
                Some(order_id) => format!("provisioning completed for order {}", order_id),
                None => "provisioning completed".to_string(),
            };
        }

        let mut message = match &self.error {
            Some(error) => format!("provisioning failed at stage {}: {}", error.stage(), error),
            None if self.cancelled => "provisioning cancelled before the next step".to_string(),
            None => "provisioning incomplete".to_string(),
        };

        if self.chain_state_exists() {
            match &self.order_id {
                Some(order_id) => message.push_str(&format!(
                    "; on-chain state exists for order {}, do not resubmit the create",
                    order_id
                )),
                None => message.push_str("; on-chain state exists, do not resubmit the create"),
            }
        } else {
            message.push_str("; no on-chain state was created");
        }

        if self.ambiguous_outcome {
            message.push_str("; outcome ambiguous, the timed-out call may still complete on chain");
        }

        if self
            .error
            .as_ref()
            .is_some_and(|error| error.is_retryable())
        {
            message.push_str("; safe to retry persistence alone");
        }

        message
    }
}

/// Cooperative cancellation flag checked between provisioning steps.
///
/// A submitted chain transaction cannot be recalled, so cancelling never
/// interrupts an in-flight call; it only suppresses the next not-yet-started
/// step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

enum CallFailure {
    TimedOut(Duration),
    Failed(anyhow::Error),
}

impl CallFailure {
    fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    fn into_error(self) -> anyhow::Error {
        match self {
            Self::TimedOut(timeout) => anyhow!("call timed out after {:?}", timeout),
            Self::Failed(error) => error,
        }
    }
}

/// Sequences delivery provisioning across the ledger, escrow, and proof
/// contracts plus the off-chain reservation store.
///
/// Every chain write is irreversible and has no compensating transaction
/// available at this layer, so there is no automatic rollback and no
/// automatic retry of an on-chain step. Stateless between attempts; callers
/// needing per-truck mutual exclusion must serialize attempts themselves.
pub struct Provisioner {
    ledger: Arc<dyn DeliveryLedger>,
    escrow: Arc<dyn EscrowFunder>,
    proof: Arc<dyn DeliveryProof>,
    store: Arc<dyn ReservationStore>,
    currency: String,
    call_timeout: Duration,
}

impl Provisioner {
    pub fn new(
        ledger: Arc<dyn DeliveryLedger>,
        escrow: Arc<dyn EscrowFunder>,
        proof: Arc<dyn DeliveryProof>,
        store: Arc<dyn ReservationStore>,
        currency: String,
        call_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            escrow,
            proof,
            store,
            currency,
            call_timeout,
        }
    }

    /// Runs one provisioning attempt to completion or first fatal error.
    pub async fn provision(&self, request: ProvisioningRequest) -> ProvisioningResult {
        self.provision_cancellable(request, &CancelToken::new())
            .await
    }

    /// Like [`Self::provision`], but stops before the next step once `cancel`
    /// fires.
    pub async fn provision_cancellable(
        &self,
        request: ProvisioningRequest,
        cancel: &CancelToken,
    ) -> ProvisioningResult {
        let mut result = ProvisioningResult::default();

        if let Err(error) = validate_request(&request) {
            result.error = Some(error);
            return result;
        }

        if check_cancelled(cancel, &mut result) {
            return result;
        }

        // Never resubmitted: a duplicate order cannot be unmade.
        let order_id = match self
            .bounded(self.ledger.create_delivery(
                &request.truck_id,
                &request.origin,
                &request.destination,
                request.eta,
            ))
            .await
        {
            Ok(order_id) => order_id,
            Err(failure) => {
                if matches!(&failure, CallFailure::Failed(source) if source.is::<MissingOrderId>())
                {
                    result.error = Some(ProvisionError::MissingOrderId);
                } else {
                    result.ambiguous_outcome = failure.is_timeout();
                    result.error = Some(ProvisionError::LedgerCreate {
                        source: failure.into_error(),
                    });
                }
                return result;
            }
        };

        result.created = true;
        result.order_id = Some(order_id.clone());

        if check_cancelled(cancel, &mut result) {
            return result;
        }

        if let Err(failure) = self
            .bounded(self.ledger.assign_carrier(&order_id, &request.payee))
            .await
        {
            result.ambiguous_outcome = failure.is_timeout();
            result.error = Some(ProvisionError::CarrierAssign {
                order_id: order_id.clone(),
                source: failure.into_error(),
            });
            return result;
        }

        result.carrier_assigned = true;

        if check_cancelled(cancel, &mut result) {
            return result;
        }

        // Locks real value: exactly one attempt, never auto-retried.
        if let Err(failure) = self
            .bounded(self.escrow.fund_escrow(
                &order_id,
                &request.payee,
                &request.amount,
                &self.currency,
            ))
            .await
        {
            result.ambiguous_outcome = failure.is_timeout();
            result.error = Some(ProvisionError::EscrowFund {
                order_id: order_id.clone(),
                source: failure.into_error(),
            });
            return result;
        }

        result.escrow_funded = true;

        if check_cancelled(cancel, &mut result) {
            return result;
        }

        if let Err(failure) = self.bounded(self.proof.init_proof(&order_id)).await {
            result.ambiguous_outcome = failure.is_timeout();
            result.error = Some(ProvisionError::ProofInit {
                order_id: order_id.clone(),
                source: failure.into_error(),
            });
            return result;
        }

        result.proof_initialized = true;

        if check_cancelled(cancel, &mut result) {
            return result;
        }

        let failures = self
            .register_all_checkpoints(&order_id, &request.checkpoints)
            .await;

        if failures.is_empty() {
            result.checkpoints_registered = true;
        } else {
            result.error = Some(ProvisionError::Checkpoint {
                order_id: order_id.clone(),
                failures,
            });
            return result;
        }

        if check_cancelled(cancel, &mut result) {
            return result;
        }

        match self.persist_reservation(&request, &order_id).await {
            Ok(()) => result.persisted = true,
            Err(error) => result.error = Some(error),
        }

        result
    }

    /// Writes the durable reservation record with status `Pending`.
    ///
    /// Public so the caller can re-invoke persistence alone after a
    /// `Persistence` failure: the store upserts by order id, so the retry is
    /// idempotent.
    pub async fn persist_reservation(
        &self,
        request: &ProvisioningRequest,
        order_id: &OrderId,
    ) -> Result<(), ProvisionError> {
        let record = ReservationRecord {
            order_id: order_id.clone(),
            request: request.clone(),
            status: ReservationStatus::Pending,
            recorded_at: chrono::Utc::now().timestamp(),
        };

        let persisted = self
            .bounded(self.store.upsert_reservation(&record))
            .await
            .map_err(|failure| ProvisionError::Persistence {
                order_id: order_id.clone(),
                source: failure.into_error(),
            })?;

        if !persisted {
            return Err(ProvisionError::Persistence {
                order_id: order_id.clone(),
                source: anyhow!("store reported the reservation was not persisted"),
            });
        }

        Ok(())
    }

    /// Per-truck registrations run concurrently and all are awaited before
    /// persistence; every failure is collected, not just the first.
    async fn register_all_checkpoints(
        &self,
        order_id: &OrderId,
        trucks: &[TruckCheckpoints],
    ) -> Vec<CheckpointFailure> {
        let outcomes = join_all(
            trucks
                .iter()
                .map(|truck| self.register_truck(order_id, truck)),
        )
        .await;

        outcomes
            .into_iter()
            .filter_map(|outcome| outcome.err())
            .collect()
    }

    async fn register_truck(
        &self,
        order_id: &OrderId,
        truck: &TruckCheckpoints,
    ) -> Result<(), CheckpointFailure> {
        if truck.checkpoints.is_empty() {
            return Ok(());
        }

        let mut lat_e6 = Vec::with_capacity(truck.checkpoints.len());
        let mut lon_e6 = Vec::with_capacity(truck.checkpoints.len());
        let mut planned_time_sec = Vec::with_capacity(truck.checkpoints.len());

        // Encoding failures reject the truck before its network call
        for checkpoint in &truck.checkpoints {
            let encoded = encode_checkpoint(checkpoint).map_err(|error| CheckpointFailure {
                truck_id: truck.truck_id.clone(),
                reason: error.to_string(),
            })?;

            lat_e6.push(encoded.lat_e6);
            lon_e6.push(encoded.lon_e6);
            planned_time_sec.push(encoded.planned_time_sec);
        }

        self.bounded(self.proof.register_checkpoints(
            order_id,
            &lat_e6,
            &lon_e6,
            &planned_time_sec,
        ))
        .await
        .map_err(|failure| CheckpointFailure {
            truck_id: truck.truck_id.clone(),
            reason: failure.into_error().to_string(),
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, CallFailure> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(CallFailure::Failed(error)),
            Err(_) => Err(CallFailure::TimedOut(self.call_timeout)),
        }
    }
}

fn check_cancelled(cancel: &CancelToken, result: &mut ProvisioningResult) -> bool {
    if cancel.is_cancelled() {
        result.cancelled = true;
        true
    } else {
        false
    }
}

fn validate_request(request: &ProvisioningRequest) -> Result<(), ProvisionError> {
    if request.truck_id.trim().is_empty() {
        return Err(invalid("truck id cannot be empty"));
    }

    if request.origin.trim().is_empty() {
        return Err(invalid("origin cannot be empty"));
    }

    if request.destination.trim().is_empty() {
        return Err(invalid("destination cannot be empty"));
    }

    if request.eta < 0 {
        return Err(invalid(format!("eta {} cannot be negative", request.eta)));
    }

    if !is_valid_address(&request.payee) {
        return Err(invalid(format!(
            "payee {} is not a valid chain address",
            request.payee
        )));
    }

    match request.amount.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => {}
        _ => {
            return Err(invalid(format!(
                "amount {:?} must parse as a positive number",
                request.amount
            )));
        }
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidInput {
        message: message.into(),
    }
}

/// 0x-prefixed 20-byte hex account address
fn is_valid_address(address: &str) -> bool {
    let Some(hex_part) = address.strip_prefix("0x") else {
        return false;
    };

    matches!(hex::decode(hex_part), Ok(bytes) if bytes.len() == 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_addresses() {
        assert!(is_valid_address(
            "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd"
        ));
        assert!(is_valid_address(
            "0x0000000000000000000000000000000000000000"
        ));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("abcdefabcdefabcdefabcdefabcdefabcdefabcd"));
        assert!(!is_valid_address("0xabc"));
        assert!(!is_valid_address(
            "0xabcdefabcdefabcdefabcdefabcdefabcdefabcdef"
        ));
        assert!(!is_valid_address(
            "0xzzcdefabcdefabcdefabcdefabcdefabcdefabcd"
        ));
    }

    #[test]
    fn validates_eta_and_amount() {
        let mut request = ProvisioningRequest {
            truck_id: "T1".to_string(),
            origin: "A".to_string(),
            destination: "B".to_string(),
            eta: 1_700_000_000,
            payee: "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd".to_string(),
            amount: "1.5".to_string(),
            checkpoints: Vec::new(),
        };

        assert!(validate_request(&request).is_ok());

        request.eta = -1;
        assert!(validate_request(&request).is_err());
        request.eta = 0;
        assert!(validate_request(&request).is_ok());

        request.amount = "0".to_string();
        assert!(validate_request(&request).is_err());
        request.amount = "-2".to_string();
        assert!(validate_request(&request).is_err());
        request.amount = "abc".to_string();
        assert!(validate_request(&request).is_err());
        request.amount = "NaN".to_string();
        assert!(validate_request(&request).is_err());
    }
}
