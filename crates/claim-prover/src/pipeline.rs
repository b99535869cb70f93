//! The claim pipeline: claim event in, settlement receipt out.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    attestation::AttestationClient,
    builder::ProofRequestBuilder,
    contracts::SettlementContract,
    error::{PipelineError, PipelineResult},
    metrics::PROOF_DURATION_SECONDS,
    prover::ProvingClient,
    rpc::ChainClient,
    settlement::Settler,
    types::{ClaimEvent, ProofRequest, ProofResult, SettlementReceipt},
};

/// Handles one decoded claim event.
#[async_trait]
pub trait ClaimHandler: Send + Sync {
    /// Runs the claim to settlement.
    async fn handle(&self, event: &ClaimEvent) -> PipelineResult<SettlementReceipt>;
}

/// Checks that `request` is safe to prove.
///
/// Both entries must share a non-zero block and carry a storage value. A zero
/// value is a real balance and is accepted.
pub fn validate_request(request: &ProofRequest) -> PipelineResult<()> {
    match request.block_number() {
        Some(0) | None => return Err(PipelineError::BlockUnavailable),
        Some(_) => {}
    }
    if let Some(index) = request.first_missing_value() {
        return Err(PipelineError::MissingStorage { index });
    }
    Ok(())
}

/// Builds, proves and settles claims.
#[derive(Debug)]
pub struct ClaimPipeline<C, P, A, S> {
    builder: ProofRequestBuilder<C>,
    prover: Arc<P>,
    settler: Settler<A, S>,
}

impl<C, P, A, S> ClaimPipeline<C, P, A, S>
where
    C: ChainClient,
    P: ProvingClient,
    A: AttestationClient,
    S: SettlementContract,
{
    /// Creates a new pipeline.
    pub const fn new(
        builder: ProofRequestBuilder<C>,
        prover: Arc<P>,
        settler: Settler<A, S>,
    ) -> Self {
        Self { builder, prover, settler }
    }
}

#[async_trait]
impl<C, P, A, S> ClaimHandler for ClaimPipeline<C, P, A, S>
where
    C: ChainClient,
    P: ProvingClient,
    A: AttestationClient,
    S: SettlementContract,
{
    async fn handle(&self, event: &ClaimEvent) -> PipelineResult<SettlementReceipt> {
        let request = self.builder.build(event).await;
        validate_request(&request)?;

        let started = Instant::now();
        let result = self.prover.prove(&request).await;
        metrics::histogram!(PROOF_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let proof = match result? {
            ProofResult::Proof(proof) => proof,
            ProofResult::Failed(failure) => {
                warn!(code = %failure.code, message = %failure.message, "Prover rejected proof request");
                return Err(PipelineError::ProverRejected(failure));
            }
        };
        info!(proof_len = proof.len(), "Proof generated");

        self.settler.settle(&request, proof).await
    }
}
