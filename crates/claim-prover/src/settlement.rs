//! Settlement sequence: relay the proof, request settlement, await finality.

use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, Bytes, U256};
use backon::Retryable;
use tracing::{info, warn};

use crate::{
    attestation::{AttestationClient, AttestationSubmission, wait_for_finality},
    config::RetryConfig,
    contracts::SettlementContract,
    error::{AttestationError, PipelineError, PipelineResult},
    types::{ProofRequest, SettlementReceipt},
};

/// Chain and timing parameters of the settlement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlerConfig {
    /// Chain the storage facts were read from.
    pub src_chain_id: u64,
    /// Chain the proof is verified on.
    pub dst_chain_id: u64,
    /// Application contract that consumes the verified result.
    pub destination_contract: Address,
    /// Interval between attestation status polls.
    pub poll_interval: Duration,
    /// Upper bound on the attestation wait, if any.
    pub attestation_timeout: Option<Duration>,
    /// Retries of the finality wait after transient polling failures.
    pub finality_retry: RetryConfig,
}

/// Drives a generated proof to settlement.
#[derive(Debug)]
pub struct Settler<A, S> {
    attestation: Arc<A>,
    contract: Arc<S>,
    config: SettlerConfig,
}

impl<A, S> Settler<A, S>
where
    A: AttestationClient,
    S: SettlementContract,
{
    /// Creates a new settler.
    pub const fn new(attestation: Arc<A>, contract: Arc<S>, config: SettlerConfig) -> Self {
        Self { attestation, contract, config }
    }

    /// Settles `proof` for `request`.
    ///
    /// Submits the proof to the attestation network, sends the settlement
    /// request transaction for the returned query key and waits for it to be
    /// included, then waits for the query to finalize on the destination chain.
    ///
    /// Once the request is included, failures are reported as
    /// [`PipelineError::Unfinalized`] so the claim is never settled twice.
    pub async fn settle(
        &self,
        request: &ProofRequest,
        proof: Bytes,
    ) -> PipelineResult<SettlementReceipt> {
        let submission = AttestationSubmission {
            request: request.clone(),
            proof,
            src_chain_id: self.config.src_chain_id,
            dst_chain_id: self.config.dst_chain_id,
            fee: U256::ZERO,
            callback: None,
            destination_contract: self.config.destination_contract,
        };

        let query_key = self.attestation.submit(&submission).await?;
        info!(query_hash = %query_key.query_hash, nonce = query_key.nonce, "Proof submitted for attestation");

        let tx_hash = self.contract.send_request(&query_key).await?;
        let receipt = SettlementReceipt { tx_hash, query_key };

        // The request is paid for: only the wait is repeated from here on.
        (|| async {
            wait_for_finality(
                self.attestation.as_ref(),
                &query_key,
                self.config.dst_chain_id,
                self.config.poll_interval,
                self.config.attestation_timeout,
            )
            .await
        })
        .retry(self.config.finality_retry.to_backoff_builder())
        .when(AttestationError::is_retryable)
        .notify(|err, dur| {
            warn!(
                error = %err,
                delay = ?dur,
                query_hash = %query_key.query_hash,
                "Retrying finality wait"
            );
        })
        .await
        .map_err(|source| PipelineError::Unfinalized { receipt, source })?;
        info!(%tx_hash, query_hash = %query_key.query_hash, "Attestation finalized");

        Ok(receipt)
    }
}
