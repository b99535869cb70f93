//! Client for the attestation network that relays proofs to the destination chain.

use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::{
    constants::MAX_RPC_REQUEST_SIZE,
    error::AttestationError,
    types::{ProofRequest, QueryKey},
};

/// A generated proof handed to the attestation network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationSubmission {
    /// The request the proof was generated for.
    pub request: ProofRequest,
    /// Proof bytes.
    pub proof: Bytes,
    /// Chain the storage facts were read from.
    pub src_chain_id: u64,
    /// Chain the proof is verified on.
    pub dst_chain_id: u64,
    /// Attestation fee. Always zero for now.
    pub fee: U256,
    /// Optional callback target on the destination chain.
    pub callback: Option<Address>,
    /// Application contract that consumes the result.
    pub destination_contract: Address,
}

/// Lifecycle state of an attestation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    /// Not final yet.
    Pending,
    /// Final on the destination chain.
    Finalized,
    /// Will never finalize.
    Failed,
}

/// Wire response of `attestation_queryStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatus {
    /// Current state.
    pub status: QueryState,
    /// Failure detail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Attestation network operations.
#[async_trait]
pub trait AttestationClient: Send + Sync {
    /// Submits a proof and returns the key of the created query.
    async fn submit(&self, submission: &AttestationSubmission)
    -> Result<QueryKey, AttestationError>;

    /// Returns the current status of `key` on `chain_id`.
    async fn query_status(
        &self,
        key: &QueryKey,
        chain_id: u64,
    ) -> Result<QueryStatus, AttestationError>;
}

/// JSON-RPC client for the attestation network.
#[derive(Debug, Clone)]
pub struct AttestationRpcClient {
    inner: HttpClient,
}

impl AttestationRpcClient {
    /// Creates a new attestation client for the network gateway at `url`.
    pub fn new(url: &Url) -> Result<Self, AttestationError> {
        let inner = HttpClientBuilder::default()
            .max_request_size(MAX_RPC_REQUEST_SIZE)
            .build(url.as_str())
            .map_err(|e| AttestationError::ClientCreation(e.to_string()))?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl AttestationClient for AttestationRpcClient {
    async fn submit(
        &self,
        submission: &AttestationSubmission,
    ) -> Result<QueryKey, AttestationError> {
        self.inner.request("attestation_submit", rpc_params![submission]).await.map_err(Into::into)
    }

    async fn query_status(
        &self,
        key: &QueryKey,
        chain_id: u64,
    ) -> Result<QueryStatus, AttestationError> {
        self.inner
            .request("attestation_queryStatus", rpc_params![key, chain_id])
            .await
            .map_err(Into::into)
    }
}

/// Polls `key` on `chain_id` every `poll_interval` until it is finalized.
///
/// Fails when the network reports the query as failed, or when `timeout` is
/// set and the query is still pending once it has fully elapsed. Transport
/// errors while polling are returned as-is.
pub async fn wait_for_finality<A>(
    client: &A,
    key: &QueryKey,
    chain_id: u64,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<(), AttestationError>
where
    A: AttestationClient + ?Sized,
{
    let started = Instant::now();

    loop {
        let status = client.query_status(key, chain_id).await?;
        match status.status {
            QueryState::Finalized => return Ok(()),
            QueryState::Failed => {
                return Err(AttestationError::QueryFailed {
                    query_hash: key.query_hash,
                    reason: status.reason.unwrap_or_else(|| "unknown".into()),
                });
            }
            QueryState::Pending => {
                debug!(query_hash = %key.query_hash, nonce = key.nonce, "Attestation pending");
            }
        }

        let delay = match timeout {
            Some(timeout) => {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(AttestationError::Timeout { query_hash: key.query_hash, elapsed });
                }
                poll_interval.min(timeout - elapsed)
            }
            None => poll_interval,
        };
        tokio::time::sleep(delay).await;
    }
}
