//! Client for the external proving service.

use alloy::primitives::Bytes;
use async_trait::async_trait;
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    constants::MAX_RPC_REQUEST_SIZE,
    error::ProverError,
    types::{ProofRequest, ProofResult, ProverFailure},
};

/// Generates proofs for proof requests.
#[async_trait]
pub trait ProvingClient: Send + Sync {
    /// Proves `request`.
    ///
    /// A structured refusal from the prover is `Ok(ProofResult::Failed)`;
    /// `Err` means the prover could not be reached or answered nonsense.
    async fn prove(&self, request: &ProofRequest) -> Result<ProofResult, ProverError>;
}

/// Wire response of `prover_prove`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProveResponse {
    /// Proof bytes on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Bytes>,
    /// Structured error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ProverFailure>,
}

impl TryFrom<ProveResponse> for ProofResult {
    type Error = ProverError;

    fn try_from(response: ProveResponse) -> Result<Self, Self::Error> {
        match (response.proof, response.err) {
            (_, Some(failure)) => Ok(Self::Failed(failure)),
            (Some(proof), None) => Ok(Self::Proof(proof)),
            (None, None) => {
                Err(ProverError::InvalidResponse("response has neither proof nor err".into()))
            }
        }
    }
}

/// JSON-RPC client for the proving service.
#[derive(Debug, Clone)]
pub struct ProverRpcClient {
    inner: HttpClient,
}

impl ProverRpcClient {
    /// Creates a new prover client for the service at `url`.
    pub fn new(url: &Url) -> Result<Self, ProverError> {
        let inner = HttpClientBuilder::default()
            .max_request_size(MAX_RPC_REQUEST_SIZE)
            .max_response_size(MAX_RPC_REQUEST_SIZE)
            .build(url.as_str())
            .map_err(|e| ProverError::ClientCreation(e.to_string()))?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl ProvingClient for ProverRpcClient {
    async fn prove(&self, request: &ProofRequest) -> Result<ProofResult, ProverError> {
        let response: ProveResponse =
            self.inner.request("prover_prove", rpc_params![request]).await?;
        response.try_into()
    }
}
