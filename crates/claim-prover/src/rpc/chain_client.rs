//! Chain RPC client implementation.

use std::time::Duration;

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, TxHash, U256},
    providers::{Provider, RootProvider},
    rpc::client::RpcClient,
    transports::http::{Http, reqwest::Client},
};
use async_trait::async_trait;
use backon::Retryable;
use url::Url;

use super::error::{RpcError, RpcResult};
use crate::config::RetryConfig;

/// Raw read-only chain RPC calls used to build proof inputs.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Gets the latest block number.
    async fn block_number(&self) -> RpcResult<u64>;

    /// Gets the number of the block that included `tx_hash`.
    ///
    /// Returns [`RpcError::ReceiptNotFound`] when the transaction is pending,
    /// dropped or unknown.
    async fn receipt_block_number(&self, tx_hash: TxHash) -> RpcResult<u64>;

    /// Reads the storage slot `slot` of `address` at `block_number`.
    async fn storage_at(&self, address: Address, slot: B256, block_number: u64)
    -> RpcResult<B256>;
}

/// Configuration for the chain client.
#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    /// RPC endpoint URL.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl ChainClientConfig {
    /// Creates a new chain client configuration with defaults.
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint, timeout: Duration::from_secs(30), retry_config: RetryConfig::default() }
    }

    /// Sets the request timeout.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

/// Chain client backed by an alloy HTTP provider.
pub struct RpcChainClient {
    provider: RootProvider,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("retry_config", &self.retry_config)
            .finish_non_exhaustive()
    }
}

impl RpcChainClient {
    /// Creates a new chain client from the given configuration.
    pub fn new(config: ChainClientConfig) -> RpcResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RpcError::Connection(format!("Failed to build HTTP client: {e}")))?;

        let http = Http::with_client(client, config.endpoint);
        let rpc_client = RpcClient::new(http, false);
        let provider = RootProvider::new(rpc_client);

        Ok(Self { provider, retry_config: config.retry_config })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> RpcResult<u64> {
        (|| async { self.provider.get_block_number().await.map_err(RpcError::from) })
            .retry(self.retry_config.to_backoff_builder())
            .when(|e| e.is_retryable())
            .notify(|err, dur| {
                tracing::debug!(error = %err, delay = ?dur, "Retrying ChainClient::block_number");
            })
            .await
    }

    async fn receipt_block_number(&self, tx_hash: TxHash) -> RpcResult<u64> {
        let receipt = (|| async {
            self.provider.get_transaction_receipt(tx_hash).await.map_err(RpcError::from)
        })
        .retry(self.retry_config.to_backoff_builder())
        .when(|e| e.is_retryable())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying ChainClient::receipt_block_number");
        })
        .await?;

        receipt
            .and_then(|r| r.block_number)
            .ok_or_else(|| RpcError::ReceiptNotFound(tx_hash.to_string()))
    }

    async fn storage_at(
        &self,
        address: Address,
        slot: B256,
        block_number: u64,
    ) -> RpcResult<B256> {
        let key = U256::from_be_bytes(slot.0);

        let value = (|| async {
            self.provider
                .get_storage_at(address, key)
                .block_id(BlockId::number(block_number))
                .await
                .map_err(RpcError::from)
        })
        .retry(self.retry_config.to_backoff_builder())
        .when(|e| e.is_retryable())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying ChainClient::storage_at");
        })
        .await?;

        Ok(B256::from(value.to_be_bytes::<32>()))
    }
}
