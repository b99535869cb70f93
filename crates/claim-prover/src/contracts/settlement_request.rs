//! Settlement request contract bindings and transaction submission.
//!
//! Asks the settlement contract to verify an attested proof by calling
//! `sendRequest(proofId, nonce, refundee, callback, option)`.

use std::future::Future;

use alloy::{
    eips::Encodable2718,
    network::{Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash},
    providers::{Provider, RootProvider},
    rpc::types::{TransactionInput, TransactionRequest},
    signers::local::PrivateKeySigner,
    sol,
    sol_types::SolCall,
    transports::TransportError,
};
use async_trait::async_trait;
use backon::Retryable;
use tokio::sync::OnceCell;
use tracing::info;
use url::Url;

use crate::{
    config::RetryConfig,
    constants::{
        GAS_LIMIT_MULTIPLIER_DENOMINATOR, GAS_LIMIT_MULTIPLIER_NUMERATOR, SETTLEMENT_OPTION_ZK_ONLY,
    },
    error::SettlementError,
    rpc::RpcError,
    types::QueryKey,
};

sol! {
    /// Contract invoked on the destination chain once a request is fulfilled.
    struct Callback {
        address target;
        uint64 gas;
    }

    /// Settlement request contract interface.
    #[sol(rpc)]
    interface ISettlementRequest {
        /// Requests verification of the proof identified by `proofId`.
        function sendRequest(
            bytes32 proofId,
            uint64 nonce,
            address refundee,
            Callback calldata callback,
            uint8 option
        ) external payable;
    }
}

/// Encodes the calldata for `sendRequest`.
pub fn encode_send_request_calldata(
    key: &QueryKey,
    refundee: Address,
    callback_target: Address,
    callback_gas_limit: u64,
) -> Bytes {
    let call = ISettlementRequest::sendRequestCall {
        proofId: key.query_hash,
        nonce: key.nonce,
        refundee,
        callback: Callback { target: callback_target, gas: callback_gas_limit },
        option: SETTLEMENT_OPTION_ZK_ONLY,
    };
    Bytes::from(call.abi_encode())
}

/// Applies a 120% safety margin to a gas estimate using integer arithmetic.
const fn apply_gas_margin(estimated: u64) -> u64 {
    estimated.saturating_mul(GAS_LIMIT_MULTIPLIER_NUMERATOR) / GAS_LIMIT_MULTIPLIER_DENOMINATOR
}

/// Maps a gas estimation failure, separating contract reverts from transport failures.
fn estimation_error(err: TransportError) -> SettlementError {
    match err.as_error_resp() {
        Some(payload) if payload.message.contains("revert") => {
            SettlementError::WouldRevert(payload.message.to_string())
        }
        _ => SettlementError::Rpc(RpcError::from(err)),
    }
}

/// Builds, signs, broadcasts and confirms one settlement transaction.
async fn submit_transaction<F, Fut>(
    provider: &RootProvider,
    from_address: Address,
    to_address: Address,
    calldata: Bytes,
    chain_id_cell: &OnceCell<u64>,
    sign_tx: F,
) -> Result<TxHash, SettlementError>
where
    F: FnOnce(TransactionRequest) -> Fut,
    Fut: Future<Output = Result<Bytes, SettlementError>>,
{
    let nonce = provider.get_transaction_count(from_address).await.map_err(RpcError::from)?;

    let chain_id = *chain_id_cell
        .get_or_try_init(|| async {
            provider.get_chain_id().await.map_err(|e| SettlementError::Rpc(RpcError::from(e)))
        })
        .await?;

    let fees = provider.estimate_eip1559_fees().await.map_err(RpcError::from)?;

    let mut tx = TransactionRequest::default()
        .from(from_address)
        .to(to_address)
        .input(TransactionInput::new(calldata))
        .nonce(nonce)
        .max_fee_per_gas(fees.max_fee_per_gas)
        .max_priority_fee_per_gas(fees.max_priority_fee_per_gas);
    tx.set_chain_id(chain_id);

    let gas_estimate = provider.estimate_gas(tx.clone()).await.map_err(estimation_error)?;
    tx.set_gas_limit(apply_gas_margin(gas_estimate));

    let signed_bytes = sign_tx(tx).await?;
    let pending = provider.send_raw_transaction(&signed_bytes).await.map_err(RpcError::from)?;

    let tx_hash = *pending.tx_hash();
    info!(%tx_hash, "Settlement transaction sent, waiting for receipt");

    // Past this point the request may be on chain and must not be resent.
    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| SettlementError::Unconfirmed { tx_hash, reason: e.to_string() })?;

    if !receipt.status() {
        return Err(SettlementError::Reverted { tx_hash });
    }

    info!(%tx_hash, block_number = receipt.block_number, "Settlement transaction confirmed");
    Ok(tx_hash)
}

/// Submits settlement requests on chain.
#[async_trait]
pub trait SettlementContract: Send + Sync {
    /// Calls `sendRequest` for `key` and waits for the transaction to be included.
    ///
    /// A reverted transaction is [`SettlementError::Reverted`]. A broadcast
    /// transaction without a receipt is [`SettlementError::Unconfirmed`] and is
    /// never resent.
    async fn send_request(&self, key: &QueryKey) -> Result<TxHash, SettlementError>;
}

/// Settlement contract client that signs transactions locally with a private key.
pub struct LocalSettlementClient {
    provider: RootProvider,
    wallet: EthereumWallet,
    settlement_address: Address,
    verifier_address: Address,
    callback_gas_limit: u64,
    retry_config: RetryConfig,
    chain_id: OnceCell<u64>,
}

impl std::fmt::Debug for LocalSettlementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSettlementClient")
            .field("settlement_address", &self.settlement_address)
            .field("verifier_address", &self.verifier_address)
            .field("callback_gas_limit", &self.callback_gas_limit)
            .finish_non_exhaustive()
    }
}

impl LocalSettlementClient {
    /// Creates a new settlement client with the given signer.
    pub fn new(
        rpc_url: Url,
        settlement_address: Address,
        verifier_address: Address,
        callback_gas_limit: u64,
        signer: PrivateKeySigner,
        retry_config: RetryConfig,
    ) -> Self {
        let provider = RootProvider::new_http(rpc_url);
        let wallet = EthereumWallet::from(signer);

        Self {
            provider,
            wallet,
            settlement_address,
            verifier_address,
            callback_gas_limit,
            retry_config,
            chain_id: OnceCell::new(),
        }
    }

    /// Returns the address that signs and pays for settlement requests.
    pub fn signer_address(&self) -> Address {
        NetworkWallet::<Ethereum>::default_signer_address(&self.wallet)
    }
}

#[async_trait]
impl SettlementContract for LocalSettlementClient {
    async fn send_request(&self, key: &QueryKey) -> Result<TxHash, SettlementError> {
        let from = self.signer_address();
        let calldata = encode_send_request_calldata(
            key,
            from,
            self.verifier_address,
            self.callback_gas_limit,
        );

        info!(
            query_hash = %key.query_hash,
            nonce = key.nonce,
            settlement = %self.settlement_address,
            "Sending settlement request"
        );

        (|| async {
            submit_transaction(
                &self.provider,
                from,
                self.settlement_address,
                calldata.clone(),
                &self.chain_id,
                |tx| async {
                    let envelope =
                        <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &self.wallet)
                            .await
                            .map_err(|e| SettlementError::Signing(e.to_string()))?;
                    Ok(Bytes::from(Encodable2718::encoded_2718(&envelope)))
                },
            )
            .await
        })
        .retry(self.retry_config.to_backoff_builder())
        .when(SettlementError::is_retryable)
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying settlement request");
        })
        .await
    }
}
