//! Full claim prover service lifecycle.

use std::sync::Arc;

use eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    AttestationRpcClient, ChainClientConfig, ChainReader, ClaimConsumer, ClaimPipeline,
    ClaimProcessor, ClaimProverConfig, DeadLetterPublisher, KafkaClaimSource,
    KafkaDeadLetterPublisher, LocalSettlementClient, LoggingDeadLetterPublisher,
    PartitionWorkers, ProcessorConfig, ProofRequestBuilder, ProverRpcClient, RetryConfig,
    RpcChainClient, Settler, SettlerConfig, create_kafka_consumer, create_kafka_producer,
};

/// Runs the full claim prover service lifecycle.
///
/// Steps:
/// 1. Initialise logging and metrics
/// 2. Create the chain, prover and attestation clients
/// 3. Create the settlement client and the claim pipeline
/// 4. Connect the Kafka consumer and subscribe to the claim topic
/// 5. Create the dead-letter publisher
/// 6. Run the consumer until SIGTERM or SIGINT, or until a worker fails
pub async fn run(config: ClaimProverConfig) -> Result<()> {
    config.log.init_tracing_subscriber()?;

    info!(version = env!("CARGO_PKG_VERSION"), "Claim prover starting");

    // ── 1. Global cancellation token, signal handler and metrics ─────────
    let cancel = CancellationToken::new();
    crate::setup_signal_handler(cancel.clone());

    if config.metrics.enabled {
        let addr = config.metrics.socket_addr();
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| eyre::eyre!("failed to install Prometheus recorder: {e}"))?;
        info!(%addr, "Metrics server started");
    }

    // Record startup metrics (no-ops if no recorder installed).
    crate::record_startup_metrics(env!("CARGO_PKG_VERSION"));

    // ── 2. Create RPC clients ────────────────────────────────────────────
    let chain_config = ChainClientConfig::new(config.rpc_url.clone())
        .with_timeout(config.rpc_timeout)
        .with_retry_config(config.retry);
    let chain_client = Arc::new(RpcChainClient::new(chain_config)?);
    info!(endpoint = %config.rpc_url, chain_id = config.chain_id, "Chain client initialized");

    let prover = Arc::new(ProverRpcClient::new(&config.prover_rpc)?);
    info!(endpoint = %config.prover_rpc, "Prover client initialized");

    let attestation = Arc::new(AttestationRpcClient::new(&config.attestation_rpc)?);
    info!(endpoint = %config.attestation_rpc, "Attestation client initialized");

    // ── 3. Settlement client and claim pipeline ──────────────────────────
    let settlement = Arc::new(LocalSettlementClient::new(
        config.rpc_url.clone(),
        config.settlement_address,
        config.verifier_address,
        config.callback_gas_limit,
        config.signing.signer().clone(),
        config.retry,
    ));
    info!(
        settlement = %config.settlement_address,
        verifier = %config.verifier_address,
        signer = %settlement.signer_address(),
        "Settlement client initialized"
    );

    let builder = ProofRequestBuilder::new(
        ChainReader::new(chain_client),
        config.token_address,
        config.balance_slot,
    );
    let settler = Settler::new(
        attestation,
        settlement,
        SettlerConfig {
            src_chain_id: config.chain_id,
            dst_chain_id: config.dest_chain_id,
            destination_contract: config.verifier_address,
            poll_interval: config.attestation_poll_interval,
            attestation_timeout: config.attestation_timeout,
            finality_retry: config.claim_retry,
        },
    );
    let pipeline = Arc::new(ClaimPipeline::new(builder, prover, settler));

    // ── 4. Kafka consumer ────────────────────────────────────────────────
    let mut source = KafkaClaimSource::new(
        create_kafka_consumer(&config.kafka)?,
        config.kafka.topic.clone(),
    );
    source.subscribe()?;
    let source = Arc::new(source);
    info!(
        brokers = %config.kafka.brokers,
        topic = %config.kafka.topic,
        group_id = %config.kafka.group_id,
        "Kafka consumer initialized"
    );

    // ── 5. Dead-letter publisher ─────────────────────────────────────────
    let dead_letters: Arc<dyn DeadLetterPublisher> = match &config.kafka.dead_letter_topic {
        Some(topic) => {
            info!(topic = %topic, "Dead letters are published to Kafka");
            Arc::new(KafkaDeadLetterPublisher::new(
                create_kafka_producer(&config.kafka)?,
                topic.clone(),
            ))
        }
        None => {
            warn!("No dead-letter topic configured, failed claims are only logged");
            Arc::new(LoggingDeadLetterPublisher)
        }
    };

    // ── 6. Run the consumer ──────────────────────────────────────────────
    let processor = Arc::new(ClaimProcessor::new(
        pipeline,
        dead_letters,
        Arc::clone(&source),
        ProcessorConfig {
            claim_retry: config.claim_retry,
            dead_letter_retry: RetryConfig::default(),
        },
    ));
    let workers = PartitionWorkers::new(
        processor,
        config.max_concurrent_claims,
        config.channel_buffer_size,
        cancel.clone(),
    );
    info!(
        max_concurrent_claims = config.max_concurrent_claims,
        channel_buffer_size = config.channel_buffer_size,
        "Claim prover running"
    );

    ClaimConsumer::new(source, workers, cancel).run().await?;

    info!("Claim prover stopped");
    Ok(())
}
