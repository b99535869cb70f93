//! Claim prover: consumes raised claims from Kafka, proves the challenger and
//! liquidity provider token balances at the claim's block, and settles the
//! proof on chain through an attestation network.

mod attestation;
pub use attestation::{
    AttestationClient, AttestationRpcClient, AttestationSubmission, QueryState, QueryStatus,
    wait_for_finality,
};

mod builder;
pub use builder::ProofRequestBuilder;

mod cli;
pub use cli::{ChainArgs, ClaimArgs, Cli, KafkaArgs, LogArgs, MetricsArgs};

mod config;
pub use config::{
    ClaimProverConfig, ConfigError, KafkaConfig, MetricsConfig, RetryConfig, SigningConfig,
    validate_url,
};

mod constants;
pub use constants::*;

mod consumer;
pub use consumer::{
    ClaimConsumer, ClaimMessage, ClaimProcessor, ClaimSource, ConsumerState, DeadLetter,
    DeadLetterPublisher, KafkaClaimSource, KafkaDeadLetterPublisher, LoggingDeadLetterPublisher,
    MessageProcessor, OffsetCommitter, PartitionWorkers, ProcessorConfig,
};

mod contracts;
pub use contracts::{
    Callback, ISettlementRequest, LocalSettlementClient, SettlementContract,
    encode_send_request_calldata,
};

mod error;
pub use error::*;

mod kafka;
pub use kafka::{
    consumer_client_config, create_kafka_consumer, create_kafka_producer,
    load_kafka_config_from_file, parse_kafka_properties,
};

mod logging;
pub use logging::{LogConfig, LogFormat, StdoutLogConfig, verbosity_to_level_filter};

mod metrics;
pub use metrics::{
    CLAIMS_DEAD_LETTERED_TOTAL, CLAIMS_FAILED_TOTAL, CLAIMS_IN_FLIGHT, CLAIMS_RECEIVED_TOTAL,
    CLAIMS_SETTLED_TOTAL, INFO, LABEL_KIND, LABEL_VERSION, PROOF_DURATION_SECONDS, UP,
    record_startup_metrics,
};

mod pipeline;
pub use pipeline::{ClaimHandler, ClaimPipeline, validate_request};

mod prover;
pub use prover::{ProveResponse, ProverRpcClient, ProvingClient};

mod rpc;
pub use rpc::{
    ChainClient, ChainClientConfig, ChainReader, RpcChainClient, RpcError, RpcResult,
    is_valid_address,
};

mod service;
pub use service::run;

mod settlement;
pub use settlement::{Settler, SettlerConfig};

mod signal;
pub use signal::setup_signal_handler;

mod slot;
pub use slot::{left_pad_address, mapping_slot};

mod types;
pub use types::{
    ClaimEvent, CustomInput, ProofRequest, ProofResult, ProverErrorCode, ProverFailure, QueryKey,
    SettlementReceipt, StorageProofEntry,
};

#[cfg(test)]
pub mod test_utils;
