//! Configuration types and validation for the claim prover.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use alloy::{
    hex,
    primitives::{Address, U256},
    signers::{k256::ecdsa::SigningKey, local::PrivateKeySigner},
};
use backon::ExponentialBuilder;
use thiserror::Error;
use url::Url;

use crate::{
    cli::{Cli, LogArgs, MetricsArgs},
    constants::{
        CLAIM_RETRY_INITIAL_DELAY, CLAIM_RETRY_MAX_DELAY, DEFAULT_RETRY_INITIAL_DELAY,
        DEFAULT_RETRY_MAX_DELAY, DEFAULT_RPC_MAX_RETRIES,
    },
    logging::{LogConfig, StdoutLogConfig, verbosity_to_level_filter},
};

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid URL format.
    #[error("invalid {field} URL: {reason}")]
    InvalidUrl {
        /// The field name that contains the invalid URL.
        field: &'static str,
        /// The reason the URL is invalid.
        reason: String,
    },
    /// A field value is out of the allowed range.
    #[error("{field} must be {constraint}, got {value}")]
    OutOfRange {
        /// The field name that is out of range.
        field: &'static str,
        /// The constraint description.
        constraint: &'static str,
        /// The actual value.
        value: String,
    },
    /// An address field is the zero address.
    #[error("{field} must not be the zero address")]
    ZeroAddress {
        /// The field name holding the zero address.
        field: &'static str,
    },
    /// Invalid metrics configuration.
    #[error("invalid metrics config: {0}")]
    Metrics(String),
    /// Invalid signing configuration.
    #[error("invalid signing config: {0}")]
    Signing(String),
    /// Invalid Kafka configuration.
    #[error("invalid kafka config: {0}")]
    Kafka(String),
}

/// Signing configuration for settlement transactions.
#[derive(Clone)]
pub enum SigningConfig {
    /// Local signing with an in-process private key.
    Local {
        /// The private key signer.
        signer: PrivateKeySigner,
    },
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { signer } => {
                f.debug_struct("Local").field("address", &signer.address()).finish()
            }
        }
    }
}

impl SigningConfig {
    /// Parses a hex-encoded private key, with or without the `0x` prefix.
    pub fn from_private_key(private_key: &str) -> Result<Self, ConfigError> {
        let hex_str = private_key.strip_prefix("0x").unwrap_or(private_key);
        let key_bytes = hex::decode(hex_str)
            .map_err(|e| ConfigError::Signing(format!("invalid private key hex: {e}")))?;
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| ConfigError::Signing(format!("invalid private key: {e}")))?;
        Ok(Self::Local { signer: PrivateKeySigner::from_signing_key(signing_key) })
    }

    /// Returns the signer.
    pub const fn signer(&self) -> &PrivateKeySigner {
        match self {
            Self::Local { signer } => signer,
        }
    }
}

/// Validated retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial delay for exponential backoff.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RPC_MAX_RETRIES,
            initial_delay: DEFAULT_RETRY_INITIAL_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl RetryConfig {
    /// Creates a `backon` [`ExponentialBuilder`] from this configuration.
    pub fn to_backoff_builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts as usize)
            .with_jitter()
    }
}

/// Validated Kafka configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    /// Topic carrying claim events.
    pub topic: String,
    /// Consumer group ID.
    pub group_id: String,
    /// Optional librdkafka properties file.
    pub properties_file: Option<PathBuf>,
    /// Optional topic receiving failed claims.
    pub dead_letter_topic: Option<String>,
}

/// Validated metrics server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether the Prometheus listener is started.
    pub enabled: bool,
    /// Bind address.
    pub addr: IpAddr,
    /// Bind port.
    pub port: u16,
}

impl MetricsConfig {
    /// Returns the listener socket address.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

impl TryFrom<MetricsArgs> for MetricsConfig {
    type Error = ConfigError;

    fn try_from(args: MetricsArgs) -> Result<Self, Self::Error> {
        if args.enabled && args.port == 0 {
            return Err(ConfigError::Metrics("port must be non-zero".to_string()));
        }
        Ok(Self { enabled: args.enabled, addr: args.addr, port: args.port })
    }
}

impl From<LogArgs> for LogConfig {
    fn from(args: LogArgs) -> Self {
        Self {
            global_level: verbosity_to_level_filter(args.level),
            stdout_logs: (!args.stdout_quiet)
                .then_some(StdoutLogConfig { format: args.stdout_format }),
        }
    }
}

/// Validated claim prover configuration.
#[derive(Debug, Clone)]
pub struct ClaimProverConfig {
    /// URL of the chain RPC endpoint.
    pub rpc_url: Url,
    /// Chain RPC request timeout.
    pub rpc_timeout: Duration,
    /// Chain RPC retry configuration.
    pub retry: RetryConfig,
    /// Chain the claim balances are read from.
    pub chain_id: u64,
    /// Chain the proof is verified on.
    pub dest_chain_id: u64,
    /// Signing configuration for settlement transactions.
    pub signing: SigningConfig,
    /// Token contract whose balances are proven.
    pub token_address: Address,
    /// Settlement request contract.
    pub settlement_address: Address,
    /// Verifier callback contract.
    pub verifier_address: Address,
    /// Gas forwarded to the verifier callback.
    pub callback_gas_limit: u64,
    /// Base slot of the balance mapping.
    pub balance_slot: U256,
    /// URL of the proving service.
    pub prover_rpc: Url,
    /// URL of the attestation network.
    pub attestation_rpc: Url,
    /// Interval between attestation status polls.
    pub attestation_poll_interval: Duration,
    /// Upper bound on the attestation wait, if any.
    pub attestation_timeout: Option<Duration>,
    /// Kafka configuration.
    pub kafka: KafkaConfig,
    /// Maximum claims in flight across partitions.
    pub max_concurrent_claims: usize,
    /// Per-partition queue capacity.
    pub channel_buffer_size: usize,
    /// Retry policy for claims failing with a transient error.
    pub claim_retry: RetryConfig,
    /// Logging configuration.
    pub log: LogConfig,
    /// Metrics server configuration.
    pub metrics: MetricsConfig,
}

/// Validate that a URL has a scheme and host.
pub fn validate_url(url: &Url, field: &'static str) -> Result<(), ConfigError> {
    if url.scheme().is_empty() {
        return Err(ConfigError::InvalidUrl { field, reason: "missing scheme".to_string() });
    }

    if url.host().is_none() {
        return Err(ConfigError::InvalidUrl { field, reason: "missing host".to_string() });
    }

    Ok(())
}

fn validate_address(address: Address, field: &'static str) -> Result<Address, ConfigError> {
    if address.is_zero() {
        return Err(ConfigError::ZeroAddress { field });
    }
    Ok(address)
}

fn validate_positive<T>(value: T, field: &'static str) -> Result<T, ConfigError>
where
    T: Copy + Default + PartialEq + ToString,
{
    if value == T::default() {
        return Err(ConfigError::OutOfRange {
            field,
            constraint: "greater than 0",
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn validate_non_empty(value: String, field: &'static str) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Kafka(format!("{field} must not be empty")));
    }
    Ok(value)
}

impl ClaimProverConfig {
    /// Validates the parsed command line into a configuration.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let Cli { chain, claims, kafka, logging, metrics } = cli;

        validate_url(&chain.rpc_url, "rpc-url")?;
        validate_url(&claims.prover_rpc, "prover-rpc")?;
        validate_url(&claims.attestation_rpc, "attestation-rpc")?;

        let chain_id = validate_positive(chain.chain_id, "chain-id")?;
        let dest_chain_id =
            validate_positive(chain.dest_chain_id.unwrap_or(chain_id), "dest-chain-id")?;

        if claims.attestation_poll_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "attestation-poll-interval",
                constraint: "greater than 0",
                value: format!("{:?}", claims.attestation_poll_interval),
            });
        }

        let topic = validate_non_empty(kafka.topic, "kafka-topic")?;
        if kafka.dead_letter_topic.as_deref().is_some_and(|dlq| dlq == topic) {
            return Err(ConfigError::Kafka(format!(
                "dead-letter-topic must differ from kafka-topic ({topic})"
            )));
        }
        let kafka_config = KafkaConfig {
            brokers: validate_non_empty(kafka.brokers, "kafka-brokers")?,
            group_id: validate_non_empty(kafka.group_id, "kafka-group-id")?,
            topic,
            properties_file: kafka.properties_file,
            dead_letter_topic: kafka.dead_letter_topic,
        };

        Ok(Self {
            rpc_url: chain.rpc_url,
            rpc_timeout: chain.rpc_timeout,
            retry: RetryConfig {
                max_attempts: chain.rpc_max_retries,
                initial_delay: chain.rpc_retry_initial_delay,
                max_delay: chain.rpc_retry_max_delay,
            },
            chain_id,
            dest_chain_id,
            signing: SigningConfig::from_private_key(&chain.private_key)?,
            token_address: validate_address(claims.token_address, "token-address")?,
            settlement_address: validate_address(claims.settlement_address, "settlement-address")?,
            verifier_address: validate_address(claims.verifier_address, "verifier-address")?,
            callback_gas_limit: validate_positive(
                claims.callback_gas_limit,
                "callback-gas-limit",
            )?,
            balance_slot: U256::from(claims.balance_slot),
            prover_rpc: claims.prover_rpc,
            attestation_rpc: claims.attestation_rpc,
            attestation_poll_interval: claims.attestation_poll_interval,
            attestation_timeout: claims.attestation_timeout,
            kafka: kafka_config,
            max_concurrent_claims: validate_positive(
                kafka.max_concurrent_claims,
                "max-concurrent-claims",
            )?,
            channel_buffer_size: validate_positive(
                kafka.channel_buffer_size,
                "channel-buffer-size",
            )?,
            claim_retry: RetryConfig {
                max_attempts: claims.claim_max_retries,
                initial_delay: CLAIM_RETRY_INITIAL_DELAY,
                max_delay: CLAIM_RETRY_MAX_DELAY,
            },
            log: LogConfig::from(logging),
            metrics: MetricsConfig::try_from(metrics)?,
        })
    }
}
