//! CLI argument definitions for the claim prover.

use std::{net::IpAddr, path::PathBuf, time::Duration};

use alloy::primitives::Address;
use clap::{
    ArgAction, Parser,
    builder::{
        Styles,
        styling::{AnsiColor, Color, Style},
    },
};
use url::Url;

use crate::logging::LogFormat;

/// Claim prover - proves challenger and LP balances for raised claims and settles them on chain.
#[derive(Debug, Clone, Parser)]
#[command(name = "claim-prover")]
#[command(version, about, long_about = None)]
#[command(styles = cli_styles())]
pub struct Cli {
    /// Chain connection and signing arguments.
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Claim proving and settlement arguments.
    #[command(flatten)]
    pub claims: ClaimArgs,

    /// Kafka consumer arguments.
    #[command(flatten)]
    pub kafka: KafkaArgs,

    /// Logging configuration arguments.
    #[command(flatten)]
    pub logging: LogArgs,

    /// Metrics configuration arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}

/// Chain connection and signing arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Chain")]
pub struct ChainArgs {
    /// URL of the chain RPC endpoint.
    #[arg(long = "rpc-url", env = "CLAIM_PROVER_RPC_URL", value_parser = parse_url)]
    pub rpc_url: Url,

    /// Chain ID the claim balances are read from.
    #[arg(long = "chain-id", env = "CLAIM_PROVER_CHAIN_ID")]
    pub chain_id: u64,

    /// Chain ID the proof is verified on. Defaults to --chain-id.
    #[arg(long = "dest-chain-id", env = "CLAIM_PROVER_DEST_CHAIN_ID")]
    pub dest_chain_id: Option<u64>,

    /// Private key for settlement transaction signing (hex-encoded).
    #[arg(long = "private-key", env = "CLAIM_PROVER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// RPC request timeout (e.g., "30s", "1m").
    #[arg(
        long = "rpc-timeout",
        env = "CLAIM_PROVER_RPC_TIMEOUT",
        default_value = "30s",
        value_parser = parse_duration
    )]
    pub rpc_timeout: Duration,

    /// Maximum number of retry attempts for chain RPC operations.
    #[arg(long = "rpc-max-retries", env = "CLAIM_PROVER_RPC_MAX_RETRIES", default_value = "5")]
    pub rpc_max_retries: u32,

    /// Initial delay for exponential backoff (e.g., "100ms", "1s").
    #[arg(
        long = "rpc-retry-initial-delay",
        env = "CLAIM_PROVER_RPC_RETRY_INITIAL_DELAY",
        default_value = "100ms",
        value_parser = parse_duration
    )]
    pub rpc_retry_initial_delay: Duration,

    /// Maximum delay between retry attempts (e.g., "10s", "1m").
    #[arg(
        long = "rpc-retry-max-delay",
        env = "CLAIM_PROVER_RPC_RETRY_MAX_DELAY",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub rpc_retry_max_delay: Duration,
}

/// Claim proving and settlement arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Claims")]
pub struct ClaimArgs {
    /// Address of the token contract whose balances are proven.
    #[arg(
        long = "token-address",
        env = "CLAIM_PROVER_TOKEN_ADDRESS",
        value_parser = parse_address
    )]
    pub token_address: Address,

    /// Address of the settlement request contract.
    #[arg(
        long = "settlement-address",
        env = "CLAIM_PROVER_SETTLEMENT_ADDRESS",
        value_parser = parse_address
    )]
    pub settlement_address: Address,

    /// Address of the application contract called back with the verified result.
    #[arg(
        long = "verifier-address",
        env = "CLAIM_PROVER_VERIFIER_ADDRESS",
        value_parser = parse_address
    )]
    pub verifier_address: Address,

    /// Gas forwarded to the verifier callback.
    #[arg(
        long = "callback-gas-limit",
        env = "CLAIM_PROVER_CALLBACK_GAS_LIMIT",
        default_value = "100000"
    )]
    pub callback_gas_limit: u64,

    /// Storage slot of the token's balance mapping.
    #[arg(long = "balance-slot", env = "CLAIM_PROVER_BALANCE_SLOT", default_value = "0")]
    pub balance_slot: u64,

    /// URL of the proving service JSON-RPC endpoint.
    #[arg(long = "prover-rpc", env = "CLAIM_PROVER_PROVER_RPC", value_parser = parse_url)]
    pub prover_rpc: Url,

    /// URL of the attestation network JSON-RPC endpoint.
    #[arg(long = "attestation-rpc", env = "CLAIM_PROVER_ATTESTATION_RPC", value_parser = parse_url)]
    pub attestation_rpc: Url,

    /// Polling interval for attestation finality (e.g., "10s").
    #[arg(
        long = "attestation-poll-interval",
        env = "CLAIM_PROVER_ATTESTATION_POLL_INTERVAL",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub attestation_poll_interval: Duration,

    /// Give up waiting for attestation finality after this long (e.g., "30m").
    #[arg(
        long = "attestation-timeout",
        env = "CLAIM_PROVER_ATTESTATION_TIMEOUT",
        value_parser = parse_duration
    )]
    pub attestation_timeout: Option<Duration>,

    /// Number of times a claim failing with a transient error is retried before
    /// it is dead-lettered.
    #[arg(long = "claim-max-retries", env = "CLAIM_PROVER_CLAIM_MAX_RETRIES", default_value = "3")]
    pub claim_max_retries: u32,
}

/// Kafka consumer arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Kafka")]
pub struct KafkaArgs {
    /// Comma-separated list of Kafka bootstrap servers.
    #[arg(long = "kafka-brokers", env = "CLAIM_PROVER_KAFKA_BROKERS")]
    pub brokers: String,

    /// Topic carrying claim events.
    #[arg(long = "kafka-topic", env = "CLAIM_PROVER_KAFKA_TOPIC", default_value = "raise-claim")]
    pub topic: String,

    /// Consumer group ID.
    #[arg(
        long = "kafka-group-id",
        env = "CLAIM_PROVER_KAFKA_GROUP_ID",
        default_value = "claim-prover"
    )]
    pub group_id: String,

    /// Path to a librdkafka properties file with extra client settings.
    #[arg(long = "kafka-properties-file", env = "CLAIM_PROVER_KAFKA_PROPERTIES_FILE")]
    pub properties_file: Option<PathBuf>,

    /// Topic receiving claims that failed terminally. Failed claims are only
    /// logged when unset.
    #[arg(long = "dead-letter-topic", env = "CLAIM_PROVER_DEAD_LETTER_TOPIC")]
    pub dead_letter_topic: Option<String>,

    /// Maximum number of claims processed concurrently across partitions.
    #[arg(
        long = "max-concurrent-claims",
        env = "CLAIM_PROVER_MAX_CONCURRENT_CLAIMS",
        default_value = "1"
    )]
    pub max_concurrent_claims: usize,

    /// Per-partition queue capacity between the consumer and its worker.
    #[arg(
        long = "channel-buffer-size",
        env = "CLAIM_PROVER_CHANNEL_BUFFER_SIZE",
        default_value = "64"
    )]
    pub channel_buffer_size: usize,
}

/// Logging configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Increase logging verbosity (1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5=TRACE).
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        default_value = "3",
        env = "CLAIM_PROVER_LOG_VERBOSITY",
        global = true
    )]
    pub level: u8,

    /// Suppress stdout logging.
    #[arg(long = "quiet", short = 'q', global = true)]
    pub stdout_quiet: bool,

    /// Stdout log format.
    #[arg(
        long = "log-format",
        default_value = "full",
        env = "CLAIM_PROVER_LOG_FORMAT",
        global = true
    )]
    pub stdout_format: LogFormat,
}

/// Metrics server configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Metrics")]
pub struct MetricsArgs {
    /// Enable metrics server.
    #[arg(
        id = "metrics_enabled",
        long = "metrics.enabled",
        env = "CLAIM_PROVER_METRICS_ENABLED",
        default_value = "false"
    )]
    pub enabled: bool,

    /// Metrics server bind address.
    #[arg(
        id = "metrics_addr",
        long = "metrics.addr",
        env = "CLAIM_PROVER_METRICS_ADDR",
        default_value = "0.0.0.0"
    )]
    pub addr: IpAddr,

    /// Metrics server port.
    #[arg(
        id = "metrics_port",
        long = "metrics.port",
        env = "CLAIM_PROVER_METRICS_PORT",
        default_value = "7300"
    )]
    pub port: u16,
}

/// Help output styles.
const fn cli_styles() -> Styles {
    Styles::styled()
        .usage(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .header(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .valid(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

/// Parse a duration string like "12s", "5m", "1h".
fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Parse a URL string.
fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    Url::parse(s)
}

/// Parse an address from hex string.
fn parse_address(s: &str) -> Result<Address, alloy::primitives::hex::FromHexError> {
    s.parse()
}
