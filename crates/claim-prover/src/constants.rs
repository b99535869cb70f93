//! Constants used throughout the claim prover.

use std::time::Duration;

/// Default Kafka topic carrying claim events.
pub const DEFAULT_KAFKA_TOPIC: &str = "raise-claim";

/// Default Kafka consumer group.
pub const DEFAULT_KAFKA_GROUP_ID: &str = "claim-prover";

/// Storage slot of the `balances` mapping in a standard ERC-20 layout.
pub const DEFAULT_BALANCE_SLOT: u64 = 0;

/// Gas forwarded to the verifier callback when the settlement request fulfils.
pub const DEFAULT_CALLBACK_GAS_LIMIT: u64 = 100_000;

/// Settlement request option flag (0 = zk-only).
pub const SETTLEMENT_OPTION_ZK_ONLY: u8 = 0;

/// Number of storage entries in every proof request (challenger, LP).
pub const STORAGE_ENTRY_COUNT: usize = 2;

/// Position of the challenger's balance in the proof request.
pub const CHALLENGER_ENTRY_INDEX: usize = 0;

/// Position of the liquidity provider's balance in the proof request.
pub const LP_ENTRY_INDEX: usize = 1;

/// Default number of retry attempts for chain RPC operations.
pub const DEFAULT_RPC_MAX_RETRIES: u32 = 5;

/// Default initial delay for chain RPC retries.
pub const DEFAULT_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay between chain RPC retries.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default number of times a retryable claim is re-run before it is dead-lettered.
pub const DEFAULT_CLAIM_MAX_RETRIES: u32 = 3;

/// Initial delay between claim retries.
pub const CLAIM_RETRY_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Maximum delay between claim retries.
pub const CLAIM_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default polling interval for attestation finality.
pub const DEFAULT_ATTESTATION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Delay before receiving again after a broker error.
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Timeout for a single dead-letter produce call.
pub const DEAD_LETTER_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum request body accepted by the prover and attestation clients.
pub const MAX_RPC_REQUEST_SIZE: u32 = 10 * 1024 * 1024;

/// Gas limit safety margin numerator (6/5 = 120%).
pub const GAS_LIMIT_MULTIPLIER_NUMERATOR: u64 = 6;

/// Gas limit safety margin denominator.
pub const GAS_LIMIT_MULTIPLIER_DENOMINATOR: u64 = 5;
