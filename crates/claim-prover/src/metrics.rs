/// Gauge: claim prover build info, labelled with `version`.
pub const INFO: &str = "claim_prover_info";

/// Gauge: claim prover is running (set to 1 at startup).
pub const UP: &str = "claim_prover_up";

/// Counter: total number of claim messages received.
pub const CLAIMS_RECEIVED_TOTAL: &str = "claim_prover_claims_received_total";

/// Counter: total number of claims settled.
pub const CLAIMS_SETTLED_TOTAL: &str = "claim_prover_claims_settled_total";

/// Counter: total number of failed claim attempts, labelled with `kind`.
pub const CLAIMS_FAILED_TOTAL: &str = "claim_prover_claims_failed_total";

/// Counter: total number of claims published to the dead-letter topic.
pub const CLAIMS_DEAD_LETTERED_TOTAL: &str = "claim_prover_claims_dead_lettered_total";

/// Gauge: number of claims currently being processed.
pub const CLAIMS_IN_FLIGHT: &str = "claim_prover_claims_in_flight";

/// Histogram: time spent waiting for the prover, in seconds.
pub const PROOF_DURATION_SECONDS: &str = "claim_prover_proof_duration_seconds";

/// Label key for error kind.
pub const LABEL_KIND: &str = "kind";

/// Label key for version.
pub const LABEL_VERSION: &str = "version";

/// Records startup metrics (INFO gauge with version label, UP gauge set to 1).
pub fn record_startup_metrics(version: &str) {
    metrics::gauge!(INFO, LABEL_VERSION => version.to_string()).set(1.0);
    metrics::gauge!(UP).set(1.0);
}
