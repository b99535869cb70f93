//! Per-message claim handling: retry, dead-letter and commit.
//!
//! Offsets are committed only after the claim's outcome has been applied.

use std::sync::Arc;

use async_trait::async_trait;
use backon::Retryable;
use tracing::{Instrument, error, field, info, info_span, warn};

use super::{ClaimMessage, DeadLetter, DeadLetterPublisher, OffsetCommitter};
use crate::{
    config::RetryConfig,
    error::{ConsumerError, Disposition, PipelineError, PipelineResult},
    metrics::{
        CLAIMS_DEAD_LETTERED_TOTAL, CLAIMS_FAILED_TOTAL, CLAIMS_IN_FLIGHT, CLAIMS_RECEIVED_TOTAL,
        CLAIMS_SETTLED_TOTAL, LABEL_KIND,
    },
    pipeline::ClaimHandler,
    types::{ClaimEvent, SettlementReceipt},
};

/// Processes one claim message through to its offset commit.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Handles `message` and commits its offset.
    ///
    /// An error means the offset was not committed and the consumer must stop.
    async fn process(&self, message: ClaimMessage) -> Result<(), ConsumerError>;
}

/// Retry policies applied by [`ClaimProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Retries of claims failing with a transient error.
    pub claim_retry: RetryConfig,
    /// Retries of dead-letter publishing.
    pub dead_letter_retry: RetryConfig,
}

/// Runs claims through the handler and applies the failure disposition.
#[derive(Debug)]
pub struct ClaimProcessor<H, D: ?Sized, K> {
    handler: Arc<H>,
    dead_letters: Arc<D>,
    committer: Arc<K>,
    config: ProcessorConfig,
}

impl<H, D, K> ClaimProcessor<H, D, K>
where
    H: ClaimHandler,
    D: DeadLetterPublisher + ?Sized,
    K: OffsetCommitter,
{
    /// Creates a new processor.
    pub const fn new(
        handler: Arc<H>,
        dead_letters: Arc<D>,
        committer: Arc<K>,
        config: ProcessorConfig,
    ) -> Self {
        Self { handler, dead_letters, committer, config }
    }

    async fn handle_with_retry(&self, event: &ClaimEvent) -> PipelineResult<SettlementReceipt> {
        metrics::gauge!(CLAIMS_IN_FLIGHT).increment(1.0);
        let result = (|| async { self.handler.handle(event).await })
            .retry(self.config.claim_retry.to_backoff_builder())
            .when(|err: &PipelineError| err.disposition() == Disposition::Retry)
            .notify(|err, dur| {
                metrics::counter!(CLAIMS_FAILED_TOTAL, LABEL_KIND => err.kind()).increment(1);
                warn!(error = %err, delay = ?dur, "Retrying claim");
            })
            .await;
        metrics::gauge!(CLAIMS_IN_FLIGHT).decrement(1.0);
        result
    }

    async fn dead_letter(
        &self,
        message: &ClaimMessage,
        err: &PipelineError,
    ) -> Result<(), ConsumerError> {
        let letter = DeadLetter::new(message, err);
        (|| async { self.dead_letters.publish(&letter).await })
            .retry(self.config.dead_letter_retry.to_backoff_builder())
            .notify(|err, dur| {
                warn!(error = %err, delay = ?dur, "Retrying dead letter publish");
            })
            .await
            .map_err(|e| ConsumerError::DeadLetter {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                reason: e.to_string(),
            })?;
        metrics::counter!(CLAIMS_DEAD_LETTERED_TOTAL).increment(1);
        Ok(())
    }

    async fn process_inner(&self, message: &ClaimMessage) -> Result<(), ConsumerError> {
        let outcome = match message.decode() {
            Ok(event) => {
                tracing::Span::current().record("order_hash", field::display(event.order_hash));
                self.handle_with_retry(&event).await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(receipt) => {
                metrics::counter!(CLAIMS_SETTLED_TOTAL).increment(1);
                info!(
                    tx_hash = %receipt.tx_hash,
                    query_hash = %receipt.query_key.query_hash,
                    "Claim settled"
                );
            }
            Err(err) => {
                metrics::counter!(CLAIMS_FAILED_TOTAL, LABEL_KIND => err.kind()).increment(1);
                match err.disposition() {
                    Disposition::Commit => {
                        warn!(error = %err, "Claim not settled, nothing left to do");
                    }
                    Disposition::Retry | Disposition::DeadLetter => {
                        error!(error = %err, kind = err.kind(), "Claim failed, dead-lettering");
                        if let Err(publish_err) = self.dead_letter(message, &err).await {
                            error!(
                                error = %publish_err,
                                "Dead letter not published, offset left uncommitted"
                            );
                            return Err(publish_err);
                        }
                    }
                }
            }
        }

        if let Err(err) = self.committer.commit(message) {
            warn!(error = %err, "Failed to commit offset");
        }
        Ok(())
    }
}

#[async_trait]
impl<H, D, K> MessageProcessor for ClaimProcessor<H, D, K>
where
    H: ClaimHandler,
    D: DeadLetterPublisher + ?Sized,
    K: OffsetCommitter,
{
    async fn process(&self, message: ClaimMessage) -> Result<(), ConsumerError> {
        metrics::counter!(CLAIMS_RECEIVED_TOTAL).increment(1);
        let span = info_span!(
            "claim",
            partition = message.partition,
            offset = message.offset,
            order_hash = field::Empty,
        );
        self.process_inner(&message).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy::primitives::{B256, Bytes, U256};

    use super::*;
    use crate::{
        attestation::QueryState,
        builder::ProofRequestBuilder,
        error::{AttestationError, SettlementError},
        pipeline::ClaimPipeline,
        rpc::ChainReader,
        settlement::Settler,
        test_utils::{
            MockAttestation, MockChainClient, MockCommitter, MockDeadLetter, MockHandler,
            MockProver, MockSettlement, TOKEN_ADDRESS, claim_message, test_receipt,
            test_settler_config,
        },
        types::{ProverErrorCode, ProverFailure, QueryKey},
    };

    fn config() -> ProcessorConfig {
        let retry = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        };
        ProcessorConfig { claim_retry: retry, dead_letter_retry: retry }
    }

    struct Harness {
        processor: ClaimProcessor<MockHandler, MockDeadLetter, MockCommitter>,
        handler: Arc<MockHandler>,
        dead_letters: Arc<MockDeadLetter>,
        committer: Arc<MockCommitter>,
    }

    fn harness(handler: MockHandler, dead_letters: MockDeadLetter) -> Harness {
        let handler = Arc::new(handler);
        let dead_letters = Arc::new(dead_letters);
        let committer = Arc::new(MockCommitter::new());
        let processor = ClaimProcessor::new(
            Arc::clone(&handler),
            Arc::clone(&dead_letters),
            Arc::clone(&committer),
            config(),
        );
        Harness { processor, handler, dead_letters, committer }
    }

    #[tokio::test]
    async fn test_settled_claim_is_committed() {
        let h = harness(MockHandler::new([Ok(test_receipt())]), MockDeadLetter::new());

        h.processor.process(claim_message(0, 5)).await.unwrap();

        assert_eq!(h.handler.calls(), 1);
        assert!(h.dead_letters.published().is_empty());
        assert_eq!(h.committer.committed(), vec![(0, 5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_is_dead_lettered_then_committed() {
        let h = harness(
            MockHandler::new([
                Err(PipelineError::BlockUnavailable),
                Err(PipelineError::BlockUnavailable),
                Err(PipelineError::BlockUnavailable),
            ]),
            MockDeadLetter::new(),
        );

        h.processor.process(claim_message(0, 1)).await.unwrap();

        assert_eq!(h.handler.calls(), 3);
        let published = h.dead_letters.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].error_kind, "block_unavailable");
        assert_eq!(h.committer.committed(), vec![(0, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let h = harness(
            MockHandler::new([
                Err(PipelineError::Attestation(AttestationError::ClientCreation("down".into()))),
                Ok(test_receipt()),
            ]),
            MockDeadLetter::new(),
        );

        h.processor.process(claim_message(0, 2)).await.unwrap();

        assert_eq!(h.handler.calls(), 2);
        assert!(h.dead_letters.published().is_empty());
        assert_eq!(h.committer.committed(), vec![(0, 2)]);
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let h = harness(
            MockHandler::new([Err(PipelineError::ProverRejected(ProverFailure {
                code: ProverErrorCode::InvalidCustomInput,
                message: "unknown order".into(),
            }))]),
            MockDeadLetter::new(),
        );

        h.processor.process(claim_message(1, 9)).await.unwrap();

        assert_eq!(h.handler.calls(), 1);
        assert_eq!(h.dead_letters.published()[0].error_kind, "prover_rejected");
        assert_eq!(h.committer.committed(), vec![(1, 9)]);
    }

    #[tokio::test]
    async fn test_reverted_settlement_is_committed_without_dead_letter() {
        let h = harness(
            MockHandler::new([Err(PipelineError::Settlement(SettlementError::WouldRevert(
                "execution reverted: already requested".into(),
            )))]),
            MockDeadLetter::new(),
        );

        h.processor.process(claim_message(0, 3)).await.unwrap();

        assert_eq!(h.handler.calls(), 1);
        assert!(h.dead_letters.published().is_empty());
        assert_eq!(h.committer.committed(), vec![(0, 3)]);
    }

    #[tokio::test]
    async fn test_undecodable_message_is_dead_lettered() {
        let h = harness(MockHandler::new([]), MockDeadLetter::new());
        let mut message = claim_message(0, 4);
        message.payload = Some(b"{".to_vec());

        h.processor.process(message).await.unwrap();

        assert_eq!(h.handler.calls(), 0);
        assert_eq!(h.dead_letters.published()[0].error_kind, "decode");
        assert_eq!(h.committer.committed(), vec![(0, 4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dead_letter_publish_is_not_committed() {
        let h = harness(
            MockHandler::new([Err(PipelineError::Decode("bad".into()))]),
            MockDeadLetter::failing(),
        );
        let mut message = claim_message(2, 8);
        message.payload = None;

        let err = h.processor.process(message).await.unwrap_err();

        assert!(matches!(err, ConsumerError::DeadLetter { partition: 2, offset: 8, .. }));
        assert!(h.committer.committed().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_is_not_fatal() {
        let h = harness(MockHandler::new([Ok(test_receipt())]), MockDeadLetter::new());
        h.committer.fail_commits();

        assert!(h.processor.process(claim_message(0, 6)).await.is_ok());
        assert!(h.committer.committed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_settlement_is_never_resent() {
        let key = QueryKey { query_hash: B256::repeat_byte(0x55), nonce: 0 };
        let attestation = Arc::new(
            MockAttestation::new(key)
                .with_fresh_nonces()
                .with_status_failures(usize::MAX),
        );
        let contract = Arc::new(MockSettlement::new());
        let prover = Arc::new(MockProver::proof(Bytes::from_static(b"proof")));
        let builder = ProofRequestBuilder::new(
            ChainReader::new(Arc::new(MockChainClient::new().with_receipt_block(1000))),
            TOKEN_ADDRESS,
            U256::ZERO,
        );
        let settler =
            Settler::new(Arc::clone(&attestation), Arc::clone(&contract), test_settler_config());
        let pipeline = Arc::new(ClaimPipeline::new(builder, Arc::clone(&prover), settler));
        let dead_letters = Arc::new(MockDeadLetter::new());
        let committer = Arc::new(MockCommitter::new());
        let processor = ClaimProcessor::new(
            pipeline,
            Arc::clone(&dead_letters),
            Arc::clone(&committer),
            config(),
        );

        processor.process(claim_message(0, 7)).await.unwrap();

        assert_eq!(prover.requests().len(), 1);
        assert_eq!(attestation.submissions().len(), 1);
        assert_eq!(contract.sent(), vec![key]);
        let published = dead_letters.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].error_kind, "unfinalized");
        assert_eq!(committer.committed(), vec![(0, 7)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_finality_failure_settles_once() {
        let key = QueryKey { query_hash: B256::repeat_byte(0x56), nonce: 0 };
        let attestation = Arc::new(
            MockAttestation::new(key)
                .with_fresh_nonces()
                .with_status_failures(1)
                .with_statuses([QueryState::Finalized]),
        );
        let contract = Arc::new(MockSettlement::new());
        let builder = ProofRequestBuilder::new(
            ChainReader::new(Arc::new(MockChainClient::new().with_receipt_block(1000))),
            TOKEN_ADDRESS,
            U256::ZERO,
        );
        let settler =
            Settler::new(Arc::clone(&attestation), Arc::clone(&contract), test_settler_config());
        let pipeline = Arc::new(ClaimPipeline::new(
            builder,
            Arc::new(MockProver::proof(Bytes::from_static(b"proof"))),
            settler,
        ));
        let dead_letters = Arc::new(MockDeadLetter::new());
        let committer = Arc::new(MockCommitter::new());
        let processor = ClaimProcessor::new(
            pipeline,
            Arc::clone(&dead_letters),
            Arc::clone(&committer),
            config(),
        );

        processor.process(claim_message(0, 8)).await.unwrap();

        assert_eq!(attestation.submissions().len(), 1);
        assert_eq!(contract.sent(), vec![key]);
        assert!(dead_letters.published().is_empty());
        assert_eq!(committer.committed(), vec![(0, 8)]);
    }
}
