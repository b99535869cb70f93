//! Shared test utilities: mock chain, prover, attestation and settlement
//! clients, consumer stubs and claim fixtures.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::primitives::{Address, B256, Bytes, TxHash, address, b256, keccak256};
use async_trait::async_trait;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};

use crate::{
    attestation::{AttestationClient, AttestationSubmission, QueryState, QueryStatus},
    config::RetryConfig,
    consumer::{
        ClaimMessage, ClaimSource, DeadLetter, DeadLetterPublisher, MessageProcessor,
        OffsetCommitter,
    },
    contracts::SettlementContract,
    error::{AttestationError, ConsumerError, PipelineResult, ProverError, SettlementError},
    pipeline::ClaimHandler,
    prover::ProvingClient,
    rpc::{ChainClient, RpcError, RpcResult},
    settlement::SettlerConfig,
    slot::left_pad_address,
    types::{
        ClaimEvent, CustomInput, ProofRequest, ProofResult, ProverFailure, QueryKey,
        SettlementReceipt, StorageProofEntry,
    },
};

/// Token contract used by the fixtures.
pub(crate) const TOKEN_ADDRESS: Address = address!("6272e5f1ea3a0d8a4a58d2e2e2d9ab2c1c4d8f11");

/// Verifier contract used by the fixtures.
pub(crate) const VERIFIER_ADDRESS: Address = address!("00000000000000000000000000000000000000ee");

/// A claim raised by `0xaaaa..a1` against LP `0xbbbb..b2`.
pub(crate) fn test_claim() -> ClaimEvent {
    ClaimEvent {
        challenger_address: address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1"),
        lp_address: address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2"),
        order_hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
        tx_hash: b256!("2222222222222222222222222222222222222222222222222222222222222222"),
    }
}

/// A valid proof request for [`test_claim`] at block 1001.
pub(crate) fn test_request() -> ProofRequest {
    let event = test_claim();
    let entry = |value: u8| StorageProofEntry {
        address: TOKEN_ADDRESS,
        block_number: 1001,
        slot: B256::repeat_byte(value),
        value: Some(B256::with_last_byte(value)),
    };
    ProofRequest {
        storage: [entry(1), entry(2)],
        custom_input: CustomInput {
            challenger_address: left_pad_address(event.challenger_address),
            order_hash: event.order_hash,
        },
    }
}

/// Settlement on a single chain, polling every 10 seconds without a timeout.
pub(crate) const fn test_settler_config() -> SettlerConfig {
    SettlerConfig {
        src_chain_id: 84532,
        dst_chain_id: 84532,
        destination_contract: VERIFIER_ADDRESS,
        poll_interval: Duration::from_secs(10),
        attestation_timeout: None,
        finality_retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        },
    }
}

/// A settlement receipt for an arbitrary query.
pub(crate) fn test_receipt() -> SettlementReceipt {
    SettlementReceipt {
        tx_hash: TxHash::repeat_byte(0x33),
        query_key: QueryKey { query_hash: B256::repeat_byte(0x44), nonce: 1 },
    }
}

/// A Kafka message carrying [`test_claim`].
pub(crate) fn claim_message(partition: i32, offset: i64) -> ClaimMessage {
    ClaimMessage {
        topic: "raise-claim".to_string(),
        partition,
        offset,
        key: None,
        payload: serde_json::to_vec(&test_claim()).ok(),
        timestamp: 1_700_000_000_000,
    }
}

/// Mock chain with configurable receipt, head and storage.
///
/// Storage reads are recorded; unknown slots read as zero.
#[derive(Debug, Default)]
pub(crate) struct MockChainClient {
    receipt_block: Option<u64>,
    head: Option<u64>,
    storage: HashMap<(Address, B256), B256>,
    fail_storage: bool,
    storage_calls: Mutex<Vec<(Address, B256, u64)>>,
}

impl MockChainClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) const fn with_receipt_block(mut self, block: u64) -> Self {
        self.receipt_block = Some(block);
        self
    }

    pub(crate) const fn with_head(mut self, block: u64) -> Self {
        self.head = Some(block);
        self
    }

    pub(crate) fn with_storage(mut self, address: Address, slot: B256, value: B256) -> Self {
        self.storage.insert((address, slot), value);
        self
    }

    pub(crate) const fn with_storage_failure(mut self) -> Self {
        self.fail_storage = true;
        self
    }

    pub(crate) fn storage_calls(&self) -> Vec<(Address, B256, u64)> {
        self.storage_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn block_number(&self) -> RpcResult<u64> {
        self.head.ok_or_else(|| RpcError::Connection("mock: no head".into()))
    }

    async fn receipt_block_number(&self, tx_hash: TxHash) -> RpcResult<u64> {
        self.receipt_block.ok_or_else(|| RpcError::ReceiptNotFound(tx_hash.to_string()))
    }

    async fn storage_at(&self, address: Address, slot: B256, block: u64) -> RpcResult<B256> {
        self.storage_calls.lock().unwrap().push((address, slot, block));
        if self.fail_storage {
            return Err(RpcError::Transport("mock: storage unavailable".into()));
        }
        Ok(self.storage.get(&(address, slot)).copied().unwrap_or(B256::ZERO))
    }
}

/// Mock prover returning a fixed result and recording requests.
#[derive(Debug)]
pub(crate) struct MockProver {
    result: ProofResult,
    requests: Mutex<Vec<ProofRequest>>,
}

impl MockProver {
    pub(crate) fn proof(proof: Bytes) -> Self {
        Self { result: ProofResult::Proof(proof), requests: Mutex::default() }
    }

    pub(crate) fn failure(failure: ProverFailure) -> Self {
        Self { result: ProofResult::Failed(failure), requests: Mutex::default() }
    }

    pub(crate) fn requests(&self) -> Vec<ProofRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvingClient for MockProver {
    async fn prove(&self, request: &ProofRequest) -> Result<ProofResult, ProverError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.result.clone())
    }
}

/// Mock attestation network.
///
/// Every submission yields the same key unless fresh nonces are enabled, in
/// which case each submission bumps the nonce. Status queries first fail as
/// scripted, then pop the scripted states, repeating the last one; with no
/// script the query stays pending.
#[derive(Debug)]
pub(crate) struct MockAttestation {
    key: QueryKey,
    fresh_nonces: bool,
    statuses: Mutex<VecDeque<QueryState>>,
    status_failures: AtomicUsize,
    status_queries: AtomicUsize,
    submissions: Mutex<Vec<AttestationSubmission>>,
}

impl MockAttestation {
    pub(crate) fn new(key: QueryKey) -> Self {
        Self {
            key,
            fresh_nonces: false,
            statuses: Mutex::default(),
            status_failures: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
            submissions: Mutex::default(),
        }
    }

    pub(crate) fn with_statuses(self, statuses: impl IntoIterator<Item = QueryState>) -> Self {
        self.statuses.lock().unwrap().extend(statuses);
        self
    }

    pub(crate) const fn with_fresh_nonces(mut self) -> Self {
        self.fresh_nonces = true;
        self
    }

    pub(crate) fn with_status_failures(self, count: usize) -> Self {
        self.status_failures.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub(crate) fn submissions(&self) -> Vec<AttestationSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttestationClient for MockAttestation {
    async fn submit(
        &self,
        submission: &AttestationSubmission,
    ) -> Result<QueryKey, AttestationError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(submission.clone());
        let mut key = self.key;
        if self.fresh_nonces {
            key.nonce += submissions.len() as u64 - 1;
        }
        Ok(key)
    }

    async fn query_status(
        &self,
        _key: &QueryKey,
        _chain_id: u64,
    ) -> Result<QueryStatus, AttestationError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .status_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AttestationError::ClientCreation("mock: connection reset".into()));
        }
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap_or(QueryState::Pending)
        } else {
            statuses.front().copied().unwrap_or(QueryState::Pending)
        };
        Ok(QueryStatus { status, reason: None })
    }
}

/// Mock settlement contract that rejects a query key it has already seen.
#[derive(Debug, Default)]
pub(crate) struct MockSettlement {
    sent: Mutex<Vec<QueryKey>>,
}

impl MockSettlement {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_sent(self, keys: impl IntoIterator<Item = QueryKey>) -> Self {
        self.sent.lock().unwrap().extend(keys);
        self
    }

    pub(crate) fn sent(&self) -> Vec<QueryKey> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementContract for MockSettlement {
    async fn send_request(&self, key: &QueryKey) -> Result<TxHash, SettlementError> {
        let tx_hash = keccak256(key.query_hash);
        let mut sent = self.sent.lock().unwrap();
        if sent.contains(key) {
            return Err(SettlementError::Reverted { tx_hash });
        }
        sent.push(*key);
        Ok(tx_hash)
    }
}

/// Mock claim handler returning scripted results, then successes.
#[derive(Debug)]
pub(crate) struct MockHandler {
    results: Mutex<VecDeque<PipelineResult<SettlementReceipt>>>,
    calls: AtomicUsize,
}

impl MockHandler {
    pub(crate) fn new(results: impl IntoIterator<Item = PipelineResult<SettlementReceipt>>) -> Self {
        Self { results: Mutex::new(results.into_iter().collect()), calls: AtomicUsize::new(0) }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaimHandler for MockHandler {
    async fn handle(&self, _event: &ClaimEvent) -> PipelineResult<SettlementReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| Ok(test_receipt()))
    }
}

/// Mock dead-letter publisher recording what it publishes.
#[derive(Debug, Default)]
pub(crate) struct MockDeadLetter {
    fail: bool,
    published: Mutex<Vec<DeadLetter>>,
}

impl MockDeadLetter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub(crate) fn published(&self) -> Vec<DeadLetter> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterPublisher for MockDeadLetter {
    async fn publish(&self, letter: &DeadLetter) -> Result<(), ConsumerError> {
        if self.fail {
            return Err(ConsumerError::Kafka(KafkaError::MessageProduction(
                RDKafkaErrorCode::MessageTimedOut,
            )));
        }
        self.published.lock().unwrap().push(letter.clone());
        Ok(())
    }
}

/// Mock offset committer recording `(partition, offset)` pairs.
#[derive(Debug, Default)]
pub(crate) struct MockCommitter {
    fail: AtomicBool,
    committed: Mutex<Vec<(i32, i64)>>,
}

impl MockCommitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_commits(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn committed(&self) -> Vec<(i32, i64)> {
        self.committed.lock().unwrap().clone()
    }
}

impl OffsetCommitter for MockCommitter {
    fn commit(&self, message: &ClaimMessage) -> Result<(), ConsumerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConsumerError::Kafka(KafkaError::ConsumerCommit(
                RDKafkaErrorCode::RebalanceInProgress,
            )));
        }
        self.committed.lock().unwrap().push((message.partition, message.offset));
        Ok(())
    }
}

/// Mock claim source yielding scripted messages, then waiting forever.
#[derive(Debug, Default)]
pub(crate) struct MockSource {
    messages: Mutex<VecDeque<ClaimMessage>>,
    leading_errors: AtomicUsize,
    recv_calls: AtomicUsize,
}

impl MockSource {
    pub(crate) fn new(messages: Vec<ClaimMessage>) -> Self {
        Self { messages: Mutex::new(messages.into()), ..Self::default() }
    }

    pub(crate) fn with_leading_errors(self, count: usize) -> Self {
        self.leading_errors.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn recv_calls(&self) -> usize {
        self.recv_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaimSource for MockSource {
    async fn recv(&self) -> Result<ClaimMessage, ConsumerError> {
        self.recv_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .leading_errors
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ConsumerError::Kafka(KafkaError::MessageConsumption(
                RDKafkaErrorCode::BrokerTransportFailure,
            )));
        }
        let next = self.messages.lock().unwrap().pop_front();
        match next {
            Some(message) => Ok(message),
            None => std::future::pending().await,
        }
    }
}

/// Mock message processor recording `(partition, offset)` pairs.
///
/// Fails with a dead-letter error on the configured message.
#[derive(Debug, Default)]
pub(crate) struct MockProcessor {
    fail_at: Option<(i32, i64)>,
    processed: Mutex<Vec<(i32, i64)>>,
}

impl MockProcessor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) const fn fail_at(mut self, partition: i32, offset: i64) -> Self {
        self.fail_at = Some((partition, offset));
        self
    }

    pub(crate) fn processed(&self) -> Vec<(i32, i64)> {
        self.processed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageProcessor for MockProcessor {
    async fn process(&self, message: ClaimMessage) -> Result<(), ConsumerError> {
        if self.fail_at == Some((message.partition, message.offset)) {
            return Err(ConsumerError::DeadLetter {
                topic: message.topic,
                partition: message.partition,
                offset: message.offset,
                reason: "mock: publish failed".into(),
            });
        }
        tokio::task::yield_now().await;
        self.processed.lock().unwrap().push((message.partition, message.offset));
        Ok(())
    }
}
