//! Kafka claim source and offset commits.

use async_trait::async_trait;
use rdkafka::{
    Offset, TopicPartitionList,
    consumer::{CommitMode, Consumer, StreamConsumer},
};
use tracing::{debug, info};

use super::ClaimMessage;
use crate::error::ConsumerError;

/// Source of claim messages.
#[async_trait]
pub trait ClaimSource: Send + Sync {
    /// Waits for the next message.
    async fn recv(&self) -> Result<ClaimMessage, ConsumerError>;
}

/// Commits consumed offsets.
pub trait OffsetCommitter: Send + Sync {
    /// Marks `message` as consumed, so the group resumes after it.
    fn commit(&self, message: &ClaimMessage) -> Result<(), ConsumerError>;
}

/// Lifecycle of the Kafka claim source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Client created, no subscription yet.
    Connected,
    /// Subscribed to the claim topic; messages can be received.
    Subscribed,
}

/// Reads claim messages from a Kafka topic and commits their offsets.
pub struct KafkaClaimSource {
    consumer: StreamConsumer,
    topic: String,
    state: ConsumerState,
}

impl std::fmt::Debug for KafkaClaimSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaClaimSource")
            .field("topic", &self.topic)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl KafkaClaimSource {
    /// Wraps a connected consumer.
    pub const fn new(consumer: StreamConsumer, topic: String) -> Self {
        Self { consumer, topic, state: ConsumerState::Connected }
    }

    /// Subscribes to the claim topic. Subscribing twice is a no-op.
    pub fn subscribe(&mut self) -> Result<(), ConsumerError> {
        if self.state == ConsumerState::Subscribed {
            return Ok(());
        }
        self.consumer.subscribe(&[&self.topic])?;
        self.state = ConsumerState::Subscribed;
        info!(topic = %self.topic, "Subscribed to claim topic");
        Ok(())
    }

    /// Returns the current lifecycle state.
    pub const fn state(&self) -> ConsumerState {
        self.state
    }

    /// Returns the claim topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl ClaimSource for KafkaClaimSource {
    async fn recv(&self) -> Result<ClaimMessage, ConsumerError> {
        if self.state != ConsumerState::Subscribed {
            return Err(ConsumerError::Config(format!("not subscribed to {}", self.topic)));
        }
        let message = self.consumer.recv().await?;
        let message = ClaimMessage::from_kafka(&message);
        debug!(
            partition = message.partition,
            offset = message.offset,
            timestamp = message.timestamp,
            "Received claim message"
        );
        Ok(message)
    }
}

impl OffsetCommitter for KafkaClaimSource {
    fn commit(&self, message: &ClaimMessage) -> Result<(), ConsumerError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }
}
