//! Dead-letter records for claims that could not be settled.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::ClaimMessage;
use crate::{
    constants::DEAD_LETTER_SEND_TIMEOUT,
    error::{ConsumerError, PipelineError},
};

/// Record published for a claim that could not be settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Source offset.
    pub offset: i64,
    /// Source record key, lossily decoded.
    pub key: Option<String>,
    /// Source payload, lossily decoded.
    pub payload: Option<String>,
    /// Error kind, as used in the failure metric.
    pub error_kind: String,
    /// Error message.
    pub error: String,
    /// Failure time in milliseconds since the epoch.
    pub failed_at: i64,
}

impl DeadLetter {
    /// Builds the record for `message` failing with `err`.
    pub fn new(message: &ClaimMessage, err: &PipelineError) -> Self {
        Self {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            key: message.key.as_deref().map(|k| String::from_utf8_lossy(k).into_owned()),
            payload: message.payload.as_deref().map(|p| String::from_utf8_lossy(p).into_owned()),
            error_kind: err.kind().to_string(),
            error: err.to_string(),
            failed_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
        }
    }

    /// Key of the dead-letter record: the source key, else `partition-offset`.
    pub fn record_key(&self) -> String {
        self.key.clone().unwrap_or_else(|| format!("{}-{}", self.partition, self.offset))
    }
}

/// Publishes dead letters.
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    /// Publishes one dead letter.
    async fn publish(&self, letter: &DeadLetter) -> Result<(), ConsumerError>;
}

/// Publishes dead letters to a Kafka topic.
#[derive(Clone)]
pub struct KafkaDeadLetterPublisher {
    producer: FutureProducer,
    topic: String,
}

impl std::fmt::Debug for KafkaDeadLetterPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaDeadLetterPublisher")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl KafkaDeadLetterPublisher {
    /// Creates a publisher for `topic`.
    pub const fn new(producer: FutureProducer, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl DeadLetterPublisher for KafkaDeadLetterPublisher {
    async fn publish(&self, letter: &DeadLetter) -> Result<(), ConsumerError> {
        let key = letter.record_key();
        let payload = serde_json::to_vec(letter)?;
        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, DEAD_LETTER_SEND_TIMEOUT).await {
            Ok(_) => {
                debug!(
                    key = %key,
                    topic = %self.topic,
                    payload_size = payload.len(),
                    "Published dead letter"
                );
                Ok(())
            }
            Err((err, _)) => {
                error!(key = %key, topic = %self.topic, error = %err, "Failed to publish dead letter");
                Err(err.into())
            }
        }
    }
}

/// Logs dead letters instead of publishing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDeadLetterPublisher;

#[async_trait]
impl DeadLetterPublisher for LoggingDeadLetterPublisher {
    async fn publish(&self, letter: &DeadLetter) -> Result<(), ConsumerError> {
        error!(
            topic = %letter.topic,
            partition = letter.partition,
            offset = letter.offset,
            key = ?letter.key,
            payload = ?letter.payload,
            error_kind = %letter.error_kind,
            error = %letter.error,
            "Claim failed terminally"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: Option<&[u8]>) -> ClaimMessage {
        ClaimMessage {
            topic: "raise-claim".into(),
            partition: 3,
            offset: 17,
            key: key.map(<[u8]>::to_vec),
            payload: Some(b"not json".to_vec()),
            timestamp: 0,
        }
    }

    #[test]
    fn test_dead_letter_from_decode_error() {
        let msg = message(None);
        let err = msg.decode().unwrap_err();

        let letter = DeadLetter::new(&msg, &err);

        assert_eq!(letter.error_kind, "decode");
        assert_eq!(letter.payload.as_deref(), Some("not json"));
        assert_eq!(letter.record_key(), "3-17");
        assert!(letter.failed_at > 0);
    }

    #[test]
    fn test_dead_letter_keeps_source_key() {
        let msg = message(Some(b"order-9"));
        let letter = DeadLetter::new(&msg, &PipelineError::BlockUnavailable);
        assert_eq!(letter.record_key(), "order-9");
    }

    #[test]
    fn test_dead_letter_json_fields() {
        let letter = DeadLetter::new(&message(None), &PipelineError::BlockUnavailable);
        let json = serde_json::to_value(&letter).unwrap();
        assert_eq!(json["errorKind"], "block_unavailable");
        assert_eq!(json["partition"], 3);
        assert!(json.get("failedAt").is_some());
    }

    #[tokio::test]
    async fn test_logging_publisher_never_fails() {
        let letter = DeadLetter::new(&message(None), &PipelineError::BlockUnavailable);
        assert!(LoggingDeadLetterPublisher.publish(&letter).await.is_ok());
    }
}
