//! Owned claim messages received from Kafka.

use std::time::{SystemTime, UNIX_EPOCH};

use rdkafka::{Message, Timestamp};

use crate::{error::PipelineError, types::ClaimEvent};

/// A claim message detached from the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMessage {
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Record key, if any.
    pub key: Option<Vec<u8>>,
    /// Raw payload, if any.
    pub payload: Option<Vec<u8>>,
    /// Broker timestamp in milliseconds, or receive time when unavailable.
    pub timestamp: i64,
}

impl ClaimMessage {
    /// Copies the fields of a received Kafka message.
    pub fn from_kafka<M: Message>(message: &M) -> Self {
        let timestamp = match message.timestamp() {
            Timestamp::CreateTime(millis) | Timestamp::LogAppendTime(millis) => millis,
            Timestamp::NotAvailable => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
        };

        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
            timestamp,
        }
    }

    /// Decodes the payload as a claim event.
    pub fn decode(&self) -> Result<ClaimEvent, PipelineError> {
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| PipelineError::Decode("message has no payload".into()))?;
        serde_json::from_slice(payload).map_err(|e| PipelineError::Decode(e.to_string()))
    }
}
