//! Claim event consumption.
//!
//! Messages are received from Kafka, routed to one ordered worker per
//! partition, run through the claim pipeline and committed only after the
//! outcome has been applied.

mod dead_letter;
pub use dead_letter::{
    DeadLetter, DeadLetterPublisher, KafkaDeadLetterPublisher, LoggingDeadLetterPublisher,
};

mod message;
pub use message::ClaimMessage;

mod processor;
pub use processor::{ClaimProcessor, MessageProcessor, ProcessorConfig};

mod source;
pub use source::{ClaimSource, ConsumerState, KafkaClaimSource, OffsetCommitter};

mod workers;
pub use workers::{ClaimConsumer, PartitionWorkers};
