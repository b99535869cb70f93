//! Kafka client construction.

use std::{collections::HashMap, fs, path::Path};

use rdkafka::{config::ClientConfig, consumer::StreamConsumer, producer::FutureProducer};

use crate::{config::KafkaConfig, error::ConsumerError};

/// Parses librdkafka properties in `key=value` form, one per line.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn parse_kafka_properties(contents: &str) -> HashMap<String, String> {
    let mut config = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            config.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    config
}

/// Loads librdkafka properties from a file.
pub fn load_kafka_config_from_file(
    properties_file_path: &Path,
) -> Result<HashMap<String, String>, std::io::Error> {
    let kafka_properties = fs::read_to_string(properties_file_path)?;
    Ok(parse_kafka_properties(&kafka_properties))
}

/// Applies the optional properties file and the broker list to `client_config`.
fn apply_common_config(
    client_config: &mut ClientConfig,
    config: &KafkaConfig,
) -> Result<(), ConsumerError> {
    if let Some(path) = &config.properties_file {
        let properties = load_kafka_config_from_file(path).map_err(|e| {
            ConsumerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        for (key, value) in properties {
            client_config.set(key, value);
        }
    }
    client_config.set("bootstrap.servers", &config.brokers);
    Ok(())
}

/// Builds the consumer configuration.
///
/// Offsets are only ever committed explicitly, so `enable.auto.commit` is
/// always disabled regardless of the properties file.
pub fn consumer_client_config(config: &KafkaConfig) -> Result<ClientConfig, ConsumerError> {
    let mut client_config = ClientConfig::new();
    client_config.set("auto.offset.reset", "earliest");
    apply_common_config(&mut client_config, config)?;
    client_config
        .set("group.id", &config.group_id)
        .set("enable.auto.commit", "false")
        .set("enable.partition.eof", "false");
    Ok(client_config)
}

/// Creates the claim consumer.
pub fn create_kafka_consumer(config: &KafkaConfig) -> Result<StreamConsumer, ConsumerError> {
    let consumer: StreamConsumer = consumer_client_config(config)?.create()?;
    Ok(consumer)
}

/// Creates the dead-letter producer.
pub fn create_kafka_producer(config: &KafkaConfig) -> Result<FutureProducer, ConsumerError> {
    let mut client_config = ClientConfig::new();
    apply_common_config(&mut client_config, config)?;
    let producer: FutureProducer = client_config.create()?;
    Ok(producer)
}
