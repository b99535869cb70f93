//! Ordered per-partition workers and the consumer receive loop.

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{ClaimMessage, ClaimSource, MessageProcessor};
use crate::{constants::RECEIVE_ERROR_BACKOFF, error::ConsumerError};

/// One worker task per partition, fed through bounded channels.
///
/// Each worker processes its partition strictly in order. A shared semaphore
/// bounds the number of claims in flight across all partitions.
#[derive(Debug)]
pub struct PartitionWorkers<P> {
    processor: Arc<P>,
    senders: HashMap<i32, mpsc::Sender<ClaimMessage>>,
    tasks: JoinSet<Result<(), ConsumerError>>,
    permits: Arc<Semaphore>,
    buffer_size: usize,
    cancel: CancellationToken,
}

impl<P: MessageProcessor + 'static> PartitionWorkers<P> {
    /// Creates an empty pool.
    pub fn new(
        processor: Arc<P>,
        max_concurrent_claims: usize,
        buffer_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            processor,
            senders: HashMap::new(),
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_claims)),
            buffer_size,
            cancel,
        }
    }

    /// Returns whether any worker task is still tracked.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queues `message` on its partition's worker, spawning the worker on first use.
    ///
    /// Waits while the partition's queue is full, unless shutdown is requested.
    pub async fn dispatch(&mut self, message: ClaimMessage) -> Result<(), ConsumerError> {
        let partition = message.partition;
        if !self.senders.contains_key(&partition) {
            let sender = self.spawn_worker(partition);
            self.senders.insert(partition, sender);
        }
        let Some(sender) = self.senders.get(&partition) else {
            return Err(ConsumerError::Worker(format!("no worker for partition {partition}")));
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            sent = sender.send(message) => sent.map_err(|_| {
                ConsumerError::Worker(format!("worker for partition {partition} stopped"))
            }),
        }
    }

    fn spawn_worker(&mut self, partition: i32) -> mpsc::Sender<ClaimMessage> {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        self.tasks.spawn(run_worker(
            partition,
            rx,
            Arc::clone(&self.processor),
            Arc::clone(&self.permits),
            self.cancel.clone(),
        ));
        debug!(partition, "Spawned partition worker");
        tx
    }

    /// Waits for the next worker to exit.
    ///
    /// Returns `None` when no workers are running.
    pub async fn join_next(&mut self) -> Option<Result<(), ConsumerError>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.unwrap_or_else(|e| Err(ConsumerError::Worker(e.to_string()))))
    }

    /// Closes every queue and waits for the workers to finish their current claim.
    ///
    /// Returns the first worker error, if any.
    pub async fn shutdown(mut self) -> Result<(), ConsumerError> {
        self.senders.clear();
        let mut first_error = None;
        while let Some(result) = self.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "Partition worker failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn run_worker<P: MessageProcessor>(
    partition: i32,
    mut rx: mpsc::Receiver<ClaimMessage>,
    processor: Arc<P>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) -> Result<(), ConsumerError> {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let _permit = permits
            .acquire()
            .await
            .map_err(|e| ConsumerError::Worker(format!("concurrency gate closed: {e}")))?;
        processor.process(message).await?;
    }

    debug!(partition, "Partition worker stopped");
    Ok(())
}

/// Receives claim messages and routes them to partition workers until shutdown.
#[derive(Debug)]
pub struct ClaimConsumer<S, P> {
    source: Arc<S>,
    workers: PartitionWorkers<P>,
    cancel: CancellationToken,
}

impl<S, P> ClaimConsumer<S, P>
where
    S: ClaimSource,
    P: MessageProcessor + 'static,
{
    /// Creates a new consumer.
    pub const fn new(
        source: Arc<S>,
        workers: PartitionWorkers<P>,
        cancel: CancellationToken,
    ) -> Self {
        Self { source, workers, cancel }
    }

    /// Runs the receive loop.
    ///
    /// Stops on cancellation or when a worker fails, then shuts the workers
    /// down and returns the worker error, if any. Broker receive errors are
    /// logged and retried after a backoff.
    pub async fn run(mut self) -> Result<(), ConsumerError> {
        info!("Claim consumer started");

        let result = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Claim consumer received shutdown signal");
                    break Ok(());
                }
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "Partition worker failed, stopping consumer");
                        break Err(err);
                    }
                }
                received = self.source.recv() => match received {
                    Ok(message) => {
                        if let Err(err) = self.workers.dispatch(message).await {
                            break Err(err);
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "Error receiving claim message");
                        sleep(RECEIVE_ERROR_BACKOFF).await;
                    }
                },
            }
        };

        self.cancel.cancel();
        let shutdown = self.workers.shutdown().await;
        info!("Claim consumer stopped");
        // Worker errors take precedence over the closed-channel error they cause.
        match shutdown {
            Err(err) => Err(err),
            Ok(()) => result,
        }
    }
}
