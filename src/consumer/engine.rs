use std::sync::Arc;
use std::time::Duration;

use rdkafka::client::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer,
};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::topic_partition_list::TopicPartitionList;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::KafkaConfig;
use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::service::{OrderService, OrderServiceError};
use crate::utils::{full_jitter_delay, retry_on_transient, RetryConfig, RetryResult};

use super::ReadinessGate;

// ============================================================================
// Ingestion Retry Engine
// ============================================================================
//
// Per-message flow:
//   received -> decode -> add_order (bounded retry) -> acknowledge
//
// A malformed payload is acknowledged immediately: it will decode no better
// on redelivery. InvalidInput and AlreadyExists are terminal; only storage
// faults burn the retry budget. When the budget is exhausted the message is
// still acknowledged so one poison message cannot stall the partition.
// There is no durable overflow for exhausted messages; the drop is logged
// and counted, which is the known gap of this path.
//
// Stream-level receive errors (group coordination, broker loss) are retried
// forever at their own capped backoff; that loop is about keeping the group
// membership alive and is separate from the per-message budget.
//
// ============================================================================

/// Base delay for the stream-level receive retry loop.
const STREAM_RETRY_BASE: Duration = Duration::from_secs(1);
/// Cap for the stream-level loop.
const STREAM_RETRY_CAP: Duration = Duration::from_secs(60);

/// Rebalance listener driving the readiness gate from partition assignment.
struct IngestContext {
    gate: Arc<ReadinessGate>,
}

impl ClientContext for IngestContext {}

impl ConsumerContext for IngestContext {
    fn pre_rebalance(&self, _consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        if let Rebalance::Revoke(partitions) = rebalance {
            tracing::info!(
                partitions = partitions.count(),
                "partitions being revoked, rearming readiness gate"
            );
            self.gate.rearm();
        }
    }

    fn post_rebalance(&self, _consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                tracing::info!(
                    partitions = partitions.count(),
                    "partitions assigned, consumer ready"
                );
                self.gate.open();
            }
            Rebalance::Revoke(_) => {}
            Rebalance::Error(err) => {
                tracing::error!(error = %err, "rebalance failed");
            }
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "offset commit failed");
        }
    }
}

pub struct OrderConsumer {
    consumer: StreamConsumer<IngestContext>,
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
    gate: Arc<ReadinessGate>,
}

impl OrderConsumer {
    pub fn new(
        cfg: &KafkaConfig,
        service: Arc<OrderService>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, KafkaError> {
        let gate = Arc::new(ReadinessGate::new());

        let consumer: StreamConsumer<IngestContext> = ClientConfig::new()
            .set("bootstrap.servers", &cfg.brokers)
            .set("group.id", &cfg.group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "6000")
            .create_with_context(IngestContext { gate: gate.clone() })?;

        consumer.subscribe(&[cfg.topic.as_str()])?;

        Ok(Self {
            consumer,
            service,
            metrics,
            retry: RetryConfig::ingest(),
            gate,
        })
    }

    /// The gate fired when this consumer's partitions are assigned.
    pub fn readiness(&self) -> Arc<ReadinessGate> {
        self.gate.clone()
    }

    /// Consume until cancelled. On cancellation the loop stops claiming
    /// messages and leaves the group cleanly.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut stream_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.consumer.recv() => match received {
                    Ok(message) => {
                        stream_failures = 0;
                        self.process_message(&message, &cancel).await;
                    }
                    Err(err) => {
                        stream_failures = stream_failures.saturating_add(1);
                        let delay = full_jitter_delay(
                            stream_failures,
                            STREAM_RETRY_BASE,
                            STREAM_RETRY_CAP,
                        );
                        tracing::error!(
                            error = %err,
                            consecutive = stream_failures,
                            delay_ms = delay.as_millis() as u64,
                            "stream receive failed, backing off"
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = sleep(delay) => {}
                        }
                    }
                }
            }
        }

        self.consumer.unsubscribe();
        tracing::info!("consumer stopped, left the group");
    }

    async fn process_message(&self, message: &BorrowedMessage<'_>, cancel: &CancellationToken) {
        self.metrics.messages_consumed.inc();
        tracing::info!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "message received"
        );

        let payload = message.payload().unwrap_or_default();
        let order = match decode_order(payload) {
            Ok(order) => order,
            Err(err) => {
                // will decode no better on redelivery
                tracing::error!(error = %err, "malformed order payload, dropping message");
                self.metrics.decode_failures.inc();
                self.acknowledge(message);
                return;
            }
        };

        let result = retry_on_transient(&self.retry, cancel, |attempt| {
            if attempt > 1 {
                self.metrics.ingest_retries.inc();
            }
            self.service.add_order(&order)
        })
        .await;

        match result {
            RetryResult::Success(()) => {
                self.metrics.orders_ingested.inc();
                tracing::info!(order_uid = %order.order_uid, "order ingested");
            }
            RetryResult::PermanentFailure(OrderServiceError::AlreadyExists(uid)) => {
                // redelivery of an already-committed aggregate
                self.metrics.duplicate_deliveries.inc();
                tracing::info!(order_uid = %uid, "duplicate delivery, already stored");
            }
            RetryResult::PermanentFailure(err) => {
                tracing::warn!(order_uid = %order.order_uid, error = %err, "order rejected");
            }
            RetryResult::Failed(err) => {
                self.metrics.orders_dropped.inc();
                tracing::error!(
                    order_uid = %order.order_uid,
                    error = %err,
                    "order dropped after retry budget exhausted"
                );
            }
            RetryResult::Cancelled(err) => {
                // left unacknowledged: redelivered after restart
                tracing::info!(
                    order_uid = %order.order_uid,
                    error = %err,
                    "shutdown during retry, message left unacknowledged"
                );
                return;
            }
        }

        self.acknowledge(message);
    }

    fn acknowledge(&self, message: &BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.commit_message(message, CommitMode::Async) {
            tracing::warn!(error = %err, "failed to commit offset");
        }
    }
}

fn decode_order(payload: &[u8]) -> Result<Order, serde_json::Error> {
    serde_json::from_slice(payload)
}

// ============================================================================
// Unit Tests
// ============================================================================
