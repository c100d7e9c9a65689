use std::time::Duration;

use anyhow::Result;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::utils::{BreakerConfig, CircuitBreaker};

/// Kafka producer guarded by a circuit breaker, so a dead broker fails fast
/// instead of stacking up blocked sends.
pub struct KafkaPublisher {
    producer: FutureProducer,
    breaker: CircuitBreaker,
}

impl KafkaPublisher {
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            breaker: CircuitBreaker::new(BreakerConfig::default()),
        })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        if !self.breaker.allow() {
            anyhow::bail!("circuit breaker open, broker unavailable");
        }

        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
        {
            Ok(_) => {
                self.breaker.on_success();
                tracing::info!(topic, key, "message published");
                Ok(())
            }
            Err((err, _)) => {
                self.breaker.on_failure();
                tracing::error!(error = %err, topic, "publish failed");
                Err(err.into())
            }
        }
    }
}
