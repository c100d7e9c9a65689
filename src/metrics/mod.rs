// Private module declaration
mod server;

use prometheus::{IntCounter, IntGauge, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Stream ingestion (consumed, decode failures, retries, drops, duplicates)
// - The order cache (hits, misses, size)
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Ingestion Metrics
    pub messages_consumed: IntCounter,
    pub decode_failures: IntCounter,
    pub orders_ingested: IntCounter,
    pub ingest_retries: IntCounter,
    pub orders_dropped: IntCounter,
    pub duplicate_deliveries: IntCounter,

    // Cache Metrics
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_size: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_consumed = IntCounter::new(
            "ingest_messages_consumed_total",
            "Messages received from the order stream",
        )?;
        registry.register(Box::new(messages_consumed.clone()))?;

        let decode_failures = IntCounter::new(
            "ingest_decode_failures_total",
            "Messages dropped because the payload failed to decode",
        )?;
        registry.register(Box::new(decode_failures.clone()))?;

        let orders_ingested = IntCounter::new(
            "ingest_orders_committed_total",
            "Orders successfully persisted from the stream",
        )?;
        registry.register(Box::new(orders_ingested.clone()))?;

        let ingest_retries = IntCounter::new(
            "ingest_retries_total",
            "Write attempts beyond the first per message",
        )?;
        registry.register(Box::new(ingest_retries.clone()))?;

        let orders_dropped = IntCounter::new(
            "ingest_orders_dropped_total",
            "Messages acknowledged after the retry budget was exhausted",
        )?;
        registry.register(Box::new(orders_dropped.clone()))?;

        let duplicate_deliveries = IntCounter::new(
            "ingest_duplicate_deliveries_total",
            "Redeliveries of aggregates that were already committed",
        )?;
        registry.register(Box::new(duplicate_deliveries.clone()))?;

        let cache_hits = IntCounter::new("cache_hits_total", "Reads served from the cache")?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses =
            IntCounter::new("cache_misses_total", "Reads that fell through to storage")?;
        registry.register(Box::new(cache_misses.clone()))?;

        let cache_size = IntGauge::new("cache_entries", "Aggregates currently cached")?;
        registry.register(Box::new(cache_size.clone()))?;

        Ok(Self {
            registry,
            messages_consumed,
            decode_failures,
            orders_ingested,
            ingest_retries,
            orders_dropped,
            duplicate_deliveries,
            cache_hits,
            cache_misses,
            cache_size,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let metrics = Metrics::new().unwrap();

        metrics.messages_consumed.inc();
        metrics.cache_hits.inc();
        metrics.cache_size.set(3);

        let families = metrics.registry().gather();
        assert_eq!(families.len(), 9);
    }
}
