// ============================================================================
// Stream Ingestion
// ============================================================================
//
// Consumes the order topic as part of a consumer group, writes each decoded
// order through the cache service with a bounded retry budget, and gates
// downstream startup on the first partition assignment.
//
// ============================================================================

mod engine;
mod readiness;

pub use engine::OrderConsumer;
pub use readiness::ReadinessGate;
