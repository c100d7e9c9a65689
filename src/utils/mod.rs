pub mod backoff;
pub mod circuit_breaker;

pub use backoff::{
    exponential_delay, full_jitter_delay, retry_on_transient, IsTransient, RetryConfig,
    RetryResult,
};
pub use circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
