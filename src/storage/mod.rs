// ============================================================================
// Storage Gateway - durable persistence for order aggregates
// ============================================================================
//
// The repository trait is the seam between the service and PostgreSQL:
// `insert_aggregate` is contractually atomic (all four tables or none),
// reads return `Option` rather than a not-found error.
//
// ============================================================================

mod order_store;
mod pg;
mod transactor;

pub use order_store::PgOrderStore;
pub use pg::connect;
pub use transactor::{PgTransactor, UnitOfWork};

use async_trait::async_trait;

use crate::domain::order::Order;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// Unique-key violation on insert: another writer committed the same
    /// identifier between the duplicate check and this transaction.
    #[error("aggregate with this identifier already exists")]
    Duplicate,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the full aggregate (header + delivery + payment + items) in a
    /// single transaction. Either every row is committed or none are.
    async fn insert_aggregate(&self, order: &Order) -> Result<(), StoreError>;

    /// Point lookup by identifier. `Ok(None)` means the aggregate does not
    /// exist; it is not an error.
    async fn find_by_uid(&self, uid: &str) -> Result<Option<Order>, StoreError>;

    /// Every aggregate currently in storage, for cache warm-up.
    async fn load_all(&self) -> Result<Vec<Order>, StoreError>;
}
