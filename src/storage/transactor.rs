use sqlx::postgres::PgPool;
use sqlx::{PgConnection, Postgres, Transaction};

use super::StoreError;

// ============================================================================
// Transaction Coordinator
// ============================================================================
//
// A write that spans several tables runs inside one `UnitOfWork`. Storage
// calls join the transaction by executing on the connection the unit hands
// out; commit and rollback consume the unit, so it cannot be cached or
// reused after the enclosing write finishes.
//
// Nesting is not supported: one logical aggregate write opens exactly one
// transaction.
//
// ============================================================================

pub struct PgTransactor {
    pool: PgPool,
}

impl PgTransactor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<UnitOfWork, StoreError> {
        let tx = self.pool.begin().await.map_err(StoreError::Begin)?;
        tracing::debug!("transaction began");
        Ok(UnitOfWork { tx })
    }
}

/// A scoped, single-use transaction handle. Valid only for the duration of
/// the enclosing write.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    /// The transaction's connection; queries executed on it join the
    /// transaction.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// A commit failure means the work's effects must not be trusted as
    /// durable; it surfaces as `StoreError::Commit`.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::Commit)?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// A rollback failure is logged but never masks the error that caused
    /// the rollback; the caller's original failure is what propagates.
    pub async fn rollback(self) {
        if let Err(err) = self.tx.rollback().await {
            tracing::error!(error = %err, "failed to roll back transaction");
        }
    }
}
