use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::PostgresConfig;

use super::StoreError;

/// Open the connection pool and verify connectivity with a ping before the
/// rest of the system starts depending on it.
pub async fn connect(cfg: &PostgresConfig) -> Result<PgPool, StoreError> {
    tracing::info!(
        host = %cfg.host,
        port = %cfg.port,
        database = %cfg.database,
        "connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.dsn())
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!("database connection established");
    Ok(pool)
}
