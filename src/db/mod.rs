//! Database pool setup.
//!
//! The schema ships with the binary: `init_pool` connects and runs the
//! embedded migrations before the pool is handed to the router, so a
//! fresh Postgres database needs no out-of-band setup step.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Pool size when `DB_MAX_CONNECTIONS` is unset.
const DEFAULT_POOL_SIZE: u32 = 5;

/// Connect to Postgres and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_POOL_SIZE);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}
