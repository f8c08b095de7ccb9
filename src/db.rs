//! SQLite pool setup and the embedded schema.

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, time::Duration};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Statement that opens every write unit of work. Takes SQLite's writer
/// lock up front so the reads that guard a write cannot go stale.
pub const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// Open a pool for `database_url`, creating the file and its parent
/// directory if needed.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parsing database url `{}`", database_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {}", database_url))?;
    Ok(pool)
}

/// Apply the embedded schema. Every statement is idempotent.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::test_pool;
    use uuid::Uuid;

    async fn vehicle_rows(pool: &sqlx::SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM vehicles")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_pools_are_isolated_and_leave_no_file() {
        let first = test_pool().await;
        let second = test_pool().await;
        sqlx::query(
            "INSERT INTO vehicles (id, license_plate, vehicle_type, user_id)
             VALUES (?, 'KA01AA0001', 'car', ?)",
        )
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .execute(&*first)
        .await
        .unwrap();

        assert_eq!(vehicle_rows(&first).await, 1);
        assert_eq!(vehicle_rows(&second).await, 0);
        assert!(!std::path::Path::new(":memory:").exists());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = test_pool().await;
        super::run_migrations(&pool).await.unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
             ('parking_lots', 'parking_spots', 'vehicles', 'bookings', 'reservations')",
        )
        .fetch_one(&*pool)
        .await
        .unwrap();
        assert_eq!(tables, 5);
    }
}
