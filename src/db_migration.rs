use crate::errors::{DbError, DbResult};
use sqlx::SqlitePool;

// Embed all migration SQL files at compile time
const MIGRATION_MARKETPLACE: &str = include_str!("../migrations/20250601000000_marketplace.sql");
const MIGRATION_DISCOUNTS: &str = include_str!("../migrations/20250602000000_discounts.sql");
const MIGRATION_DELETION_LOGS: &str = include_str!("../migrations/20250603000000_deletion_logs.sql");

// List of migrations with their names and SQL content
const MIGRATIONS: &[(&str, &str)] = &[
    ("20250601000000_marketplace.sql", MIGRATION_MARKETPLACE),
    ("20250602000000_discounts.sql", MIGRATION_DISCOUNTS),
    ("20250603000000_deletion_logs.sql", MIGRATION_DELETION_LOGS),
];

/// Apply every migration that has not been recorded yet
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    log::debug!("Starting database migration process");

    create_migrations_table(pool).await?;

    let last_migration = get_last_migration(pool).await?;
    match &last_migration {
        Some(name) => log::debug!("Last applied migration: {}", name),
        None => log::debug!("No migrations applied yet"),
    }

    apply_pending_migrations(pool, last_migration).await?;

    log::info!("Database migration process completed");
    Ok(())
}

/// Create migrations table if it doesn't exist
async fn create_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

/// Get the last applied migration
async fn get_last_migration(pool: &SqlitePool) -> DbResult<Option<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM migrations ORDER BY id DESC LIMIT 1"
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to get last migration: {}", e)))
}

fn get_pending_migrations(last_migration: Option<String>) -> DbResult<Vec<(&'static str, &'static str)>> {
    match last_migration {
        None => Ok(MIGRATIONS.to_vec()),
        Some(last) => {
            let position = MIGRATIONS
                .iter()
                .position(|(name, _)| *name == last)
                .ok_or_else(|| DbError::Migration(format!("Unknown migration recorded: {}", last)))?;
            Ok(MIGRATIONS[position + 1..].to_vec())
        }
    }
}

/// Apply pending migrations inside a single transaction
async fn apply_pending_migrations(pool: &SqlitePool, last_migration: Option<String>) -> DbResult<()> {
    let pending_migrations = get_pending_migrations(last_migration)?;

    if pending_migrations.is_empty() {
        log::debug!("No pending migrations to apply");
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for (migration_name, migration_sql) in pending_migrations {
        log::debug!("Applying migration: {}", migration_name);

        if let Err(e) = sqlx::raw_sql(migration_sql).execute(&mut *tx).await {
            let _ = tx.rollback().await;
            return Err(DbError::Migration(format!(
                "Failed to apply migration {}: {}",
                migration_name, e
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        if let Err(e) = sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
            .bind(migration_name)
            .bind(now)
            .execute(&mut *tx)
            .await
        {
            let _ = tx.rollback().await;
            return Err(DbError::Migration(format!(
                "Failed to record migration {}: {}",
                migration_name, e
            )));
        }
    }

    tx.commit().await?;
    Ok(())
}
