use sqlx::{Executor, Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup
const MIGRATIONS: [(&str, &str); 3] = [
    ("0001_create_users", include_str!("../migrations/0001_create_users.sql")),
    ("0002_create_connections", include_str!("../migrations/0002_create_connections.sql")),
    ("0003_create_chats", include_str!("../migrations/0003_create_chats.sql")),
];

/// Apply every migration in order. Each file is idempotent (`IF NOT EXISTS`), so a
/// failure is a real error rather than an already-applied marker.
pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (label, sql) in MIGRATIONS {
        // A bare &str runs over the simple query protocol, which accepts several statements
        db.execute(sql).await.map_err(|e| {
            tracing::error!(migration = %label, error = %e, "migration failed");
            e
        })?;
        tracing::info!(migration = %label, "migration applied");
    }
    Ok(())
}
