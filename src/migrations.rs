//! Database migrations.
//!
//! Uses SQLx embedded migrations; the append-only triggers live in
//! `migrations/postgres/0002_append_only_guards.sql`.

use sqlx::PgPool;

static POSTGRES_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/postgres");

pub async fn run_postgres(pool: &PgPool) -> anyhow::Result<()> {
    POSTGRES_MIGRATOR.run(pool).await?;
    Ok(())
}
