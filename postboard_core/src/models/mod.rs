use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::PostboardConfig;

pub mod migrator;

pub async fn open_or_create_db(config: &PostboardConfig) -> Result<DatabaseConnection, DbErr> {
    // mode=rwc creates the file on first start
    let connection_string = format!("sqlite://{}?mode=rwc", config.database_path.display());

    let mut options = ConnectOptions::new(connection_string);
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!(path = %config.database_path.display(), "database opened");
    Ok(db)
}

pub async fn migrate_up(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrator::Migrator::up(db, None).await?;
    info!("migrations applied");
    Ok(())
}

/// A private in-memory database with every migration applied.
///
/// The pool is pinned to one connection: every `sqlite::memory:` connection
/// is its own database, so a second pooled connection would see no tables.
pub async fn open_in_memory() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migrate_up(&db).await?;
    Ok(db)
}
