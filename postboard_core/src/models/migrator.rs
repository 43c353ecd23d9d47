use sea_orm_migration::prelude::*;

mod m20261016_000001_create_user_table;
mod m20261016_000002_create_group_table;
mod m20261016_000003_create_post_table;
mod m20261016_000004_create_comment_table;
mod m20261016_000005_create_follow_table;
mod m20261016_000006_create_session_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261016_000001_create_user_table::Migration),
            Box::new(m20261016_000002_create_group_table::Migration),
            Box::new(m20261016_000003_create_post_table::Migration),
            Box::new(m20261016_000004_create_comment_table::Migration),
            Box::new(m20261016_000005_create_follow_table::Migration),
            Box::new(m20261016_000006_create_session_table::Migration),
        ]
    }
}

#[cfg(test)]
use sea_orm::DbErr;

#[tokio::test]
async fn test_migrations_okay() -> Result<(), DbErr> {
    let db = crate::test_utils::connect_memory().await;
    let schema_manager = SchemaManager::new(&db);

    Migrator::refresh(&db).await?;

    assert!(schema_manager.has_table("user").await?);
    assert!(schema_manager.has_table("group").await?);
    assert!(schema_manager.has_table("post").await?);
    assert!(schema_manager.has_table("comment").await?);
    assert!(schema_manager.has_table("follow").await?);
    assert!(schema_manager.has_table("session").await?);

    Ok(())
}

#[tokio::test]
async fn test_migrations_roll_back() -> Result<(), DbErr> {
    let db = crate::test_utils::connect_memory().await;
    let schema_manager = SchemaManager::new(&db);

    Migrator::up(&db, None).await?;
    Migrator::down(&db, None).await?;

    assert!(!schema_manager.has_table("post").await?);
    assert!(!schema_manager.has_table("follow").await?);

    Ok(())
}
