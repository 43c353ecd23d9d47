use chrono::Utc;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::{
    entity::prelude::*,
    ids::{GroupId, PostId, UserId},
    models::migrator::Migrator,
};

/// Open a fresh in-memory SQLite database with no tables.
///
/// Pinned to one connection, see [`crate::models::open_in_memory`].
pub async fn connect_memory() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    Database::connect(options)
        .await
        .expect("Failed to create in-memory database")
}

/// Same as [`connect_memory`] with every migration applied.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = connect_memory().await;

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

pub async fn create_test_user(db: &DatabaseConnection, username: &str) -> UserId {
    let user = UserActiveModel {
        id: NotSet,
        username: Set(username.to_string()),
        password_hash: Set(String::new()),
        date_joined: Set(Utc::now()),
    };
    User::insert(user).exec(db).await.unwrap().last_insert_id
}

pub async fn create_test_group(db: &DatabaseConnection, title: &str, slug: &str) -> GroupId {
    let group = GroupActiveModel {
        id: NotSet,
        title: Set(title.to_string()),
        slug: Set(slug.to_string()),
        description: Set(None),
    };
    Group::insert(group).exec(db).await.unwrap().last_insert_id
}

pub async fn create_test_post(
    db: &DatabaseConnection,
    author_id: UserId,
    group_id: Option<GroupId>,
    text: &str,
) -> PostId {
    let post = PostActiveModel {
        id: NotSet,
        text: Set(text.to_string()),
        pub_date: Set(Utc::now()),
        author_id: Set(author_id),
        group_id: Set(group_id),
        image: Set(None),
    };
    Post::insert(post).exec(db).await.unwrap().last_insert_id
}

pub async fn create_test_follow(db: &DatabaseConnection, user_id: UserId, author_id: UserId) {
    let follow = FollowActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        author_id: Set(author_id),
    };
    Follow::insert(follow).exec(db).await.unwrap();
}
