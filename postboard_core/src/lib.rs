pub mod cache;
pub mod entity;
pub mod ids;
pub mod models;
pub mod pagination;

use std::time::Duration;

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::{
    cache::PageCache,
    config::PostboardConfig,
    error::StartupError,
    service::{
        comments::CommentsService, feeds::FeedsService, follows::FollowsService,
        groups::GroupsService, posts::PostsService, users::UsersService,
    },
};

pub mod service;

pub mod error;

pub mod config;

#[cfg(test)]
mod test_utils;

/// Main runtime handle for Postboard.
///
/// Cheap to clone: every service shares the same database pool, and the
/// index cache is shared between clones.
#[derive(Clone)]
pub struct Postboard {
    pub config: PostboardConfig,

    pub db: DatabaseConnection,

    pub feeds: FeedsService,
    pub follows: FollowsService,
    pub posts: PostsService,
    pub comments: CommentsService,
    pub groups: GroupsService,
    pub users: UsersService,

    /// Whole-response cache in front of the index page.
    pub index_cache: PageCache,
}

impl Postboard {
    /// Open (or create) the configured database and bring its schema up to date
    pub async fn start(config: PostboardConfig) -> Result<Self, StartupError> {
        let db = models::open_or_create_db(&config).await?;
        models::migrate_up(&db).await?;

        info!(listen_address = %config.listen_address, "postboard core started");
        Ok(Self::with_db(config, db))
    }

    /// Wire the services around an already migrated database
    pub fn with_db(config: PostboardConfig, db: DatabaseConnection) -> Self {
        let index_cache = PageCache::new(Duration::from_secs(config.index_cache_ttl_secs));

        Self {
            feeds: FeedsService::new(db.clone(), config.page_size),
            follows: FollowsService::new(db.clone()),
            posts: PostsService::new(db.clone()),
            comments: CommentsService::new(db.clone()),
            groups: GroupsService::new(db.clone()),
            users: UsersService::new(db.clone()),
            index_cache,
            config,
            db,
        }
    }

    /// A throwaway instance backed by an in-memory database.
    pub async fn in_memory(config: PostboardConfig) -> Result<Self, StartupError> {
        let db = models::open_in_memory().await?;
        Ok(Self::with_db(config, db))
    }
}

pub mod prelude {
    pub use super::cache;
    pub use super::entity;
    pub use super::ids;
    pub use super::models;
    pub use super::pagination;

    pub use super::service;

    pub use super::error;

    pub use super::config;

    pub use super::Postboard;
}
