use sea_orm::{sea_query::OnConflict, DatabaseConnection};
use thiserror::Error;
use tracing::{debug, info};

use crate::{entity::prelude::*, ids::UserId};

#[derive(Debug, Error)]
pub enum FollowsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,
}

/// The directed "user follows author" relation.
///
/// `follow` and `unfollow` are idempotent and never report "already in this
/// state": callers redirect no matter what, so repeated calls must be quiet.
#[derive(Clone)]
pub struct FollowsService {
    db: DatabaseConnection,
}

impl FollowsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn author_by_username(&self, username: &str) -> Result<UserModel, FollowsServiceError> {
        User::find()
            .filter(UserColumn::Username.eq(username))
            .one(&self.db)
            .await?
            .ok_or(FollowsServiceError::UserNotFound)
    }

    /// Start following `author_username`. Following yourself is ignored.
    pub async fn follow(
        &self,
        user_id: UserId,
        author_username: &str,
    ) -> Result<(), FollowsServiceError> {
        let author = self.author_by_username(author_username).await?;

        if author.id == user_id {
            debug!(user_id = %user_id, "ignoring self-follow");
            return Ok(());
        }

        let edge = FollowActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            author_id: Set(author.id),
        };

        // The unique (user_id, author_id) index turns a repeat or a racing
        // duplicate into a no-op.
        let result = Follow::insert(edge)
            .on_conflict(
                OnConflict::columns([FollowColumn::UserId, FollowColumn::AuthorId])
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await?;

        match result {
            TryInsertResult::Inserted(_) => {
                info!(user_id = %user_id, author_id = %author.id, "follow created")
            }
            TryInsertResult::Conflicted | TryInsertResult::Empty => {
                debug!(user_id = %user_id, author_id = %author.id, "already following")
            }
        }

        Ok(())
    }

    /// Stop following `author_username`, if followed.
    pub async fn unfollow(
        &self,
        user_id: UserId,
        author_username: &str,
    ) -> Result<(), FollowsServiceError> {
        let author = self.author_by_username(author_username).await?;

        let result = Follow::delete_many()
            .filter(FollowColumn::UserId.eq(user_id))
            .filter(FollowColumn::AuthorId.eq(author.id))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(user_id = %user_id, author_id = %author.id, "follow removed");
        }

        Ok(())
    }

    /// Anonymous visitors follow nobody.
    pub async fn is_following(
        &self,
        user_id: Option<UserId>,
        author_id: UserId,
    ) -> Result<bool, FollowsServiceError> {
        let Some(user_id) = user_id else {
            return Ok(false);
        };

        let edge = Follow::find()
            .filter(FollowColumn::UserId.eq(user_id))
            .filter(FollowColumn::AuthorId.eq(author_id))
            .one(&self.db)
            .await?;

        Ok(edge.is_some())
    }

    pub async fn follower_count(&self, author_id: UserId) -> Result<u64, FollowsServiceError> {
        let count = Follow::find()
            .filter(FollowColumn::AuthorId.eq(author_id))
            .count(&self.db)
            .await?;

        Ok(count)
    }

    pub async fn following_count(&self, user_id: UserId) -> Result<u64, FollowsServiceError> {
        let count = Follow::find()
            .filter(FollowColumn::UserId.eq(user_id))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}
