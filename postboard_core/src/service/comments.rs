use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationErrors};

use crate::{
    entity::prelude::*,
    ids::{CommentId, PostId, UserId},
};

#[derive(Debug, Error)]
pub enum CommentsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("post not found")]
    PostNotFound,

    #[error("invalid comment")]
    Invalid(#[from] ValidationErrors),
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "comment text is required"))]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub author: String,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CommentsService {
    db: DatabaseConnection,
}

impl CommentsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Comment on a post
    pub async fn add_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        form: CommentForm,
    ) -> Result<CommentModel, CommentsServiceError> {
        let post_exists = Post::find_by_id(post_id).one(&self.db).await?.is_some();
        if !post_exists {
            return Err(CommentsServiceError::PostNotFound);
        }

        let form = CommentForm {
            text: form.text.trim().to_string(),
        };
        form.validate()?;

        let comment = CommentActiveModel {
            id: NotSet,
            post_id: Set(post_id),
            author_id: Set(author_id),
            text: Set(form.text),
            created: Set(Utc::now()),
        };

        let result = Comment::insert(comment)
            .exec_with_returning(&self.db)
            .await?;

        info!(comment_id = %result.id, post_id = %post_id, "comment added");
        Ok(result)
    }

    /// Comments of a post, oldest first
    pub async fn list_comments(
        &self,
        post_id: PostId,
    ) -> Result<Vec<CommentView>, CommentsServiceError> {
        let rows = Comment::find()
            .filter(CommentColumn::PostId.eq(post_id))
            .find_also_related(User)
            .order_by_asc(CommentColumn::Created)
            .order_by_asc(CommentColumn::Id)
            .all(&self.db)
            .await?;

        let comments = rows
            .into_iter()
            .map(|(comment, author)| CommentView {
                id: comment.id,
                author: author.map(|a| a.username).unwrap_or_default(),
                text: comment.text,
                created: comment.created,
            })
            .collect();

        Ok(comments)
    }
}
