use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    entity::prelude::*,
    ids::{GroupId, PostId, UserId},
};

#[derive(Debug, Error)]
pub enum PostsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("post not found")]
    PostNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("unauthorized: not post author")]
    Unauthorized,

    #[error("invalid post")]
    Invalid(#[from] ValidationErrors),
}

/// Post form as submitted. `group` and `image` arrive as raw strings where an
/// empty string means "none".
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PostForm {
    #[validate(length(min = 1, message = "post text is required"))]
    pub text: String,
    pub group: Option<String>,
    pub image: Option<String>,
}

impl PostForm {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group = Some(group_id.to_string());
        self
    }
}

/// The fields of a form that passed validation.
struct CleanPost {
    text: String,
    group_id: Option<GroupId>,
    image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub id: GroupId,
    pub slug: String,
    pub title: String,
}

/// A post with its author and group resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: UserId,
    pub author: String,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: PostView,
    pub author_post_count: u64,
}

/// Resolve authors and groups for a batch of posts, keeping their order.
pub async fn post_views<C>(db: &C, posts: Vec<PostModel>) -> Result<Vec<PostView>, DbErr>
where
    C: ConnectionTrait,
{
    let mut author_ids: Vec<UserId> = posts.iter().map(|p| p.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let mut group_ids: Vec<GroupId> = posts.iter().filter_map(|p| p.group_id).collect();
    group_ids.sort_unstable();
    group_ids.dedup();

    let authors: HashMap<UserId, String> = if author_ids.is_empty() {
        HashMap::new()
    } else {
        User::find()
            .filter(UserColumn::Id.is_in(author_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect()
    };

    let groups: HashMap<GroupId, GroupRef> = if group_ids.is_empty() {
        HashMap::new()
    } else {
        Group::find()
            .filter(GroupColumn::Id.is_in(group_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|g| {
                (
                    g.id,
                    GroupRef {
                        id: g.id,
                        slug: g.slug,
                        title: g.title,
                    },
                )
            })
            .collect()
    };

    posts
        .into_iter()
        .map(|post| {
            let author = authors.get(&post.author_id).cloned().ok_or_else(|| {
                DbErr::RecordNotFound(format!("author {} of post {}", post.author_id, post.id))
            })?;
            let group = post.group_id.and_then(|id| groups.get(&id).cloned());

            Ok(PostView {
                id: post.id,
                text: post.text,
                pub_date: post.pub_date,
                author_id: post.author_id,
                author,
                group,
                image: post.image,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct PostsService {
    db: DatabaseConnection,
}

impl PostsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Trim, validate and resolve the group of a submitted form.
    async fn clean(&self, form: PostForm) -> Result<CleanPost, PostsServiceError> {
        let form = PostForm {
            text: form.text.trim().to_string(),
            ..form
        };
        form.validate()?;

        let group_id = match form.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let known = match raw.parse::<GroupId>() {
                    Ok(id) => Group::find_by_id(id).one(&self.db).await?.map(|g| g.id),
                    Err(_) => None,
                };
                let Some(id) = known else {
                    let mut errors = ValidationErrors::new();
                    let mut error = ValidationError::new("invalid_choice");
                    error.message = Some("select a valid group".into());
                    errors.add("group", error);
                    return Err(errors.into());
                };
                Some(id)
            }
        };

        let image = form
            .image
            .map(|image| image.trim().to_string())
            .filter(|image| !image.is_empty());

        Ok(CleanPost {
            text: form.text,
            group_id,
            image,
        })
    }

    /// Create a new post; `pub_date` is stamped here and never changes
    pub async fn create_post(
        &self,
        author_id: UserId,
        form: PostForm,
    ) -> Result<PostModel, PostsServiceError> {
        let clean = self.clean(form).await?;

        let author_exists = User::find_by_id(author_id).one(&self.db).await?.is_some();
        if !author_exists {
            return Err(PostsServiceError::UserNotFound);
        }

        let post = PostActiveModel {
            id: NotSet,
            text: Set(clean.text),
            pub_date: Set(Utc::now()),
            author_id: Set(author_id),
            group_id: Set(clean.group_id),
            image: Set(clean.image),
        };

        let result = Post::insert(post).exec_with_returning(&self.db).await?;

        info!(post_id = %result.id, author_id = %author_id, "post created");
        Ok(result)
    }

    /// Get a specific post by ID
    pub async fn get_post(&self, post_id: PostId) -> Result<PostModel, PostsServiceError> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(PostsServiceError::PostNotFound)
    }

    /// The post page: the post itself plus how much its author has written
    pub async fn get_post_detail(&self, post_id: PostId) -> Result<PostDetail, PostsServiceError> {
        let post = self.get_post(post_id).await?;
        let author_post_count = self.count_posts_by_author(post.author_id).await?;

        let post = post_views(&self.db, vec![post])
            .await?
            .pop()
            .ok_or(PostsServiceError::PostNotFound)?;

        Ok(PostDetail {
            post,
            author_post_count,
        })
    }

    /// Update a post (only by author)
    pub async fn update_post(
        &self,
        post_id: PostId,
        editor_id: UserId,
        form: PostForm,
    ) -> Result<PostModel, PostsServiceError> {
        let post = self.get_post(post_id).await?;

        if post.author_id != editor_id {
            return Err(PostsServiceError::Unauthorized);
        }

        let clean = self.clean(form).await?;

        let mut post_active: PostActiveModel = post.into();
        post_active.text = Set(clean.text);
        post_active.group_id = Set(clean.group_id);
        post_active.image = Set(clean.image);

        let updated = post_active.update(&self.db).await?;
        info!(post_id = %post_id, "post updated");
        Ok(updated)
    }

    /// Delete a post and its comments (only by author)
    pub async fn delete_post(
        &self,
        post_id: PostId,
        requester_id: UserId,
    ) -> Result<(), PostsServiceError> {
        let post = self.get_post(post_id).await?;

        if post.author_id != requester_id {
            return Err(PostsServiceError::Unauthorized);
        }

        let txn = self.db.begin().await?;

        Comment::delete_many()
            .filter(CommentColumn::PostId.eq(post_id))
            .exec(&txn)
            .await?;
        Post::delete_by_id(post_id).exec(&txn).await?;

        txn.commit().await?;

        info!(post_id = %post_id, "post deleted");
        Ok(())
    }

    /// Count total posts by an author
    pub async fn count_posts_by_author(&self, author_id: UserId) -> Result<u64, PostsServiceError> {
        let count = Post::find()
            .filter(PostColumn::AuthorId.eq(author_id))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}
