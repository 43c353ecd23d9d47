use sea_orm::{
    sea_query::{Expr, Value},
    DatabaseConnection, TransactionTrait,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{entity::prelude::*, ids::GroupId};

#[derive(Debug, Error)]
pub enum GroupsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("group not found")]
    GroupNotFound,

    #[error("slug already in use")]
    SlugTaken,

    #[error("invalid group")]
    Invalid(#[from] ValidationErrors),
}

/// Letters, digits, hyphens and underscores only.
fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let url_safe = slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if url_safe {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewGroup {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50), custom(function = "validate_slug"))]
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct GroupsService {
    db: DatabaseConnection,
}

impl GroupsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a group. Groups are set up by an administrator, not by posting users.
    pub async fn create_group(&self, new_group: NewGroup) -> Result<GroupModel, GroupsServiceError> {
        new_group.validate()?;

        let slug_taken = Group::find()
            .filter(GroupColumn::Slug.eq(new_group.slug.as_str()))
            .one(&self.db)
            .await?
            .is_some();

        if slug_taken {
            return Err(GroupsServiceError::SlugTaken);
        }

        let group = GroupActiveModel {
            id: NotSet,
            title: Set(new_group.title),
            slug: Set(new_group.slug),
            description: Set(new_group.description.filter(|d| !d.trim().is_empty())),
        };

        let result = Group::insert(group).exec_with_returning(&self.db).await?;

        info!(group_id = %result.id, slug = %result.slug, "group created");
        Ok(result)
    }

    /// Look a group up by its slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<GroupModel, GroupsServiceError> {
        Group::find()
            .filter(GroupColumn::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::GroupNotFound)
    }

    /// Every group, by title. Feeds the group picker of the post form.
    pub async fn list_groups(&self) -> Result<Vec<GroupModel>, GroupsServiceError> {
        let groups = Group::find()
            .order_by_asc(GroupColumn::Title)
            .order_by_asc(GroupColumn::Id)
            .all(&self.db)
            .await?;

        Ok(groups)
    }

    /// Delete a group. Its posts survive with no group.
    pub async fn delete_group(&self, group_id: GroupId) -> Result<(), GroupsServiceError> {
        let txn = self.db.begin().await?;

        let group = Group::find_by_id(group_id).one(&txn).await?;
        if group.is_none() {
            return Err(GroupsServiceError::GroupNotFound);
        }

        let detached = Post::update_many()
            .col_expr(PostColumn::GroupId, Expr::value(Value::Int(None)))
            .filter(PostColumn::GroupId.eq(group_id))
            .exec(&txn)
            .await?;

        Group::delete_by_id(group_id).exec(&txn).await?;

        txn.commit().await?;

        info!(group_id = %group_id, detached = detached.rows_affected, "group deleted");
        Ok(())
    }
}
