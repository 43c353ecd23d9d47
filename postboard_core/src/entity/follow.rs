use crate::ids::{FollowId, UserId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Directed edge: `user_id` follows `author_id`.
///
/// Both ends point at `user`, so there is no `Related<user::Entity>` impl;
/// joins pick the side explicitly through [`Relation::Follower`] or
/// [`Relation::Author`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: FollowId,
    pub user_id: UserId,
    pub author_id: UserId,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Follower,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,
}

impl ActiveModelBehavior for ActiveModel {}
