use sea_orm::{DatabaseConnection, QueryTrait, Select};
use thiserror::Error;
use tracing::debug;

use crate::{
    entity::prelude::*,
    ids::UserId,
    pagination::{paginate, Page, PageNumber},
    service::posts::{post_views, PostView},
};

#[derive(Debug, Error)]
pub enum FeedsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("group not found")]
    GroupNotFound,

    #[error("user not found")]
    UserNotFound,
}

/// Which posts a feed shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    /// Every post.
    All,
    /// Posts of the group with this slug.
    ByGroup(String),
    /// Posts written by this username.
    ByAuthor(String),
    /// Posts by the authors the viewer follows. Anonymous viewers get nothing.
    ByFollowing(Option<UserId>),
}

pub type FeedPage = Page<PostView>;

fn newest_first(select: Select<Post>) -> Select<Post> {
    select
        .order_by_desc(PostColumn::PubDate)
        .order_by_desc(PostColumn::Id)
}

/// Read-only, paginated views over posts.
#[derive(Clone)]
pub struct FeedsService {
    db: DatabaseConnection,
    page_size: u64,
}

impl FeedsService {
    pub fn new(db: DatabaseConnection, page_size: u64) -> Self {
        Self {
            db,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    async fn group_by_slug(&self, slug: &str) -> Result<GroupModel, FeedsServiceError> {
        Group::find()
            .filter(GroupColumn::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(FeedsServiceError::GroupNotFound)
    }

    async fn scoped(&self, scope: &FeedScope) -> Result<Option<Select<Post>>, FeedsServiceError> {
        let select = match scope {
            FeedScope::All => Post::find(),
            FeedScope::ByGroup(slug) => {
                let group = self.group_by_slug(slug).await?;
                Post::find().filter(PostColumn::GroupId.eq(group.id))
            }
            FeedScope::ByAuthor(username) => {
                let author = User::find()
                    .filter(UserColumn::Username.eq(username.as_str()))
                    .one(&self.db)
                    .await?
                    .ok_or(FeedsServiceError::UserNotFound)?;

                Post::find().filter(PostColumn::AuthorId.eq(author.id))
            }
            FeedScope::ByFollowing(None) => return Ok(None),
            FeedScope::ByFollowing(Some(user_id)) => {
                let followed = Follow::find()
                    .select_only()
                    .column(FollowColumn::AuthorId)
                    .filter(FollowColumn::UserId.eq(*user_id))
                    .into_query();

                Post::find().filter(PostColumn::AuthorId.in_subquery(followed))
            }
        };

        Ok(Some(newest_first(select)))
    }

    /// One page of the feed for `scope`. Out-of-range page numbers are
    /// clamped, never rejected.
    pub async fn build_feed(
        &self,
        scope: FeedScope,
        page: PageNumber,
    ) -> Result<FeedPage, FeedsServiceError> {
        let Some(select) = self.scoped(&scope).await? else {
            return Ok(Page::empty());
        };

        self.page_of(select, &scope, page).await
    }

    /// The group behind `slug` together with one page of its feed, both
    /// taken from a single lookup of the group.
    pub async fn build_group_feed(
        &self,
        slug: &str,
        page: PageNumber,
    ) -> Result<(GroupModel, FeedPage), FeedsServiceError> {
        let group = self.group_by_slug(slug).await?;
        let select = newest_first(Post::find().filter(PostColumn::GroupId.eq(group.id)));

        let scope = FeedScope::ByGroup(group.slug.clone());
        let page = self.page_of(select, &scope, page).await?;

        Ok((group, page))
    }

    async fn page_of(
        &self,
        select: Select<Post>,
        scope: &FeedScope,
        page: PageNumber,
    ) -> Result<FeedPage, FeedsServiceError> {
        let mut page = paginate(select, &self.db, self.page_size, page).await?;
        debug!(
            ?scope,
            page = page.number,
            total_pages = page.total_pages,
            "feed built"
        );

        let posts = std::mem::take(&mut page.items);
        let views = post_views(&self.db, posts).await?;

        Ok(page.with_items(views))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::{
        ids::{GroupId, PostId},
        test_utils::{create_test_follow, create_test_group, create_test_post, create_test_user, setup_test_db},
    };

    async fn post_at(
        db: &DatabaseConnection,
        author_id: UserId,
        group_id: Option<GroupId>,
        text: &str,
        pub_date: DateTime<Utc>,
    ) -> PostId {
        let post = PostActiveModel {
            id: NotSet,
            text: Set(text.to_string()),
            pub_date: Set(pub_date),
            author_id: Set(author_id),
            group_id: Set(group_id),
            image: Set(None),
        };
        Post::insert(post).exec(db).await.unwrap().last_insert_id
    }

    fn ids(page: &FeedPage) -> Vec<PostId> {
        page.items.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_group_feed_filters_and_orders() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let author = create_test_user(&db, "author").await;
        let cats = create_test_group(&db, "Cats", "cats").await;
        let dogs = create_test_group(&db, "Dogs", "dogs").await;

        let base = Utc::now();
        // Inserted out of date order on purpose
        post_at(&db, author, Some(cats), "middle", base - Duration::hours(2)).await;
        post_at(&db, author, Some(dogs), "dog", base - Duration::hours(1)).await;
        post_at(&db, author, Some(cats), "newest", base).await;
        post_at(&db, author, Some(cats), "oldest", base - Duration::hours(3)).await;
        post_at(&db, author, None, "loose", base).await;

        let page = service
            .build_feed(FeedScope::ByGroup("cats".to_string()), PageNumber::First)
            .await
            .unwrap();

        let texts: Vec<&str> = page.items.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["newest", "middle", "oldest"]);
        assert!(page
            .items
            .iter()
            .all(|p| p.group.as_ref().map(|g| g.slug.as_str()) == Some("cats")));
        assert!(page.items.windows(2).all(|w| w[0].pub_date >= w[1].pub_date));
    }

    #[tokio::test]
    async fn test_same_pub_date_newer_insert_first() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let author = create_test_user(&db, "author").await;

        let when = Utc::now();
        let first = post_at(&db, author, None, "first", when).await;
        let second = post_at(&db, author, None, "second", when).await;

        let page = service.build_feed(FeedScope::All, PageNumber::First).await.unwrap();
        assert_eq!(ids(&page), [second, first]);
    }

    #[tokio::test]
    async fn test_pagination_sizes() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let author = create_test_user(&db, "author").await;

        for i in 0..13 {
            create_test_post(&db, author, None, &format!("post {i}")).await;
        }

        let first = service.build_feed(FeedScope::All, PageNumber::First).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.number, 1);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.total_count, 13);
        assert!(first.has_next);

        let last = service
            .build_feed(FeedScope::All, PageNumber::Requested(2))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 3);
        assert!(!last.has_next);
        assert!(last.has_prev);

        // ceil(13 / 10) + 5
        let beyond = service
            .build_feed(FeedScope::All, PageNumber::Requested(7))
            .await
            .unwrap();
        assert_eq!(beyond.number, 2);
        assert_eq!(ids(&beyond), ids(&last));

        let garbled = service
            .build_feed(FeedScope::All, PageNumber::parse(Some("abc")))
            .await
            .unwrap();
        assert_eq!(ids(&garbled), ids(&first));

        let huge = service
            .build_feed(FeedScope::All, PageNumber::parse(Some("99999999999999999999")))
            .await
            .unwrap();
        assert_eq!(ids(&huge), ids(&last));
    }

    #[tokio::test]
    async fn test_empty_feed_has_one_page() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db, 10);

        let page = service
            .build_feed(FeedScope::All, PageNumber::Requested(3))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_author_feed() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let alice = create_test_user(&db, "alice").await;
        let bob = create_test_user(&db, "bob").await;

        create_test_post(&db, alice, None, "by alice").await;
        create_test_post(&db, bob, None, "by bob").await;

        let page = service
            .build_feed(FeedScope::ByAuthor("alice".to_string()), PageNumber::First)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].author, "alice");

        let missing = service
            .build_feed(FeedScope::ByAuthor("ghost".to_string()), PageNumber::First)
            .await;
        assert!(matches!(missing, Err(FeedsServiceError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_following_feed_membership() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let reader = create_test_user(&db, "reader").await;
        let followed = create_test_user(&db, "followed").await;
        let ignored = create_test_user(&db, "ignored").await;

        let base = Utc::now();
        let older = post_at(&db, followed, None, "older", base - Duration::minutes(5)).await;
        post_at(&db, ignored, None, "unseen", base).await;
        let newer = post_at(&db, followed, None, "newer", base).await;

        let nothing = service
            .build_feed(FeedScope::ByFollowing(Some(reader)), PageNumber::First)
            .await
            .unwrap();
        assert!(nothing.items.is_empty());

        create_test_follow(&db, reader, followed).await;

        let page = service
            .build_feed(FeedScope::ByFollowing(Some(reader)), PageNumber::First)
            .await
            .unwrap();
        assert_eq!(ids(&page), [newer, older]);

        let anonymous = service
            .build_feed(FeedScope::ByFollowing(None), PageNumber::First)
            .await
            .unwrap();
        assert!(anonymous.items.is_empty());
        assert_eq!(anonymous.total_pages, 1);
    }

    #[tokio::test]
    async fn test_new_group_post_tops_feeds() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let user = create_test_user(&db, "auth").await;
        let group = create_test_group(&db, "Test", "test-slug").await;

        let post_id = create_test_post(&db, user, Some(group), "T").await;

        let all = service.build_feed(FeedScope::All, PageNumber::First).await.unwrap();
        assert_eq!(all.items[0].text, "T");

        let by_group = service
            .build_feed(FeedScope::ByGroup("test-slug".to_string()), PageNumber::First)
            .await
            .unwrap();
        assert_eq!(by_group.items[0].id, post_id);
        assert_eq!(by_group.items[0], all.items[0]);

        let missing = service
            .build_feed(FeedScope::ByGroup("missing-slug".to_string()), PageNumber::First)
            .await;
        assert!(matches!(missing, Err(FeedsServiceError::GroupNotFound)));
    }

    #[tokio::test]
    async fn test_followed_author_post_reaches_follower_only() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let a = create_test_user(&db, "a").await;
        let b = create_test_user(&db, "b").await;
        let c = create_test_user(&db, "c").await;

        create_test_follow(&db, a, b).await;
        let post_id = create_test_post(&db, b, None, "from b").await;

        let feed_a = service
            .build_feed(FeedScope::ByFollowing(Some(a)), PageNumber::First)
            .await
            .unwrap();
        assert!(ids(&feed_a).contains(&post_id));

        let feed_c = service
            .build_feed(FeedScope::ByFollowing(Some(c)), PageNumber::First)
            .await
            .unwrap();
        assert!(!ids(&feed_c).contains(&post_id));
    }

    #[tokio::test]
    async fn test_group_feed_returns_its_group() {
        let db = setup_test_db().await;
        let service = FeedsService::new(db.clone(), 10);
        let author = create_test_user(&db, "author").await;
        let cats = create_test_group(&db, "Cats", "cats").await;
        let dogs = create_test_group(&db, "Dogs", "dogs").await;

        let purr = create_test_post(&db, author, Some(cats), "purr").await;
        create_test_post(&db, author, Some(dogs), "woof").await;

        let (group, page) = service
            .build_group_feed("cats", PageNumber::First)
            .await
            .unwrap();
        assert_eq!(group.id, cats);
        assert_eq!(group.title, "Cats");
        assert_eq!(ids(&page), [purr]);

        let missing = service.build_group_feed("birds", PageNumber::First).await;
        assert!(matches!(missing, Err(FeedsServiceError::GroupNotFound)));
    }
}
