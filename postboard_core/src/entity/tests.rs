#[cfg(test)]
mod entity_tests {
    use chrono::Utc;

    use crate::entity::prelude::*;
    use crate::ids::*;
    use crate::test_utils::{
        create_test_follow, create_test_group, create_test_post, create_test_user, setup_test_db,
    };

    async fn add_comment(db: &DatabaseConnection, post_id: PostId, author_id: UserId, text: &str) {
        let comment = CommentActiveModel {
            id: NotSet,
            post_id: Set(post_id),
            author_id: Set(author_id),
            text: Set(text.to_string()),
            created: Set(Utc::now()),
        };
        Comment::insert(comment).exec(db).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = setup_test_db().await;

        let user_id = create_test_user(&db, "leo").await;

        let found = User::find_by_id(user_id)
            .one(&db)
            .await
            .expect("Failed to query user");

        assert!(found.is_some());
        let found_user = found.unwrap();
        assert_eq!(found_user.id, user_id);
        assert_eq!(found_user.username, "leo");
    }

    #[tokio::test]
    async fn test_password_hash_is_never_serialized() {
        let db = setup_test_db().await;
        let user_id = create_test_user(&db, "leo").await;

        let user = User::find_by_id(user_id).one(&db).await.unwrap().unwrap();
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["username"], "leo");
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_username_unique_constraint() {
        let db = setup_test_db().await;
        create_test_user(&db, "leo").await;

        let duplicate = UserActiveModel {
            id: NotSet,
            username: Set("leo".to_string()),
            password_hash: Set(String::new()),
            date_joined: Set(Utc::now()),
        };
        let result = User::insert(duplicate).exec(&db).await;

        assert!(result.is_err(), "Should fail due to unique username");
    }

    #[tokio::test]
    async fn test_group_slug_unique_constraint() {
        let db = setup_test_db().await;
        create_test_group(&db, "First", "same-slug").await;

        let duplicate = GroupActiveModel {
            id: NotSet,
            title: Set("Second".to_string()),
            slug: Set("same-slug".to_string()),
            description: Set(None),
        };
        let result = Group::insert(duplicate).exec(&db).await;

        assert!(result.is_err(), "Should fail due to unique slug");
    }

    #[tokio::test]
    async fn test_follow_pair_unique_constraint() {
        let db = setup_test_db().await;
        let reader = create_test_user(&db, "reader").await;
        let writer = create_test_user(&db, "writer").await;

        create_test_follow(&db, reader, writer).await;

        let duplicate = FollowActiveModel {
            id: NotSet,
            user_id: Set(reader),
            author_id: Set(writer),
        };
        let result = Follow::insert(duplicate).exec(&db).await;
        assert!(result.is_err(), "Should fail due to unique (user, author)");

        // The reverse edge is a different pair
        create_test_follow(&db, writer, reader).await;
        assert_eq!(Follow::find().count(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_post_with_related_author_and_group() {
        let db = setup_test_db().await;
        let author = create_test_user(&db, "author").await;
        let group = create_test_group(&db, "Test", "test-slug").await;
        let post_id = create_test_post(&db, author, Some(group), "Hello").await;

        let post = Post::find_by_id(post_id).one(&db).await.unwrap().unwrap();

        let found_author = post.find_related(User).one(&db).await.unwrap().unwrap();
        assert_eq!(found_author.username, "author");

        let found_group = post.find_related(Group).one(&db).await.unwrap().unwrap();
        assert_eq!(found_group.slug, "test-slug");
    }

    #[tokio::test]
    async fn test_find_user_with_related_posts() {
        let db = setup_test_db().await;
        let author = create_test_user(&db, "author").await;
        let other = create_test_user(&db, "other").await;

        for i in 0..3 {
            create_test_post(&db, author, None, &format!("Post {}", i)).await;
        }
        create_test_post(&db, other, None, "Not mine").await;

        let user = User::find_by_id(author).one(&db).await.unwrap().unwrap();
        let posts = user.find_related(Post).all(&db).await.unwrap();

        assert_eq!(posts.len(), 3);
        assert!(posts.iter().all(|p| p.author_id == author));
    }

    #[tokio::test]
    async fn test_relationship_empty_related_collection() {
        let db = setup_test_db().await;
        let group_id = create_test_group(&db, "Quiet", "quiet").await;

        let group = Group::find_by_id(group_id).one(&db).await.unwrap().unwrap();
        let posts = group.find_related(Post).all(&db).await.unwrap();

        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_cascade_delete_post_deletes_comments() {
        let db = setup_test_db().await;
        let author = create_test_user(&db, "author").await;
        let post_id = create_test_post(&db, author, None, "Parent").await;

        for text in ["one", "two"] {
            add_comment(&db, post_id, author, text).await;
        }

        Post::delete_by_id(post_id).exec(&db).await.unwrap();

        let comments_after = Comment::find()
            .filter(CommentColumn::PostId.eq(post_id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(comments_after, 0, "Comments should be cascade deleted with post");
    }

    #[tokio::test]
    async fn test_delete_group_sets_post_group_null() {
        let db = setup_test_db().await;
        let author = create_test_user(&db, "author").await;
        let group = create_test_group(&db, "Test", "test-slug").await;
        let post_id = create_test_post(&db, author, Some(group), "Grouped").await;

        Group::delete_by_id(group).exec(&db).await.unwrap();

        let post = Post::find_by_id(post_id).one(&db).await.unwrap().unwrap();
        assert_eq!(post.group_id, None, "Post should survive without its group");
    }

    #[tokio::test]
    async fn test_cascade_delete_user() {
        let db = setup_test_db().await;
        let doomed = create_test_user(&db, "doomed").await;
        let other = create_test_user(&db, "other").await;
        let post_id = create_test_post(&db, doomed, None, "bye").await;
        add_comment(&db, post_id, other, "comment on doomed post").await;
        create_test_follow(&db, other, doomed).await;

        User::delete_by_id(doomed).exec(&db).await.unwrap();

        assert_eq!(Post::find().count(&db).await.unwrap(), 0);
        assert_eq!(Comment::find().count(&db).await.unwrap(), 0);
        assert_eq!(Follow::find().count(&db).await.unwrap(), 0);
        assert!(User::find_by_id(other).one(&db).await.unwrap().is_some());
    }
}
