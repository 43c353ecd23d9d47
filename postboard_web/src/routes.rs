use std::{convert::Infallible, str::FromStr};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, Uri},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use postboard_core::{
    entity::prelude::{GroupModel, UserModel},
    ids::PostId,
    pagination::PageNumber,
    service::{
        comments::{CommentForm, CommentView, CommentsServiceError},
        feeds::{FeedPage, FeedScope},
        posts::{PostDetail, PostForm, PostsServiceError},
        users::Credentials,
    },
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    auth::{expired_session_cookie, session_cookie, CurrentUser, RequireUser, SESSION_COOKIE},
    error::WebError,
    state::AppState,
};

/// The `page` query parameter. A repeated parameter keeps its last value and
/// a query that does not parse counts as absent, so this never rejects.
#[derive(Debug, Default)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn from_uri(uri: &Uri) -> Self {
        let page = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map(|Query(pairs)| {
                pairs
                    .into_iter()
                    .rev()
                    .find_map(|(key, value)| (key == "page").then_some(value))
            })
            .unwrap_or_default();

        Self { page }
    }

    fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PageQuery {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_uri(&parts.uri))
    }
}

#[derive(Serialize)]
pub struct IndexPage {
    page: FeedPage,
}

#[derive(Serialize)]
pub struct GroupPage {
    group: GroupModel,
    page: FeedPage,
}

#[derive(Serialize)]
pub struct ProfilePage {
    author: UserModel,
    following: bool,
    follower_count: u64,
    following_count: u64,
    page: FeedPage,
}

#[derive(Serialize)]
pub struct FollowPage {
    page: FeedPage,
}

#[derive(Serialize)]
pub struct PostPage {
    #[serde(flatten)]
    detail: PostDetail,
    comments: Vec<CommentView>,
    can_edit: bool,
}

#[derive(Serialize)]
pub struct PostFormPage {
    form: PostForm,
    groups: Vec<GroupModel>,
    is_edit: bool,
    post_id: Option<PostId>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

fn parse_id<T: FromStr>(raw: &str) -> Result<T, WebError> {
    raw.parse().map_err(|_| WebError::NotFound)
}

fn profile_path(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

fn post_detail_path(post_id: PostId) -> String {
    format!("/posts/{post_id}/")
}

/// Only same-site paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next,
        _ => "/",
    }
}

fn json_body(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

pub async fn index(
    State(state): State<AppState>,
    uri: Uri,
    query: PageQuery,
) -> Result<Response, WebError> {
    // Keyed on the full request target; who is asking does not matter
    let key = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let body = state
        .board
        .index_cache
        .get_or_render(&key, || async {
            let page = state
                .board
                .feeds
                .build_feed(FeedScope::All, query.number())
                .await?;

            let body = serde_json::to_vec(&IndexPage { page })?;
            Ok::<_, WebError>(Bytes::from(body))
        })
        .await?;

    Ok(json_body(body))
}

pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    query: PageQuery,
) -> Result<Json<GroupPage>, WebError> {
    let (group, page) = state
        .board
        .feeds
        .build_group_feed(&slug, query.number())
        .await?;

    Ok(Json(GroupPage { group, page }))
}

pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
    query: PageQuery,
) -> Result<Json<ProfilePage>, WebError> {
    let author = state.board.users.get_by_username(&username).await?;

    let follows = &state.board.follows;
    let following = follows
        .is_following(viewer.map(|v| v.id), author.id)
        .await?;
    let follower_count = follows.follower_count(author.id).await?;
    let following_count = follows.following_count(author.id).await?;

    let page = state
        .board
        .feeds
        .build_feed(FeedScope::ByAuthor(username), query.number())
        .await?;

    Ok(Json(ProfilePage {
        author,
        following,
        follower_count,
        following_count,
        page,
    }))
}

pub async fn post_detail(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Json<PostPage>, WebError> {
    let post_id: PostId = parse_id(&raw_id)?;

    let detail = state.board.posts.get_post_detail(post_id).await?;
    let comments = state.board.comments.list_comments(post_id).await?;
    let can_edit = viewer.is_some_and(|v| v.id == detail.post.author_id);

    Ok(Json(PostPage {
        detail,
        comments,
        can_edit,
    }))
}

pub async fn follow_index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    query: PageQuery,
) -> Result<Json<FollowPage>, WebError> {
    let page = state
        .board
        .feeds
        .build_feed(FeedScope::ByFollowing(Some(user.id)), query.number())
        .await?;

    Ok(Json(FollowPage { page }))
}

pub async fn profile_follow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Redirect, WebError> {
    state.board.follows.follow(user.id, &username).await?;
    Ok(Redirect::to(&profile_path(&username)))
}

pub async fn profile_unfollow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Redirect, WebError> {
    state.board.follows.unfollow(user.id, &username).await?;
    Ok(Redirect::to(&profile_path(&username)))
}

pub async fn post_create_form(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
) -> Result<Json<PostFormPage>, WebError> {
    let groups = state.board.groups.list_groups().await?;

    Ok(Json(PostFormPage {
        form: PostForm::default(),
        groups,
        is_edit: false,
        post_id: None,
    }))
}

pub async fn post_create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<PostForm>,
) -> Result<Redirect, WebError> {
    state.board.posts.create_post(user.id, form).await?;
    Ok(Redirect::to(&profile_path(&user.username)))
}

pub async fn post_edit_form(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
) -> Result<Response, WebError> {
    let post_id: PostId = parse_id(&raw_id)?;
    let post = state.board.posts.get_post(post_id).await?;

    if post.author_id != user.id {
        return Ok(Redirect::to(&post_detail_path(post_id)).into_response());
    }

    let groups = state.board.groups.list_groups().await?;
    let form = PostForm {
        text: post.text,
        group: post.group_id.map(|id| id.to_string()),
        image: post.image,
    };

    Ok(Json(PostFormPage {
        form,
        groups,
        is_edit: true,
        post_id: Some(post_id),
    })
    .into_response())
}

pub async fn post_edit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    Form(form): Form<PostForm>,
) -> Result<Redirect, WebError> {
    let post_id: PostId = parse_id(&raw_id)?;

    match state.board.posts.update_post(post_id, user.id, form).await {
        Ok(_) => {}
        Err(PostsServiceError::Unauthorized) => {
            debug!(post_id = %post_id, user_id = %user.id, "edit by non-author refused");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&post_detail_path(post_id)))
}

/// Comments are only accepted by POST; a plain visit goes back to the post.
pub async fn add_comment_form(
    RequireUser(_user): RequireUser,
    Path(raw_id): Path<String>,
) -> Result<Redirect, WebError> {
    let post_id: PostId = parse_id(&raw_id)?;
    Ok(Redirect::to(&post_detail_path(post_id)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, WebError> {
    let post_id: PostId = parse_id(&raw_id)?;

    match state.board.comments.add_comment(post_id, user.id, form).await {
        Ok(_) => {}
        Err(CommentsServiceError::Invalid(errors)) => {
            debug!(post_id = %post_id, ?errors, "blank comment dropped");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&post_detail_path(post_id)))
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(credentials): Form<Credentials>,
) -> Result<(CookieJar, Redirect), WebError> {
    let user = state.board.users.signup(credentials).await?;
    let token = state.board.users.start_session(user.id).await?;

    Ok((jar.add(session_cookie(token)), Redirect::to("/")))
}

pub async fn login_form(Query(query): Query<NextQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "next": safe_next(query.next.as_deref()),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), WebError> {
    let token = state.board.users.login(&form.username, &form.password).await?;
    let next = safe_next(form.next.as_deref());

    Ok((jar.add(session_cookie(token)), Redirect::to(next)))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), WebError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.board.users.logout(cookie.value()).await?;
    }

    Ok((
        jar.remove(expired_session_cookie()),
        Json(serde_json::json!({ "logged_out": true })),
    ))
}

pub async fn not_found(uri: Uri) -> WebError {
    debug!(path = %uri.path(), "no route");
    WebError::NotFound
}
