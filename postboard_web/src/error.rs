use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use postboard_core::service::{
    comments::CommentsServiceError, feeds::FeedsServiceError, follows::FollowsServiceError,
    groups::GroupsServiceError, posts::PostsServiceError, users::UsersServiceError,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::{ValidationError, ValidationErrors};

#[derive(Error, Debug)]
pub enum WebError {
    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid form")]
    Invalid(ValidationErrors),

    /// Send the client to the login page, remembering where it wanted to go
    #[error("login required")]
    LoginRequired { location: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl WebError {
    pub fn login_required(login_path: &str, uri: &Uri) -> Self {
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());

        WebError::LoginRequired {
            location: format!("{}?next={}", login_path, encode_path(next)),
        }
    }

    fn field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut error = ValidationError::new(code);
        error.message = Some(message.into());

        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        WebError::Invalid(errors)
    }
}

/// Percent-encode a path for use in a URL, leaving the slashes readable.
fn encode_path(path: &str) -> String {
    urlencoding::encode(path).replace("%2F", "/")
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
            }
            WebError::Forbidden => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": "forbidden" }))).into_response()
            }
            WebError::Invalid(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors }))).into_response()
            }
            WebError::LoginRequired { location } => Redirect::to(&location).into_response(),
            WebError::Internal(reason) => {
                error!(%reason, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<serde_json::Error> for WebError {
    fn from(e: serde_json::Error) -> Self {
        WebError::Internal(e.to_string())
    }
}

impl From<FeedsServiceError> for WebError {
    fn from(e: FeedsServiceError) -> Self {
        match e {
            FeedsServiceError::GroupNotFound | FeedsServiceError::UserNotFound => WebError::NotFound,
            FeedsServiceError::DbError(e) => WebError::Internal(e.to_string()),
        }
    }
}

impl From<FollowsServiceError> for WebError {
    fn from(e: FollowsServiceError) -> Self {
        match e {
            FollowsServiceError::UserNotFound => WebError::NotFound,
            FollowsServiceError::DbError(e) => WebError::Internal(e.to_string()),
        }
    }
}

impl From<PostsServiceError> for WebError {
    fn from(e: PostsServiceError) -> Self {
        match e {
            PostsServiceError::PostNotFound | PostsServiceError::UserNotFound => WebError::NotFound,
            PostsServiceError::Unauthorized => WebError::Forbidden,
            PostsServiceError::Invalid(errors) => WebError::Invalid(errors),
            PostsServiceError::DbError(e) => WebError::Internal(e.to_string()),
        }
    }
}

impl From<CommentsServiceError> for WebError {
    fn from(e: CommentsServiceError) -> Self {
        match e {
            CommentsServiceError::PostNotFound => WebError::NotFound,
            CommentsServiceError::Invalid(errors) => WebError::Invalid(errors),
            CommentsServiceError::DbError(e) => WebError::Internal(e.to_string()),
        }
    }
}

impl From<GroupsServiceError> for WebError {
    fn from(e: GroupsServiceError) -> Self {
        match e {
            GroupsServiceError::GroupNotFound => WebError::NotFound,
            GroupsServiceError::SlugTaken => {
                WebError::field("slug", "unique", "a group with this slug already exists")
            }
            GroupsServiceError::Invalid(errors) => WebError::Invalid(errors),
            GroupsServiceError::DbError(e) => WebError::Internal(e.to_string()),
        }
    }
}

impl From<UsersServiceError> for WebError {
    fn from(e: UsersServiceError) -> Self {
        match e {
            UsersServiceError::UserNotFound => WebError::NotFound,
            UsersServiceError::UsernameTaken => {
                WebError::field("username", "unique", "a user with that username already exists")
            }
            UsersServiceError::InvalidCredentials => WebError::field(
                "__all__",
                "invalid_login",
                "please enter a correct username and password",
            ),
            UsersServiceError::Invalid(errors) => WebError::Invalid(errors),
            UsersServiceError::DbError(e) => WebError::Internal(e.to_string()),
            UsersServiceError::PasswordHash(reason) => WebError::Internal(reason),
        }
    }
}
