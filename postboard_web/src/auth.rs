//! Session-cookie authentication.
//!
//! Handlers take [`CurrentUser`] when anonymous visitors are allowed and
//! [`RequireUser`] when they are not. `RequireUser` rejects with a redirect
//! to the login page carrying the requested path in `next`.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use postboard_core::entity::prelude::UserModel;

use crate::{error::WebError, state::AppState};

pub const SESSION_COOKIE: &str = "sessionid";

/// The logged-in user, if any.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<UserModel>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(CurrentUser(None));
        };

        let user = state.board.users.resolve_session(cookie.value()).await?;
        Ok(CurrentUser(user))
    }
}

/// A logged-in user. Anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserModel);

#[async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        user.map(RequireUser)
            .ok_or_else(|| WebError::login_required(state.login_path(), &parts.uri))
    }
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}
