use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use sea_orm::{Condition, DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{entity::prelude::*, ids::UserId};

const SESSION_TOKEN_LEN: usize = 40;
const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum UsersServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,

    #[error("username already taken")]
    UsernameTaken,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid signup")]
    Invalid(#[from] ValidationErrors),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Letters, digits and `@ . + - _`.
fn validate_username(username: &str) -> Result<(), ValidationError> {
    let allowed = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));

    if allowed {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 150), custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

fn hash_password(password: &str) -> Result<String, UsersServiceError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| UsersServiceError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UsersServiceError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        // Accounts created without a password can't log in
        Err(_) => false,
    }
}

/// Argon2 is CPU-bound, so hashing and checking run on the blocking pool.
async fn hash_password_blocking(password: String) -> Result<String, UsersServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| UsersServiceError::PasswordHash(e.to_string()))?
}

async fn verify_password_blocking(password: String, stored: String) -> Result<bool, UsersServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| UsersServiceError::PasswordHash(e.to_string()))
}

fn new_session_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Accounts and login sessions.
#[derive(Clone)]
pub struct UsersService {
    db: DatabaseConnection,
}

impl UsersService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Register a new account
    pub async fn signup(&self, credentials: Credentials) -> Result<UserModel, UsersServiceError> {
        credentials.validate()?;

        let taken = User::find()
            .filter(UserColumn::Username.eq(credentials.username.as_str()))
            .one(&self.db)
            .await?
            .is_some();

        if taken {
            return Err(UsersServiceError::UsernameTaken);
        }

        let password_hash = hash_password_blocking(credentials.password).await?;

        let user = UserActiveModel {
            id: NotSet,
            username: Set(credentials.username),
            password_hash: Set(password_hash),
            date_joined: Set(Utc::now()),
        };

        let result = User::insert(user).exec_with_returning(&self.db).await?;

        info!(user_id = %result.id, username = %result.username, "user signed up");
        Ok(result)
    }

    /// Check a password and open a session. Returns the session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, UsersServiceError> {
        let user = User::find()
            .filter(UserColumn::Username.eq(username))
            .one(&self.db)
            .await?;

        let verified = match &user {
            Some(u) => verify_password_blocking(password.to_string(), u.password_hash.clone()).await?,
            None => false,
        };

        let Some(user) = user.filter(|_| verified) else {
            warn!(username, "failed login");
            return Err(UsersServiceError::InvalidCredentials);
        };

        self.start_session(user.id).await
    }

    /// Open a session for an already authenticated user
    pub async fn start_session(&self, user_id: UserId) -> Result<String, UsersServiceError> {
        let token = new_session_token();

        let session = SessionActiveModel {
            id: NotSet,
            token: Set(token.clone()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        };
        Session::insert(session).exec(&self.db).await?;

        info!(user_id = %user_id, "session started");
        Ok(token)
    }

    /// Forget a session token. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UsersServiceError> {
        Session::delete_many()
            .filter(SessionColumn::Token.eq(token))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// The user behind a session token, if the token is live
    pub async fn resolve_session(&self, token: &str) -> Result<Option<UserModel>, UsersServiceError> {
        let found = Session::find()
            .filter(SessionColumn::Token.eq(token))
            .find_also_related(User)
            .one(&self.db)
            .await?;

        Ok(found.and_then(|(_, user)| user))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<UserModel, UsersServiceError> {
        User::find()
            .filter(UserColumn::Username.eq(username))
            .one(&self.db)
            .await?
            .ok_or(UsersServiceError::UserNotFound)
    }

    /// Delete an account with everything that depends on it: comments it
    /// wrote, its posts and their comments, follow edges on both sides and
    /// its sessions.
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), UsersServiceError> {
        let txn = self.db.begin().await?;

        if User::find_by_id(user_id).one(&txn).await?.is_none() {
            return Err(UsersServiceError::UserNotFound);
        }

        let post_ids: Vec<_> = Post::find()
            .filter(PostColumn::AuthorId.eq(user_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        Comment::delete_many()
            .filter(
                Condition::any()
                    .add(CommentColumn::AuthorId.eq(user_id))
                    .add(CommentColumn::PostId.is_in(post_ids)),
            )
            .exec(&txn)
            .await?;

        Post::delete_many()
            .filter(PostColumn::AuthorId.eq(user_id))
            .exec(&txn)
            .await?;

        Follow::delete_many()
            .filter(
                Condition::any()
                    .add(FollowColumn::UserId.eq(user_id))
                    .add(FollowColumn::AuthorId.eq(user_id)),
            )
            .exec(&txn)
            .await?;

        Session::delete_many()
            .filter(SessionColumn::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        User::delete_by_id(user_id).exec(&txn).await?;

        txn.commit().await?;

        info!(user_id = %user_id, "user deleted");
        Ok(())
    }
}
