use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use log::warn;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::random_string, AuthSessionData, Database, DatabaseError, NewAuthSession, NewUser,
    UserData,
};

pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const SESSION_DURATION_IN_DAYS: usize = 7;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Logs in a user, returning a new login session
    pub async fn login(&self, credentials: Credentials) -> Result<AuthSessionData, AuthError> {
        self.clear_expired().await;

        let user = self
            .db
            .user_by_username(&credentials.username)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewAuthSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        self.db
            .create_auth_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    /// Deletes the associated login session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_auth_session_by_token(token).await
    }

    /// Creates a new account with a hashed password
    pub async fn register(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        self.db
            .create_user(NewUser {
                username: new_user.username,
                password: hashed_password,
                display_name: new_user.display_name,
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Returns a login session if it exists
    pub async fn session(&self, token: &str) -> Result<AuthSessionData, DatabaseError> {
        self.db.auth_session_by_token(token).await
    }

    async fn clear_expired(&self) {
        if let Err(err) = self.db.clear_expired_auth_sessions().await {
            warn!("Failed to clear expired auth sessions: {}", err);
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}
