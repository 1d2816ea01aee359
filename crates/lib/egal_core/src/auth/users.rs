//! The slice of user storage the auth flows depend on.

use async_trait::async_trait;
use uuid::Uuid;

use super::AuthError;
use super::pg::PgAuthRepository;
use super::queries;
use crate::models::auth::{User, UserWithPassword};

/// User lookups for login and password reset.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by email (case-insensitive).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError>;

    /// Find a user by ID.
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError>;

    /// Replace a user's password hash.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AuthError>;
}

#[async_trait]
impl UserStore for PgAuthRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        queries::find_user_by_email(self.pool(), email).await
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        queries::get_user_by_id(self.pool(), user_id).await
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        queries::update_password(self.pool(), user_id, password_hash).await
    }
}
