//! In-process [`AuthRepository`](super::repository::AuthRepository).
//!
//! All state sits behind one mutex, so every operation, including rotation
//! and password-reset consumption, is a single atomic step. Also serves as a
//! [`UserStore`] so the HTTP layer can run without a database in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::AuthError;
use super::repository::{PasswordResetRepository, RefreshTokenRepository};
use super::users::UserStore;
use crate::models::auth::{
    ClientInfo, PasswordResetRecord, RefreshTokenRecord, RotationOutcome, User, UserWithPassword,
};
use crate::uuid::uuidv7;

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, UserWithPassword>,
    /// digest -> record
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    /// digest -> record
    password_resets: HashMap<String, PasswordResetRecord>,
}

/// Mutex-guarded token store.
#[derive(Debug, Default)]
pub struct MemoryAuthRepository {
    state: Mutex<State>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AuthError> {
        self.state
            .lock()
            .map_err(|_| AuthError::Internal("auth store lock poisoned".into()))
    }

    /// Register (or replace) a user.
    pub fn insert_user(&self, user: User, password_hash: &str) -> Result<(), AuthError> {
        self.lock()?.users.insert(
            user.id,
            UserWithPassword {
                user,
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    /// Change a stored user's role.
    pub fn set_role(&self, user_id: Uuid, role: &str) -> Result<(), AuthError> {
        let mut state = self.lock()?;
        let entry = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::Validation(format!("unknown user {user_id}")))?;
        entry.user.role = role.to_string();
        Ok(())
    }

    /// Fetch a refresh-token record by digest, regardless of state.
    pub fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.lock()?.refresh_tokens.get(token_hash).cloned())
    }

    /// All refresh-token records of a user.
    pub fn refresh_tokens_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RefreshTokenRecord>, AuthError> {
        let state = self.lock()?;
        let mut records: Vec<_> = state
            .refresh_tokens
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    /// Fetch a password-reset record by digest.
    pub fn find_password_reset(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetRecord>, AuthError> {
        Ok(self.lock()?.password_resets.get(token_hash).cloned())
    }

    /// Move a refresh token's expiry, e.g. to simulate the passage of time.
    pub fn set_refresh_token_expiry(
        &self,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut state = self.lock()?;
        let record = state
            .refresh_tokens
            .get_mut(token_hash)
            .ok_or(AuthError::InvalidRefreshToken)?;
        record.expires_at = expires_at;
        Ok(())
    }
}

impl State {
    fn role_of(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.users
            .get(&user_id)
            .map(|u| u.user.role.clone())
            .ok_or(AuthError::InvalidRefreshToken)
    }

    fn insert_refresh(
        &mut self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        client: ClientInfo<'_>,
    ) -> Result<(), AuthError> {
        if self.refresh_tokens.contains_key(token_hash) {
            return Err(AuthError::Internal("duplicate refresh token digest".into()));
        }
        self.refresh_tokens.insert(
            token_hash.to_string(),
            RefreshTokenRecord {
                id: uuidv7(),
                user_id,
                token_hash: token_hash.to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                expires_at,
                revoked: false,
                replaced_by: None,
                ip: client.ip.map(str::to_string),
                user_agent: client.user_agent.map(str::to_string),
            },
        );
        Ok(())
    }

    fn revoke_all(&mut self, user_id: Uuid) -> usize {
        let mut count = 0;
        for record in self
            .refresh_tokens
            .values_mut()
            .filter(|r| r.user_id == user_id && !r.revoked)
        {
            record.revoked = true;
            count += 1;
        }
        count
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryAuthRepository {
    async fn insert_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        client: ClientInfo<'_>,
    ) -> Result<(), AuthError> {
        self.lock()?
            .insert_refresh(token_hash, user_id, expires_at, client)
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        client: ClientInfo<'_>,
    ) -> Result<RotationOutcome, AuthError> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let old = state
            .refresh_tokens
            .get(old_hash)
            .cloned()
            .ok_or(AuthError::InvalidRefreshToken)?;

        if old.revoked {
            let revoked_count = state.revoke_all(old.user_id);
            let role = state.role_of(old.user_id)?;
            warn!(user_id = %old.user_id, revoked_count, "refresh token reuse detected, revoked all sessions");
            return Ok(RotationOutcome {
                user_id: old.user_id,
                role,
                reused: true,
            });
        }

        if old.is_expired(now) {
            return Err(AuthError::InvalidRefreshToken);
        }

        let role = state.role_of(old.user_id)?;
        state.insert_refresh(new_hash, old.user_id, new_expires_at, client)?;
        if let Some(parent) = state.refresh_tokens.get_mut(old_hash) {
            parent.revoked = true;
            parent.replaced_by = Some(new_hash.to_string());
            parent.last_used_at = Some(now);
        }

        Ok(RotationOutcome {
            user_id: old.user_id,
            role,
            reused: false,
        })
    }

    async fn revoke_refresh_token_by_hash(
        &self,
        token_hash: &str,
        replaced_by: Option<&str>,
    ) -> Result<(), AuthError> {
        let mut state = self.lock()?;
        let record = state
            .refresh_tokens
            .get_mut(token_hash)
            .ok_or(AuthError::InvalidRefreshToken)?;
        record.revoked = true;
        if let Some(replacement) = replaced_by {
            record.replaced_by = Some(replacement.to_string());
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.lock()?.revoke_all(user_id);
        Ok(())
    }
}

#[async_trait]
impl PasswordResetRepository for MemoryAuthRepository {
    async fn insert_password_reset(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut state = self.lock()?;
        if state.password_resets.contains_key(token_hash) {
            return Err(AuthError::Internal("duplicate password reset digest".into()));
        }
        state.password_resets.insert(
            token_hash.to_string(),
            PasswordResetRecord {
                id: uuidv7(),
                user_id,
                token_hash: token_hash.to_string(),
                created_at: Utc::now(),
                expires_at,
                used: false,
            },
        );
        Ok(())
    }

    async fn verify_and_mark_password_reset(&self, token_hash: &str) -> Result<Uuid, AuthError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        match state.password_resets.get_mut(token_hash) {
            Some(record) if !record.used && record.expires_at > now => {
                record.used = true;
                Ok(record.user_id)
            }
            _ => Err(AuthError::InvalidOrExpiredToken),
        }
    }
}

#[async_trait]
impl UserStore for MemoryAuthRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        let wanted = email.trim().to_lowercase();
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.user.email.to_lowercase() == wanted)
            .cloned())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.lock()?.users.get(&user_id).map(|u| u.user.clone()))
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let mut state = self.lock()?;
        let entry = state
            .users
            .get_mut(&user_id)
            .ok_or(AuthError::Persistence(sqlx::Error::RowNotFound))?;
        entry.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;

    fn later() -> DateTime<Utc> {
        Utc::now() + Duration::days(30)
    }

    fn add_user(repo: &MemoryAuthRepository, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        repo.insert_user(
            User {
                id,
                email: format!("{id}@example.com"),
                name: None,
                role: role.to_string(),
            },
            "unused-hash",
        )
        .unwrap();
        id
    }

    fn repo_with_user(role: &str) -> (MemoryAuthRepository, Uuid) {
        let repo = MemoryAuthRepository::new();
        let user = add_user(&repo, role);
        (repo, user)
    }

    #[tokio::test]
    async fn rotate_once_then_reuse_is_detected() {
        let (repo, user) = repo_with_user("learner");
        repo.insert_refresh_token("h1", user, later(), ClientInfo::default())
            .await
            .unwrap();

        let first = repo
            .rotate_refresh_token("h1", "h2", later(), ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(
            first,
            RotationOutcome {
                user_id: user,
                role: "learner".into(),
                reused: false
            }
        );

        let parent = repo.find_refresh_token("h1").unwrap().unwrap();
        assert!(parent.revoked);
        assert_eq!(parent.replaced_by.as_deref(), Some("h2"));
        assert!(parent.last_used_at.is_some());

        let second = repo
            .rotate_refresh_token("h1", "h3", later(), ClientInfo::default())
            .await
            .unwrap();
        assert!(second.reused);
        assert_eq!(second.user_id, user);
        assert!(repo.find_refresh_token("h3").unwrap().is_none());
        assert!(repo.find_refresh_token("h2").unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn reuse_revokes_sibling_sessions() {
        let (repo, user) = repo_with_user("learner");
        repo.insert_refresh_token("phone", user, later(), ClientInfo::default())
            .await
            .unwrap();
        repo.insert_refresh_token("laptop", user, later(), ClientInfo::default())
            .await
            .unwrap();

        repo.rotate_refresh_token("phone", "phone2", later(), ClientInfo::default())
            .await
            .unwrap();
        let reuse = repo
            .rotate_refresh_token("phone", "phone3", later(), ClientInfo::default())
            .await
            .unwrap();
        assert!(reuse.reused);

        // The laptop token was never reused but is now terminal.
        let laptop = repo
            .rotate_refresh_token("laptop", "laptop2", later(), ClientInfo::default())
            .await
            .unwrap();
        assert!(laptop.reused);
        assert!(
            repo.refresh_tokens_for_user(user)
                .unwrap()
                .iter()
                .all(|r| r.revoked)
        );
    }

    #[tokio::test]
    async fn reuse_does_not_touch_other_users() {
        let (repo, alice) = repo_with_user("learner");
        let bob = add_user(&repo, "learner");
        repo.insert_refresh_token("a", alice, later(), ClientInfo::default())
            .await
            .unwrap();
        repo.insert_refresh_token("b", bob, later(), ClientInfo::default())
            .await
            .unwrap();

        repo.revoke_refresh_token_by_hash("a", None).await.unwrap();
        assert!(
            repo.rotate_refresh_token("a", "a2", later(), ClientInfo::default())
                .await
                .unwrap()
                .reused
        );
        assert!(!repo.find_refresh_token("b").unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn unknown_digest_is_invalid() {
        let (repo, _) = repo_with_user("learner");
        let err = repo
            .rotate_refresh_token("nope", "h2", later(), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn expired_token_cannot_rotate() {
        let (repo, user) = repo_with_user("learner");
        repo.insert_refresh_token(
            "old",
            user,
            Utc::now() - Duration::seconds(1),
            ClientInfo::default(),
        )
        .await
        .unwrap();
        let err = repo
            .rotate_refresh_token("old", "new", later(), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
        assert!(repo.find_refresh_token("new").unwrap().is_none());
    }

    #[tokio::test]
    async fn rotation_records_client_metadata() {
        let (repo, user) = repo_with_user("admin");
        repo.insert_refresh_token("h1", user, later(), ClientInfo::default())
            .await
            .unwrap();
        repo.rotate_refresh_token(
            "h1",
            "h2",
            later(),
            ClientInfo::new(Some("10.0.0.1"), Some("firefox")),
        )
        .await
        .unwrap();
        let child = repo.find_refresh_token("h2").unwrap().unwrap();
        assert_eq!(child.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(child.user_agent.as_deref(), Some("firefox"));
        assert!(!child.revoked);
    }

    #[tokio::test]
    async fn revoke_by_hash_unknown_is_invalid() {
        let (repo, _) = repo_with_user("learner");
        let err = repo
            .revoke_refresh_token_by_hash("missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn revoke_all_is_idempotent() {
        let (repo, user) = repo_with_user("learner");
        repo.insert_refresh_token("h1", user, later(), ClientInfo::default())
            .await
            .unwrap();
        repo.revoke_all_for_user(user).await.unwrap();
        repo.revoke_all_for_user(user).await.unwrap();
        repo.revoke_all_for_user(Uuid::new_v4()).await.unwrap();
        assert!(repo.find_refresh_token("h1").unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn password_reset_consumed_once() {
        let (repo, user) = repo_with_user("learner");
        repo.insert_password_reset("r1", user, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(repo.verify_and_mark_password_reset("r1").await.unwrap(), user);
        let err = repo.verify_and_mark_password_reset("r1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
        assert!(repo.find_password_reset("r1").unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn expired_password_reset_is_rejected() {
        let (repo, user) = repo_with_user("learner");
        repo.insert_password_reset("r1", user, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        let err = repo.verify_and_mark_password_reset("r1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_password_reset_has_single_winner() {
        let (repo, user) = repo_with_user("learner");
        let repo = Arc::new(repo);
        repo.insert_password_reset("r1", user, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.verify_and_mark_password_reset("r1").await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(id) => {
                    assert_eq!(id, user);
                    winners += 1;
                }
                Err(e) => assert!(matches!(e, AuthError::InvalidOrExpiredToken)),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rotation_has_single_child() {
        let (repo, user) = repo_with_user("learner");
        let repo = Arc::new(repo);
        repo.insert_refresh_token("root", user, later(), ClientInfo::default())
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.rotate_refresh_token(
                        "root",
                        &format!("child-{i}"),
                        later(),
                        ClientInfo::default(),
                    )
                    .await
                })
            })
            .collect();

        let mut fresh = 0;
        for handle in handles {
            if !handle.await.unwrap().unwrap().reused {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
        // The losers observed reuse, so the single child is revoked too.
        assert!(
            repo.refresh_tokens_for_user(user)
                .unwrap()
                .iter()
                .all(|r| r.revoked)
        );
    }

    #[tokio::test]
    async fn rotation_reads_current_role() {
        let (repo, user) = repo_with_user("learner");
        repo.insert_refresh_token("h1", user, later(), ClientInfo::default())
            .await
            .unwrap();
        repo.set_role(user, "admin").unwrap();
        let outcome = repo
            .rotate_refresh_token("h1", "h2", later(), ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(outcome.role, "admin");
    }

    #[tokio::test]
    async fn user_store_lookups() {
        let (repo, user) = repo_with_user("learner");
        let email = format!("{user}@EXAMPLE.com");
        let found = repo.find_user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.user.id, user);
        repo.update_password(user, "new-hash").await.unwrap();
        let found = repo.find_user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.password_hash, "new-hash");
        assert!(repo.get_user_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }
}
