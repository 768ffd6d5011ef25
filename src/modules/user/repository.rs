use uuid::Uuid;

use crate::{
    api::error,
    modules::user::{model::InsertUser, schema::UserEntity},
};

#[async_trait::async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError>;

    /// Case-insensitive email match
    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, error::SystemError>;

    /// Exact email match, falling back to exact username match
    async fn find_by_email_or_username(
        &self,
        identifier: &str,
    ) -> Result<Option<UserEntity>, error::SystemError>;

    async fn create(&self, user: &InsertUser) -> Result<UserEntity, error::SystemError>;

    /// Users other than `exclude_id`, optionally filtered by a case-insensitive
    /// username substring, ordered by username.
    async fn search_users(
        &self,
        username_filter: Option<&str>,
        exclude_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserEntity>, error::SystemError>;

    async fn count_users(
        &self,
        username_filter: Option<&str>,
        exclude_id: &Uuid,
    ) -> Result<i64, error::SystemError>;
}

/// Server-side record of issued tokens, keyed by the token id (`jti`).
#[async_trait::async_trait]
pub trait SessionRepository {
    async fn save_session(
        &self,
        jti: &Uuid,
        user_id: &Uuid,
        ttl_secs: u64,
    ) -> Result<(), error::SystemError>;

    async fn find_session(&self, jti: &Uuid) -> Result<Option<Uuid>, error::SystemError>;

    /// Returns `false` when no session existed.
    async fn delete_session(&self, jti: &Uuid) -> Result<bool, error::SystemError>;
}
