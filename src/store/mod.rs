//! Persistence seam.
//!
//! The `Store` trait is the only thing the service layer talks to; Postgres
//! backs it in production and an in-memory implementation backs the tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Company, Role, SessionEntry, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflicting record already exists")]
    Conflict,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Listing options for company-scoped user queries.
#[derive(Clone, Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub offset: i64,
    pub limit: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_company(&self, company: &Company) -> Result<(), StoreError>;
    async fn find_company_by_email(&self, email: &str) -> Result<Option<Company>, StoreError>;
    async fn find_company_by_public_id(
        &self,
        public_id: &str,
    ) -> Result<Option<Company>, StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    /// Persist every mutable field of an existing user, sessions included.
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
    async fn delete_user(&self, public_id: &str) -> Result<bool, StoreError>;

    /// Global lookup; login does not know the company yet.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_public_id(&self, public_id: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_in_company(
        &self,
        company_public_id: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn find_user_scoped(
        &self,
        company_public_id: &str,
        public_id: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn list_users(
        &self,
        company_public_id: &str,
        filter: &UserFilter,
    ) -> Result<Vec<User>, StoreError>;
    async fn count_users(&self, company_public_id: &str) -> Result<i64, StoreError>;

    /// Replace a user's session list only if `old_session_id` is still in it.
    ///
    /// This is the rotation primitive: a `false` return means another request
    /// already consumed the session and the caller must treat the token as
    /// revoked.
    async fn swap_sessions_if_present(
        &self,
        user_public_id: &str,
        old_session_id: &str,
        sessions: &[SessionEntry],
    ) -> Result<bool, StoreError>;
}
