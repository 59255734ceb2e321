//! In-memory `Store` used by unit and integration tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Store, StoreError, UserFilter};
use crate::domain::{Company, SessionEntry, User};

#[derive(Default)]
pub struct MemoryStore {
    companies: Mutex<Vec<Company>>,
    users: Mutex<Vec<User>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_company(&self, company: &Company) -> Result<(), StoreError> {
        let mut companies = self.companies.lock().await;
        if companies
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(&company.email))
        {
            return Err(StoreError::Conflict);
        }
        companies.push(company.clone());
        Ok(())
    }

    async fn find_company_by_email(&self, email: &str) -> Result<Option<Company>, StoreError> {
        Ok(self
            .companies
            .lock()
            .await
            .iter()
            .find(|company| company.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_company_by_public_id(
        &self,
        public_id: &str,
    ) -> Result<Option<Company>, StoreError> {
        Ok(self
            .companies
            .lock()
            .await
            .iter()
            .find(|company| company.public_id == public_id)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if users.iter().any(|existing| {
            existing.company_public_id == user.company_public_id
                && existing.email.eq_ignore_ascii_case(&user.email)
        }) {
            return Err(StoreError::Conflict);
        }
        users.push(user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        match users
            .iter_mut()
            .find(|existing| existing.public_id == user.public_id)
        {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(anyhow::anyhow!(
                "no such user: {}",
                user.public_id
            ))),
        }
    }

    async fn delete_user(&self, public_id: &str) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        let before = users.len();
        users.retain(|user| user.public_id != public_id);
        Ok(users.len() < before)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_public_id(&self, public_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.public_id == public_id)
            .cloned())
    }

    async fn find_user_in_company(
        &self,
        company_public_id: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| {
                user.company_public_id == company_public_id
                    && user.email.eq_ignore_ascii_case(email)
            })
            .cloned())
    }

    async fn find_user_scoped(
        &self,
        company_public_id: &str,
        public_id: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| {
                user.company_public_id == company_public_id && user.public_id == public_id
            })
            .cloned())
    }

    async fn list_users(
        &self,
        company_public_id: &str,
        filter: &UserFilter,
    ) -> Result<Vec<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .filter(|user| user.company_public_id == company_public_id)
            .filter(|user| filter.role.is_none_or(|role| user.role == role))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_users(&self, company_public_id: &str) -> Result<i64, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .filter(|user| user.company_public_id == company_public_id)
            .count() as i64)
    }

    async fn swap_sessions_if_present(
        &self,
        user_public_id: &str,
        old_session_id: &str,
        sessions: &[SessionEntry],
    ) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        let Some(user) = users
            .iter_mut()
            .find(|user| user.public_id == user_public_id)
        else {
            return Ok(false);
        };
        if !user
            .sessions
            .iter()
            .any(|entry| entry.session_id == old_session_id)
        {
            return Ok(false);
        }
        user.sessions = sessions.to_vec();
        Ok(true)
    }
}
