//! Postgres `Store` backed by sqlx.
//!
//! Enum fields are stored as text and parsed on the way out; the session
//! list and permissions are JSONB. Every query runs inside a `db.query`
//! span carrying the statement for tracing.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{info_span, Instrument};

use super::{Store, StoreError, UserFilter};
use crate::domain::{Company, SessionEntry, User};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn map_write_err(err: sqlx::Error, what: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict
    } else {
        StoreError::Backend(anyhow!(err).context(format!("failed to write {what}")))
    }
}

fn row_to_company(row: &sqlx::postgres::PgRow) -> Result<Company, StoreError> {
    let plan: String = row.try_get("plan").map_err(anyhow::Error::from)?;
    let status: String = row.try_get("status").map_err(anyhow::Error::from)?;
    Ok(Company {
        public_id: row.try_get("public_id").map_err(anyhow::Error::from)?,
        name: row.try_get("name").map_err(anyhow::Error::from)?,
        email: row.try_get("email").map_err(anyhow::Error::from)?,
        password_hash: row.try_get("password_hash").map_err(anyhow::Error::from)?,
        plan: plan.parse().map_err(|err: String| anyhow!(err))?,
        max_users: row.try_get("max_users").map_err(anyhow::Error::from)?,
        status: status.parse().map_err(|err: String| anyhow!(err))?,
        created_at: row.try_get("created_at").map_err(anyhow::Error::from)?,
        updated_at: row.try_get("updated_at").map_err(anyhow::Error::from)?,
    })
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role").map_err(anyhow::Error::from)?;
    let status: String = row.try_get("status").map_err(anyhow::Error::from)?;
    let permissions: String = row.try_get("permissions").map_err(anyhow::Error::from)?;
    let sessions: String = row.try_get("sessions").map_err(anyhow::Error::from)?;
    Ok(User {
        public_id: row.try_get("public_id").map_err(anyhow::Error::from)?,
        company_public_id: row
            .try_get("company_public_id")
            .map_err(anyhow::Error::from)?,
        name: row.try_get("name").map_err(anyhow::Error::from)?,
        email: row.try_get("email").map_err(anyhow::Error::from)?,
        password_hash: row.try_get("password_hash").map_err(anyhow::Error::from)?,
        role: role.parse().map_err(|err: String| anyhow!(err))?,
        permissions: serde_json::from_str(&permissions)
            .context("malformed permissions column")?,
        status: status.parse().map_err(|err: String| anyhow!(err))?,
        is_locked: row.try_get("is_locked").map_err(anyhow::Error::from)?,
        login_attempts: row.try_get("login_attempts").map_err(anyhow::Error::from)?,
        lock_until: row.try_get("lock_until").map_err(anyhow::Error::from)?,
        last_login: row.try_get("last_login").map_err(anyhow::Error::from)?,
        sessions: serde_json::from_str(&sessions).context("malformed sessions column")?,
        created_at: row.try_get("created_at").map_err(anyhow::Error::from)?,
        updated_at: row.try_get("updated_at").map_err(anyhow::Error::from)?,
    })
}

fn sessions_json(sessions: &[SessionEntry]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(sessions).context("failed to serialize sessions")?)
}

const COMPANY_COLUMNS: &str =
    "public_id, name, email, password_hash, plan, max_users, status, created_at, updated_at";

const USER_COLUMNS: &str = "public_id, company_public_id, name, email, password_hash, role, \
     permissions::text AS permissions, status, is_locked, login_attempts, lock_until, \
     last_login, sessions::text AS sessions, created_at, updated_at";

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "SELECT 1"
        );
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::Backend(anyhow!(err).context("database ping failed")))?;
        Ok(())
    }

    async fn insert_company(&self, company: &Company) -> Result<(), StoreError> {
        let statement = format!(
            "INSERT INTO companies ({COMPANY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %statement
        );
        sqlx::query(&statement)
            .bind(&company.public_id)
            .bind(&company.name)
            .bind(&company.email)
            .bind(&company.password_hash)
            .bind(company.plan.as_str())
            .bind(company.max_users)
            .bind(company.status.as_str())
            .bind(company.created_at)
            .bind(company.updated_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_write_err(err, "company"))?;
        Ok(())
    }

    async fn find_company_by_email(&self, email: &str) -> Result<Option<Company>, StoreError> {
        let statement =
            format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE LOWER(email) = LOWER($1)");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let row = sqlx::query(&statement)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                StoreError::Backend(anyhow!(err).context("failed to query company by email"))
            })?;
        row.as_ref().map(row_to_company).transpose()
    }

    async fn find_company_by_public_id(
        &self,
        public_id: &str,
    ) -> Result<Option<Company>, StoreError> {
        let statement = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE public_id = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let row = sqlx::query(&statement)
            .bind(public_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                StoreError::Backend(anyhow!(err).context("failed to query company by id"))
            })?;
        row.as_ref().map(row_to_company).transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let statement = "INSERT INTO users (public_id, company_public_id, name, email, \
             password_hash, role, permissions, status, is_locked, login_attempts, lock_until, \
             last_login, sessions, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, \
             $7::jsonb, $8, $9, $10, $11, $12, $13::jsonb, $14, $15)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %statement
        );
        let permissions =
            serde_json::to_string(&user.permissions).context("failed to serialize permissions")?;
        sqlx::query(statement)
            .bind(&user.public_id)
            .bind(&user.company_public_id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(permissions)
            .bind(user.status.as_str())
            .bind(user.is_locked)
            .bind(user.login_attempts)
            .bind(user.lock_until)
            .bind(user.last_login)
            .bind(sessions_json(&user.sessions)?)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_write_err(err, "user"))?;
        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let statement = "UPDATE users SET name = $2, email = $3, password_hash = $4, role = $5, \
             permissions = $6::jsonb, status = $7, is_locked = $8, login_attempts = $9, \
             lock_until = $10, last_login = $11, sessions = $12::jsonb, updated_at = NOW() \
             WHERE public_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %statement
        );
        let permissions =
            serde_json::to_string(&user.permissions).context("failed to serialize permissions")?;
        let result = sqlx::query(statement)
            .bind(&user.public_id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(permissions)
            .bind(user.status.as_str())
            .bind(user.is_locked)
            .bind(user.login_attempts)
            .bind(user.lock_until)
            .bind(user.last_login)
            .bind(sessions_json(&user.sessions)?)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_write_err(err, "user"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(anyhow!(
                "no such user: {}",
                user.public_id
            )));
        }
        Ok(())
    }

    async fn delete_user(&self, public_id: &str) -> Result<bool, StoreError> {
        let statement = "DELETE FROM users WHERE public_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = %statement
        );
        let result = sqlx::query(statement)
            .bind(public_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::Backend(anyhow!(err).context("failed to delete user")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let statement =
            format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let row = sqlx::query(&statement)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                StoreError::Backend(anyhow!(err).context("failed to query user by email"))
            })?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_user_by_public_id(&self, public_id: &str) -> Result<Option<User>, StoreError> {
        let statement = format!("SELECT {USER_COLUMNS} FROM users WHERE public_id = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let row = sqlx::query(&statement)
            .bind(public_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                StoreError::Backend(anyhow!(err).context("failed to query user by id"))
            })?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_user_in_company(
        &self,
        company_public_id: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let statement = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE company_public_id = $1 AND LOWER(email) = LOWER($2)"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let row = sqlx::query(&statement)
            .bind(company_public_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                StoreError::Backend(anyhow!(err).context("failed to query company user"))
            })?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_user_scoped(
        &self,
        company_public_id: &str,
        public_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let statement = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE company_public_id = $1 AND public_id = $2"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let row = sqlx::query(&statement)
            .bind(company_public_id)
            .bind(public_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                StoreError::Backend(anyhow!(err).context("failed to query scoped user"))
            })?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn list_users(
        &self,
        company_public_id: &str,
        filter: &UserFilter,
    ) -> Result<Vec<User>, StoreError> {
        let statement = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE company_public_id = $1 AND ($2::text IS NULL OR role = $2) \
             ORDER BY created_at DESC OFFSET $3 LIMIT $4"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let rows = sqlx::query(&statement)
            .bind(company_public_id)
            .bind(filter.role.map(|role| role.as_str()))
            .bind(filter.offset)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::Backend(anyhow!(err).context("failed to list users")))?;
        rows.iter().map(row_to_user).collect()
    }

    async fn count_users(&self, company_public_id: &str) -> Result<i64, StoreError> {
        let statement = "SELECT COUNT(*) AS total FROM users WHERE company_public_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %statement
        );
        let row = sqlx::query(statement)
            .bind(company_public_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::Backend(anyhow!(err).context("failed to count users")))?;
        Ok(row.try_get("total").map_err(anyhow::Error::from)?)
    }

    async fn swap_sessions_if_present(
        &self,
        user_public_id: &str,
        old_session_id: &str,
        sessions: &[SessionEntry],
    ) -> Result<bool, StoreError> {
        // Containment probe: matches only while the old grant is still stored,
        // so two concurrent refreshes can never both succeed.
        let statement = "UPDATE users SET sessions = $2::jsonb, updated_at = NOW() \
             WHERE public_id = $1 AND sessions @> $3::jsonb";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %statement
        );
        let probe = serde_json::to_string(&serde_json::json!([{ "sessionId": old_session_id }]))
            .context("failed to serialize session probe")?;
        let result = sqlx::query(statement)
            .bind(user_public_id)
            .bind(sessions_json(sessions)?)
            .bind(probe)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                StoreError::Backend(anyhow!(err).context("failed to rotate session"))
            })?;
        Ok(result.rows_affected() > 0)
    }
}
