//! User model, role-derived permissions, and the login-lockout state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::session::SessionEntry;

/// Failed attempts allowed before the account locks.
pub const MAX_LOGIN_ATTEMPTS: i32 = 5;

/// How long a lock holds.
pub const LOCK_DURATION_MINUTES: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Admin,
    SuperAdmin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Admins and super-admins may manage other users in their company.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "viewer" => Ok(Self::Viewer),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_view_workouts: bool,
    pub can_view_analytics: bool,
    pub can_manage_content: bool,
}

impl Permissions {
    /// Defaults a role confers when a user is created.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Viewer => Self {
                can_view_workouts: true,
                can_view_analytics: false,
                can_manage_content: false,
            },
            Role::Admin | Role::SuperAdmin => Self {
                can_view_workouts: true,
                can_view_analytics: true,
                can_manage_content: true,
            },
        }
    }
}

/// A member of a company. Sessions and lockout state live on the record
/// itself so one read answers every auth question about the user.
#[derive(Clone, Debug)]
pub struct User {
    pub public_id: String,
    pub company_public_id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Permissions,
    pub status: UserStatus,
    pub is_locked: bool,
    pub login_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub sessions: Vec<SessionEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(
        public_id: String,
        company_public_id: String,
        name: String,
        email: String,
        password_hash: String,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            public_id,
            company_public_id,
            name,
            email,
            password_hash,
            role,
            permissions: Permissions::for_role(role),
            status: UserStatus::Active,
            is_locked: false,
            login_attempts: 0,
            lock_until: None,
            last_login: None,
            sessions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a login attempt must be rejected outright.
    #[must_use]
    pub fn is_login_blocked(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && self.lock_until.is_some_and(|until| until > now)
    }

    /// Register a failed password attempt.
    ///
    /// An expired lock is cleared first, so the failed attempt that follows a
    /// lapsed lock counts as attempt 1, not attempt 6. Returns whether this
    /// attempt locked (or found locked) the account.
    pub fn record_failed_login(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_locked && self.lock_until.is_some_and(|until| until <= now) {
            self.is_locked = false;
            self.lock_until = None;
            self.login_attempts = 0;
        }
        if self.is_locked {
            return true;
        }
        self.login_attempts += 1;
        if self.login_attempts >= MAX_LOGIN_ATTEMPTS {
            self.is_locked = true;
            self.lock_until = Some(now + Duration::minutes(LOCK_DURATION_MINUTES));
            return true;
        }
        false
    }

    /// Clear the counter and any lock after a successful login.
    pub fn reset_lockout(&mut self) {
        self.is_locked = false;
        self.login_attempts = 0;
        self.lock_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            "u-1".to_string(),
            "c-1".to_string(),
            "Ada".to_string(),
            "ada@acme.test".to_string(),
            "hash".to_string(),
            Role::Viewer,
        )
    }

    #[test]
    fn locks_on_fifth_failure() {
        let mut user = user();
        let now = Utc::now();
        for _ in 0..4 {
            assert!(!user.record_failed_login(now));
            assert!(!user.is_login_blocked(now));
        }
        assert!(user.record_failed_login(now));
        assert!(user.is_login_blocked(now));
        assert_eq!(user.login_attempts, 5);
    }

    #[test]
    fn expired_lock_resets_counter_to_one() {
        let mut user = user();
        let locked_at = Utc::now();
        for _ in 0..5 {
            user.record_failed_login(locked_at);
        }
        let after_expiry = locked_at + Duration::minutes(LOCK_DURATION_MINUTES + 1);
        assert!(!user.is_login_blocked(after_expiry));
        assert!(!user.record_failed_login(after_expiry));
        assert_eq!(user.login_attempts, 1);
        assert!(!user.is_locked);
    }

    #[test]
    fn failures_while_locked_do_not_accumulate() {
        let mut user = user();
        let now = Utc::now();
        for _ in 0..5 {
            user.record_failed_login(now);
        }
        assert!(user.record_failed_login(now));
        assert_eq!(user.login_attempts, 5);
    }

    #[test]
    fn reset_clears_lock_state() {
        let mut user = user();
        let now = Utc::now();
        for _ in 0..5 {
            user.record_failed_login(now);
        }
        user.reset_lockout();
        assert!(!user.is_login_blocked(now));
        assert_eq!(user.login_attempts, 0);
        assert_eq!(user.lock_until, None);
    }

    #[test]
    fn viewer_permissions_are_restricted() {
        let perms = Permissions::for_role(Role::Viewer);
        assert!(perms.can_view_workouts);
        assert!(!perms.can_view_analytics);
        assert!(!perms.can_manage_content);
        assert!(Permissions::for_role(Role::Admin).can_manage_content);
    }

    #[test]
    fn role_parsing() {
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert!(Role::SuperAdmin.is_admin());
        assert!(!Role::Viewer.is_admin());
        assert!("owner".parse::<Role>().is_err());
    }
}
