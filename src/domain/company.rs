//! Company (tenant) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Default seat quota for newly registered companies.
pub const DEFAULT_MAX_USERS: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown plan: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyStatus {
    Active,
    Suspended,
    Canceled,
}

impl CompanyStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Canceled => "canceled",
        }
    }
}

impl FromStr for CompanyStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unknown company status: {other}")),
        }
    }
}

/// A registered gym or studio. Owns zero-or-more users by reference
/// (`User::company_public_id`), never by containment.
#[derive(Clone, Debug)]
pub struct Company {
    pub public_id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub plan: Plan,
    pub max_users: i64,
    pub status: CompanyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    #[must_use]
    pub fn new(public_id: String, name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            public_id,
            name,
            email,
            password_hash,
            plan: Plan::Free,
            max_users: DEFAULT_MAX_USERS,
            status: CompanyStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_round_trips_through_str() {
        for plan in [Plan::Free, Plan::Pro, Plan::Enterprise] {
            assert_eq!(plan.as_str().parse::<Plan>(), Ok(plan));
        }
        assert!("premium".parse::<Plan>().is_err());
    }

    #[test]
    fn new_company_defaults() {
        let company = Company::new(
            "id".to_string(),
            "Acme Fitness".to_string(),
            "owner@acme.test".to_string(),
            "hash".to_string(),
        );
        assert_eq!(company.plan, Plan::Free);
        assert_eq!(company.max_users, DEFAULT_MAX_USERS);
        assert_eq!(company.status, CompanyStatus::Active);
    }
}
