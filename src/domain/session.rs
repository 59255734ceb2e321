//! Per-user session list: an ordered set of refresh-token grants embedded in
//! the user record and serialized as-is into the `sessions` JSONB column.
//!
//! The list is capped at [`MAX_ACTIVE_SESSIONS`]; appending past the cap
//! drops the oldest entries by position. Expired entries are never valid for
//! lookup even while they are still stored, pruning only reclaims space.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user::User;

/// Upper bound on concurrently active sessions per user.
pub const MAX_ACTIVE_SESSIONS: usize = 5;

/// Refresh-token lifetime in days.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Client context captured when a session is created, refreshed on rotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub ip: String,
    pub last_used: DateTime<Utc>,
}

/// One refresh-token grant. The `session_id` here must match the `tokenId`
/// claim inside the refresh JWT for the grant to be redeemable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub session_id: String,
    pub device: DeviceInfo,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionEntry {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// What session listings expose. Deliberately omits the session id.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub device: DeviceInfo,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Append a new session, evicting the oldest entries beyond the cap.
    pub fn add_session(&mut self, session_id: String, user_agent: String, ip: String) {
        let now = Utc::now();
        self.sessions.push(SessionEntry {
            session_id,
            device: DeviceInfo {
                user_agent,
                ip,
                last_used: now,
            },
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
            created_at: now,
        });
        if self.sessions.len() > MAX_ACTIVE_SESSIONS {
            let excess = self.sessions.len() - MAX_ACTIVE_SESSIONS;
            self.sessions.drain(..excess);
        }
    }

    /// Look up a session by id, treating expired entries as absent.
    #[must_use]
    pub fn find_active_session(&self, session_id: &str, now: DateTime<Utc>) -> Option<&SessionEntry> {
        self.sessions
            .iter()
            .find(|entry| entry.session_id == session_id && !entry.is_expired(now))
    }

    /// Drop expired entries. Safe to call repeatedly.
    pub fn prune_expired_sessions(&mut self, now: DateTime<Utc>) {
        self.sessions.retain(|entry| !entry.is_expired(now));
    }

    /// Remove the session with the given id. Returns whether it was present.
    pub fn revoke_session(&mut self, session_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|entry| entry.session_id != session_id);
        self.sessions.len() < before
    }

    /// Sign the user out everywhere.
    pub fn revoke_all_sessions(&mut self) {
        self.sessions.clear();
    }

    /// Unexpired sessions, projected for listing.
    #[must_use]
    pub fn session_overview(&self, now: DateTime<Utc>) -> Vec<SessionView> {
        self.sessions
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| SessionView {
                device: entry.device.clone(),
                expires_at: entry.expires_at,
                created_at: entry.created_at,
            })
            .collect()
    }
}
