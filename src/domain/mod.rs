//! Core entities: companies, users, and the per-user session list.

pub mod company;
pub mod session;
pub mod user;

pub use company::{Company, CompanyStatus, Plan};
pub use session::{DeviceInfo, SessionEntry, SessionView, MAX_ACTIVE_SESSIONS, SESSION_TTL_DAYS};
pub use user::{Permissions, Role, User, UserStatus, MAX_LOGIN_ATTEMPTS};

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};

/// Generate an opaque public identifier for a company or user.
///
/// Public identifiers are the only entity references that leave the service;
/// storage keys never do.
pub fn new_public_id() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate public id")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
