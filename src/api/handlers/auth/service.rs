//! Auth flows: registration, login with lockout, refresh rotation, logout,
//! identity and session listing. Handlers stay thin; everything stateful
//! happens here against the `Store`.

use anyhow::anyhow;
use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use super::state::AppState;
use super::types::{LoginRequest, RegisterRequest};
use crate::domain::{
    self, Company, DeviceInfo, Role, SessionEntry, SessionView, User, SESSION_TTL_DAYS,
};
use crate::error::AppError;
use crate::password;
use crate::store::{Store, StoreError};

/// Minimum password length accepted anywhere.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Request context recorded into the session entry.
#[derive(Clone, Debug)]
pub struct ClientMeta {
    pub user_agent: String,
    pub ip: String,
}

/// Freshly minted token pair, ready to be installed as cookies.
#[derive(Debug)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|_| unreachable!())
    })
}

pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email_regex().is_match(&email) {
        Ok(email)
    } else {
        Err(AppError::Validation("invalid email address".to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str, what: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(format!("{what} is required")));
    }
    Ok(name.to_string())
}

/// Mint a token pair and record its session on the user. The caller is
/// responsible for persisting the user afterwards.
fn issue_tokens(
    state: &AppState,
    user: &mut User,
    company: &Company,
    client: &ClientMeta,
) -> Result<TokenBundle, AppError> {
    let access_token = state.tokens.mint_access_token(user, company)?;
    let (session_id, refresh_token) = state.tokens.mint_refresh_pair(user)?;
    user.add_session(session_id, client.user_agent.clone(), client.ip.clone());
    Ok(TokenBundle {
        access_token,
        refresh_token,
    })
}

/// Create a company and its first (super-admin) user in one step.
pub async fn register(
    state: &AppState,
    req: RegisterRequest,
    client: &ClientMeta,
) -> Result<(User, Company, TokenBundle), AppError> {
    let company_name = validate_name(&req.company_name, "company name")?;
    let name = validate_name(&req.name, "name")?;
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;

    if state.store.find_company_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "a company with this email already exists".to_string(),
        ));
    }

    let password_hash = password::hash_blocking(req.password).await?;

    let company = Company::new(
        domain::new_public_id()?,
        company_name,
        email.clone(),
        password_hash.clone(),
    );
    state
        .store
        .insert_company(&company)
        .await
        .map_err(|err| match err {
            StoreError::Conflict => {
                AppError::Conflict("a company with this email already exists".to_string())
            }
            other => other.into(),
        })?;

    let mut user = User::new(
        domain::new_public_id()?,
        company.public_id.clone(),
        name,
        email,
        password_hash,
        Role::SuperAdmin,
    );
    user.last_login = Some(Utc::now());
    let bundle = issue_tokens(state, &mut user, &company, client)?;
    state.store.insert_user(&user).await?;

    info!(company = %company.public_id, "company registered");
    Ok((user, company, bundle))
}

/// Verify credentials with the lockout gate in front of the password check.
pub async fn login(
    state: &AppState,
    req: LoginRequest,
    client: &ClientMeta,
) -> Result<(User, Company, TokenBundle), AppError> {
    let email = validate_email(&req.email)?;

    let Some(mut user) = state.store.find_user_by_email(&email).await? else {
        return Err(AppError::InvalidCredentials);
    };

    let now = Utc::now();
    if user.is_login_blocked(now) {
        return Err(AppError::Locked);
    }

    let verified = password::verify_blocking(req.password, user.password_hash.clone()).await?;
    if !verified {
        let locked = user.record_failed_login(now);
        state.store.save_user(&user).await?;
        if locked {
            warn!(user = %user.public_id, "account locked after repeated failures");
            return Err(AppError::Locked);
        }
        return Err(AppError::InvalidCredentials);
    }

    let company = state
        .store
        .find_company_by_public_id(&user.company_public_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow!(
                "user {} references missing company {}",
                user.public_id,
                user.company_public_id
            ))
        })?;

    user.reset_lockout();
    user.last_login = Some(now);
    user.prune_expired_sessions(now);
    let bundle = issue_tokens(state, &mut user, &company, client)?;
    state.store.save_user(&user).await?;

    info!(user = %user.public_id, "login");
    Ok((user, company, bundle))
}

/// Redeem a refresh token, rotating its session atomically. The old session
/// id is single-use: losing the conditional swap means another request got
/// there first and the token must be treated as revoked.
pub async fn refresh(
    state: &AppState,
    refresh_token: &str,
    client: &ClientMeta,
) -> Result<(User, Company, TokenBundle), AppError> {
    let claims = state.tokens.verify_refresh(refresh_token)?;

    let mut user = state
        .store
        .find_user_by_public_id(&claims.user_public_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("account no longer exists".to_string()))?;

    let now = Utc::now();
    if user.find_active_session(&claims.token_id, now).is_none() {
        return Err(AppError::Unauthenticated("session revoked".to_string()));
    }

    let company = state
        .store
        .find_company_by_public_id(&user.company_public_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow!(
                "user {} references missing company {}",
                user.public_id,
                user.company_public_id
            ))
        })?;

    let access_token = state.tokens.mint_access_token(&user, &company)?;
    let (new_session_id, new_refresh_token) = state.tokens.mint_refresh_pair(&user)?;

    let mut rotated: Vec<SessionEntry> = user
        .sessions
        .iter()
        .filter(|entry| entry.session_id != claims.token_id && !entry.is_expired(now))
        .cloned()
        .collect();
    rotated.push(SessionEntry {
        session_id: new_session_id,
        device: DeviceInfo {
            user_agent: client.user_agent.clone(),
            ip: client.ip.clone(),
            last_used: now,
        },
        expires_at: now + Duration::days(SESSION_TTL_DAYS),
        created_at: now,
    });

    let swapped = state
        .store
        .swap_sessions_if_present(&user.public_id, &claims.token_id, &rotated)
        .await?;
    if !swapped {
        warn!(user = %user.public_id, "refresh token replayed");
        return Err(AppError::Unauthenticated("session revoked".to_string()));
    }
    user.sessions = rotated;

    Ok((
        user,
        company,
        TokenBundle {
            access_token,
            refresh_token: new_refresh_token,
        },
    ))
}

/// Revoke the session named by the refresh cookie, or every session when the
/// cookie is absent. An unreadable cookie revokes nothing; the cookies are
/// cleared regardless.
pub async fn logout(
    state: &AppState,
    user_public_id: &str,
    refresh_token: Option<&str>,
) -> Result<(), AppError> {
    let Some(mut user) = state.store.find_user_by_public_id(user_public_id).await? else {
        return Ok(());
    };

    match refresh_token {
        Some(token) => {
            if let Ok(claims) = state.tokens.verify_refresh(token) {
                user.revoke_session(&claims.token_id);
            }
        }
        None => user.revoke_all_sessions(),
    }

    state.store.save_user(&user).await?;
    info!(user = %user.public_id, "logout");
    Ok(())
}

/// Load the caller's user and company records.
pub async fn whoami(
    state: &AppState,
    user_public_id: &str,
) -> Result<(User, Company), AppError> {
    let user = state
        .store
        .find_user_by_public_id(user_public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    let company = state
        .store
        .find_company_by_public_id(&user.company_public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("company not found".to_string()))?;
    Ok((user, company))
}

/// Prune expired sessions, persist, and list what survives.
pub async fn list_sessions(
    state: &AppState,
    user_public_id: &str,
) -> Result<Vec<SessionView>, AppError> {
    let mut user = state
        .store
        .find_user_by_public_id(user_public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    let now = Utc::now();
    user.prune_expired_sessions(now);
    state.store.save_user(&user).await?;
    Ok(user.session_overview(now))
}
