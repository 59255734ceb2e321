//! The access-token gate shared by every protected handler.

use axum::http::HeaderMap;
use chrono::Utc;

use super::cookies;
use super::state::AppState;
use crate::domain::Role;
use crate::error::AppError;
use crate::store::Store;

/// Authenticated caller identity, resolved once per request.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_public_id: String,
    pub company_public_id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
}

/// Resolve the caller from the `access_token` cookie, falling back to an
/// `Authorization: Bearer` header. Fails closed on missing users and on
/// accounts that locked after the token was minted.
pub async fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<Principal, AppError> {
    let token = cookies::cookie_value(headers, cookies::ACCESS_COOKIE)
        .or_else(|| cookies::bearer_token(headers))
        .ok_or_else(|| AppError::Unauthenticated("authentication required".to_string()))?;

    let claims = state.tokens.verify_access(&token)?;

    let user = state
        .store
        .find_user_by_public_id(&claims.user_public_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("account no longer exists".to_string()))?;

    if user.is_login_blocked(Utc::now()) {
        return Err(AppError::Unauthenticated("account locked".to_string()));
    }

    Ok(Principal {
        user_public_id: user.public_id,
        company_public_id: user.company_public_id,
        role: user.role,
        name: user.name,
        email: user.email,
    })
}

impl Principal {
    /// Admin, or the target is the caller themselves.
    #[must_use]
    pub fn can_act_on(&self, target_public_id: &str) -> bool {
        self.role.is_admin() || self.user_public_id == target_public_id
    }
}
