//! Company-scoped user management. Everything here sits behind the access
//! token gate; admin-only routes additionally require an admin role on the
//! caller, and "self-or-admin" routes accept the target user themselves.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::auth::principal::{require_auth, Principal};
use super::auth::service::{validate_email, validate_password};
use super::auth::state::AppState;
use super::auth::types::{ApiResponse, UserView};
use crate::domain::{self, Permissions, Role, User, UserStatus};
use crate::error::AppError;
use crate::password;
use crate::store::{Store, StoreError, UserFilter};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub permissions: Option<Permissions>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListData {
    pub users: Vec<UserView>,
    pub pagination: Pagination,
}

fn require_admin(principal: &Principal) -> Result<(), AppError> {
    if principal.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin access required".to_string()))
    }
}

async fn load_target(
    state: &AppState,
    principal: &Principal,
    public_id: &str,
) -> Result<User, AppError> {
    state
        .store
        .find_user_scoped(&principal.company_public_id, public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))
}

/// Create a user inside the caller's company.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserView>),
        (status = 403, description = "Not an admin, or the seat quota is exhausted"),
        (status = 409, description = "Email already used in this company"),
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    require_admin(&principal)?;

    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    if state
        .store
        .find_user_in_company(&principal.company_public_id, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "a user with this email already exists".to_string(),
        ));
    }

    let company = state
        .store
        .find_company_by_public_id(&principal.company_public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("company not found".to_string()))?;
    let seats = state.store.count_users(&company.public_id).await?;
    if seats >= company.max_users {
        return Err(AppError::Forbidden(format!(
            "user limit reached ({} seats on the {} plan)",
            company.max_users, company.plan
        )));
    }

    let role = req.role.unwrap_or(Role::Viewer);
    let password_hash = password::hash_blocking(req.password).await?;
    let mut user = User::new(
        domain::new_public_id()?,
        company.public_id.clone(),
        name,
        email,
        password_hash,
        role,
    );
    if let Some(permissions) = req.permissions {
        user.permissions = permissions;
    }
    state
        .store
        .insert_user(&user)
        .await
        .map_err(|err| match err {
            StoreError::Conflict => {
                AppError::Conflict("a user with this email already exists".to_string())
            }
            other => other.into(),
        })?;

    info!(user = %user.public_id, company = %company.public_id, "user created");
    let body = ApiResponse::ok("user created", UserView::from(&user));
    Ok((StatusCode::CREATED, Json(body)))
}

/// List the company's users.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Users", body = ApiResponse<UserListData>),
        (status = 403, description = "Not an admin"),
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    require_admin(&principal)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let filter = UserFilter {
        role: query.role,
        offset: (page - 1) * limit,
        limit,
    };

    let users = state
        .store
        .list_users(&principal.company_public_id, &filter)
        .await?;
    let total = state
        .store
        .count_users(&principal.company_public_id)
        .await?;

    let body = ApiResponse::ok(
        "users",
        UserListData {
            users: users.iter().map(UserView::from).collect(),
            pagination: Pagination { page, limit, total },
        },
    );
    Ok(Json(body))
}

/// Fetch a single user.
#[utoipa::path(
    get,
    path = "/api/v1/users/{public_id}",
    params(("public_id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "User", body = ApiResponse<UserView>),
        (status = 403, description = "Neither the user themselves nor an admin"),
        (status = 404, description = "No such user in this company"),
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    if !principal.can_act_on(&public_id) {
        return Err(AppError::Forbidden("access denied".to_string()));
    }
    let user = load_target(&state, &principal, &public_id).await?;
    Ok(Json(ApiResponse::ok("user", UserView::from(&user))))
}

/// Update profile, role, permissions, or status.
#[utoipa::path(
    put,
    path = "/api/v1/users/{public_id}",
    params(("public_id" = String, Path, description = "User public id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserView>),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No such user in this company"),
        (status = 409, description = "New email already used in this company"),
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    require_admin(&principal)?;
    let mut user = load_target(&state, &principal, &public_id).await?;

    if let Some(name) = req.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        user.name = name;
    }
    if let Some(email) = req.email {
        let email = validate_email(&email)?;
        if email != user.email
            && state
                .store
                .find_user_in_company(&principal.company_public_id, &email)
                .await?
                .is_some()
        {
            return Err(AppError::Conflict(
                "a user with this email already exists".to_string(),
            ));
        }
        user.email = email;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(permissions) = req.permissions {
        user.permissions = permissions;
    }
    let deactivated = matches!(
        (user.status, req.status),
        (UserStatus::Active, Some(UserStatus::Inactive | UserStatus::Suspended))
    );
    if let Some(status) = req.status {
        user.status = status;
    }
    if deactivated {
        user.revoke_all_sessions();
    }
    user.updated_at = Utc::now();

    state.store.save_user(&user).await?;
    Ok(Json(ApiResponse::ok("user updated", UserView::from(&user))))
}

/// Delete a user. Deleting yourself is rejected.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{public_id}",
    params(("public_id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Attempted self-deletion"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No such user in this company"),
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    require_admin(&principal)?;
    if principal.user_public_id == public_id {
        return Err(AppError::Validation(
            "you cannot delete your own account".to_string(),
        ));
    }
    let user = load_target(&state, &principal, &public_id).await?;
    state.store.delete_user(&user.public_id).await?;
    info!(user = %user.public_id, "user deleted");
    Ok(Json(ApiResponse::message("user deleted")))
}

/// Change a password, revoking every session of the target user.
#[utoipa::path(
    put,
    path = "/api/v1/users/{public_id}/password",
    params(("public_id" = String, Path, description = "User public id")),
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 401, description = "Current password wrong"),
        (status = 403, description = "Neither the user themselves nor an admin"),
    ),
    tag = "users"
)]
pub async fn update_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    if !principal.can_act_on(&public_id) {
        return Err(AppError::Forbidden("access denied".to_string()));
    }
    validate_password(&req.new_password)?;
    let mut user = load_target(&state, &principal, &public_id).await?;

    // Admins may reset without the current password; users changing their
    // own must present it.
    if !principal.role.is_admin() {
        let current = req.current_password.ok_or_else(|| {
            AppError::Validation("current password is required".to_string())
        })?;
        let verified = password::verify_blocking(current, user.password_hash.clone()).await?;
        if !verified {
            return Err(AppError::InvalidCredentials);
        }
    }

    user.password_hash = password::hash_blocking(req.new_password).await?;
    user.revoke_all_sessions();
    user.updated_at = Utc::now();
    state.store.save_user(&user).await?;

    info!(user = %user.public_id, "password changed, sessions revoked");
    Ok(Json(ApiResponse::message("password updated")))
}

/// Flip a user between active and inactive. Deactivation signs them out
/// everywhere.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{public_id}/toggle-status",
    params(("public_id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "Status toggled", body = ApiResponse<UserView>),
        (status = 400, description = "Attempted self-toggle"),
        (status = 403, description = "Not an admin"),
    ),
    tag = "users"
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    require_admin(&principal)?;
    if principal.user_public_id == public_id {
        return Err(AppError::Validation(
            "you cannot change your own status".to_string(),
        ));
    }
    let mut user = load_target(&state, &principal, &public_id).await?;

    user.status = match user.status {
        UserStatus::Active => {
            user.revoke_all_sessions();
            UserStatus::Inactive
        }
        UserStatus::Inactive | UserStatus::Suspended => UserStatus::Active,
    };
    user.updated_at = Utc::now();
    state.store.save_user(&user).await?;

    Ok(Json(ApiResponse::ok(
        "status updated",
        UserView::from(&user),
    )))
}
