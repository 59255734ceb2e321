//! OpenAPI document served through Swagger UI at `/docs`.

use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fitcore",
        description = "Multi-tenant fitness-studio management API",
        license(name = "BSD-3-Clause")
    ),
    paths(
        handlers::health::health,
        handlers::auth::register::register,
        handlers::auth::login::login,
        handlers::auth::refresh::refresh,
        handlers::auth::session::logout,
        handlers::auth::session::sessions,
        handlers::auth::me::me,
        handlers::users::create_user,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::update_password,
        handlers::users::toggle_status,
    ),
    tags(
        (name = "auth", description = "Registration, login, and session lifecycle"),
        (name = "users", description = "Company-scoped user management"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/auth/register",
            "/api/v1/auth/login",
            "/api/v1/auth/refresh",
            "/api/v1/auth/logout",
            "/api/v1/auth/me",
            "/api/v1/auth/sessions",
            "/api/v1/users",
            "/api/v1/users/{public_id}",
            "/api/v1/users/{public_id}/password",
            "/api/v1/users/{public_id}/toggle-status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
