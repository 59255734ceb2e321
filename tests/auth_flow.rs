//! End-to-end scenarios over the HTTP router with the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

use fitcore::api::handlers::auth::state::{AppState, AuthConfig};
use fitcore::api::router;
use fitcore::store::MemoryStore;
use fitcore::tokens::TokenService;

fn app() -> Router {
    let state = AppState::new(
        AuthConfig::new(Url::parse("http://localhost:5173").unwrap()),
        TokenService::new(
            &SecretString::from("it-access-secret"),
            &SecretString::from("it-refresh-secret"),
        ),
        Arc::new(MemoryStore::new()),
    );
    router(state)
}

/// Cookies accumulated from `Set-Cookie` response headers.
#[derive(Default, Clone)]
struct Jar {
    access: Option<String>,
    refresh: Option<String>,
}

impl Jar {
    fn absorb(&mut self, response: &axum::http::Response<Body>) {
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let Some((pair, _)) = value.split_once(';') else { continue };
            let Some((name, cookie)) = pair.split_once('=') else { continue };
            let cookie = (!cookie.is_empty()).then(|| cookie.to_string());
            match name {
                "access_token" => self.access = cookie,
                "refresh_token" => self.refresh = cookie,
                _ => {}
            }
        }
    }

    fn header(&self) -> String {
        let mut parts = Vec::new();
        if let Some(access) = &self.access {
            parts.push(format!("access_token={access}"));
        }
        if let Some(refresh) = &self.refresh {
            parts.push(format!("refresh_token={refresh}"));
        }
        parts.join("; ")
    }
}

fn request(method: Method, uri: &str, jar: &Jar, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let cookie_header = jar.header();
    if !cookie_header.is_empty() {
        builder = builder.header(COOKIE, cookie_header);
    }
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, jar: &mut Jar, email: &str) -> Value {
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/register",
            jar,
            Some(json!({
                "companyName": "Acme Fitness",
                "name": "Ada",
                "email": email,
                "password": "s3cret-pw",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    jar.absorb(&response);
    body_json(response).await
}

#[tokio::test]
async fn register_login_refresh_logout_scenario() {
    let app = app();
    let mut jar = Jar::default();

    let body = register(&app, &mut jar, "ada@acme.test").await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["user"]["role"], json!("super_admin"));
    assert!(jar.access.is_some());
    assert!(jar.refresh.is_some());

    // Fresh login.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/login",
            &Jar::default(),
            Some(json!({ "email": "ada@acme.test", "password": "s3cret-pw" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut jar = Jar::default();
    jar.absorb(&response);
    let old_refresh = jar.refresh.clone().unwrap();

    // The protected profile route works with the cookie.
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/auth/me", &jar, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["email"], json!("ada@acme.test"));
    assert_eq!(body["data"]["company"]["name"], json!("Acme Fitness"));

    // Refresh rotates both cookies.
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/auth/refresh", &jar, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    jar.absorb(&response);
    assert_ne!(jar.refresh.as_deref(), Some(old_refresh.as_str()));

    // The pre-rotation refresh token is dead.
    let mut stale = jar.clone();
    stale.refresh = Some(old_refresh);
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/auth/refresh", &stale, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logout clears the cookies and kills the session.
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/auth/logout", &jar, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let refresh_after_logout = jar.refresh.clone();
    jar.absorb(&response);
    assert!(jar.access.is_none());
    assert!(jar.refresh.is_none());

    let mut dead = Jar::default();
    dead.refresh = refresh_after_logout;
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/auth/refresh", &dead, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn five_wrong_passwords_lock_the_account() {
    let app = app();
    let mut jar = Jar::default();
    register(&app, &mut jar, "ada@acme.test").await;

    let bad_login = || {
        request(
            Method::POST,
            "/api/v1/auth/login",
            &Jar::default(),
            Some(json!({ "email": "ada@acme.test", "password": "wrong-password" })),
        )
    };

    for _ in 0..4 {
        let response = app.clone().oneshot(bad_login()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.clone().oneshot(bad_login()).await.unwrap();
    assert_eq!(response.status(), StatusCode::LOCKED);

    // The correct password is now rejected too.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/login",
            &Jar::default(),
            Some(json!({ "email": "ada@acme.test", "password": "s3cret-pw" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::LOCKED);
}

#[tokio::test]
async fn failed_refresh_clears_both_cookies() {
    let app = app();
    let mut jar = Jar::default();
    jar.refresh = Some("garbage-token".to_string());

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/auth/refresh", &jar, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let clearing: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(ToString::to_string)
        .collect();
    assert_eq!(clearing.len(), 2);
    for value in clearing {
        assert!(value.contains("Max-Age=0"), "{value}");
    }
}

#[tokio::test]
async fn missing_cookie_and_bearer_fallback() {
    let app = app();
    let mut jar = Jar::default();
    register(&app, &mut jar, "ada@acme.test").await;

    // No credentials at all.
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/auth/me", &Jar::default(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Bearer header instead of the cookie.
    let token = jar.access.clone().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/auth/me")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A refresh token is not accepted as an access token.
    let refresh = jar.refresh.clone().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/auth/me")
                .header("authorization", format!("Bearer {refresh}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_management_enforces_roles() {
    let app = app();
    let mut admin = Jar::default();
    register(&app, &mut admin, "owner@acme.test").await;

    // Admin creates a viewer.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/users",
            &admin,
            Some(json!({
                "name": "Vera",
                "email": "vera@acme.test",
                "password": "viewer-pw",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let viewer_id = body["data"]["publicId"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["role"], json!("viewer"));

    // The viewer logs in.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/login",
            &Jar::default(),
            Some(json!({ "email": "vera@acme.test", "password": "viewer-pw" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut viewer = Jar::default();
    viewer.absorb(&response);

    // Viewers cannot list users.
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/users", &viewer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // But can fetch their own profile.
    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/v1/users/{viewer_id}"),
            &viewer,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // And not someone else's.
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/users/someone-else", &viewer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The admin sees both users.
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/users", &admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["pagination"]["total"], json!(2));
    let listed = body["data"]["users"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    for user in listed {
        assert!(user.get("passwordHash").is_none());
        assert!(user.get("sessions").is_none());
    }
}

#[tokio::test]
async fn duplicate_user_email_and_quota() {
    let app = app();
    let mut admin = Jar::default();
    register(&app, &mut admin, "owner@acme.test").await;

    let create = |email: String| {
        request(
            Method::POST,
            "/api/v1/users",
            &admin,
            Some(json!({ "name": "N", "email": email, "password": "member-pw" })),
        )
    };

    let response = app
        .clone()
        .oneshot(create("dup@acme.test".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(create("dup@acme.test".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The free plan seats 5; the owner plus four more fills it.
    for n in 0..3 {
        let response = app
            .clone()
            .oneshot(create(format!("member{n}@acme.test")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let response = app
        .clone()
        .oneshot(create("overflow@acme.test".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn password_change_revokes_every_session() {
    let app = app();
    let mut admin = Jar::default();
    let body = register(&app, &mut admin, "owner@acme.test").await;
    let admin_id = body["data"]["user"]["publicId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/api/v1/users/{admin_id}/password"),
            &admin,
            Some(json!({ "newPassword": "brand-new-pw" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The refresh token from registration is gone with the sessions.
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/auth/refresh", &admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The new password works.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/login",
            &Jar::default(),
            Some(json!({ "email": "owner@acme.test", "password": "brand-new-pw" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn deactivation_revokes_sessions_and_self_toggle_is_rejected() {
    let app = app();
    let mut admin = Jar::default();
    let body = register(&app, &mut admin, "owner@acme.test").await;
    let admin_id = body["data"]["user"]["publicId"].as_str().unwrap().to_string();

    // Create and log in a viewer.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/users",
            &admin,
            Some(json!({ "name": "Vera", "email": "vera@acme.test", "password": "viewer-pw" })),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let viewer_id = body["data"]["publicId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/login",
            &Jar::default(),
            Some(json!({ "email": "vera@acme.test", "password": "viewer-pw" })),
        ))
        .await
        .unwrap();
    let mut viewer = Jar::default();
    viewer.absorb(&response);

    // Deactivate the viewer.
    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/users/{viewer_id}/toggle-status"),
            &admin,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], json!("inactive"));

    // Their refresh token died with the sessions.
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/auth/refresh", &viewer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Admins cannot toggle themselves.
    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/users/{admin_id}/toggle-status"),
            &admin,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_listing_hides_identifiers() {
    let app = app();
    let mut jar = Jar::default();
    register(&app, &mut jar, "ada@acme.test").await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/auth/sessions", &jar, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].get("sessionId").is_none());
    assert!(sessions[0].get("device").is_some());
}

#[tokio::test]
async fn health_and_root_routes() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/health", &Jar::default(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-app").is_some());

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/", &Jar::default(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_validation_and_conflict() {
    let app = app();
    let mut jar = Jar::default();
    register(&app, &mut jar, "ada@acme.test").await;

    // Same company email again.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/register",
            &Jar::default(),
            Some(json!({
                "companyName": "Copy Cat",
                "name": "Bob",
                "email": "ada@acme.test",
                "password": "s3cret-pw",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Bad email and short password.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/register",
            &Jar::default(),
            Some(json!({
                "companyName": "Acme",
                "name": "Bob",
                "email": "not-an-email",
                "password": "s3cret-pw",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/register",
            &Jar::default(),
            Some(json!({
                "companyName": "Acme",
                "name": "Bob",
                "email": "bob@other.test",
                "password": "short",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
