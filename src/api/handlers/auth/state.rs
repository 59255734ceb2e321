//! Shared state for the auth handlers.

use std::sync::Arc;
use url::Url;

use crate::store::Store;
use crate::tokens::TokenService;

/// Static auth configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: Url,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: Url) -> Self {
        Self { frontend_base_url }
    }

    /// Cookies are `Secure` whenever the site itself is served over https.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.scheme() == "https"
    }

    /// Origin allowed by CORS: scheme, host, and explicit port only.
    #[must_use]
    pub fn frontend_origin(&self) -> String {
        let url = &self.frontend_base_url;
        let port = url.port().map_or_else(String::new, |port| format!(":{port}"));
        format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            port
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub tokens: Arc<TokenService>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AuthConfig, tokens: TokenService, store: Arc<dyn Store>) -> Self {
        Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            store,
        }
    }
}
