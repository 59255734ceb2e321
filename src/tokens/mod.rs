//! Token Service: stateless JWT minting and verification.
//!
//! Access and refresh tokens are signed with two independent HMAC-SHA256
//! secrets and carry a `type` claim. Verification checks the claimed type
//! before the signature so a token presented to the wrong verifier fails as
//! a type mismatch rather than a signature error.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Company, User};

/// Access-token lifetime in seconds (15 minutes).
pub const ACCESS_TTL_SECS: i64 = 900;

/// Refresh-token lifetime in seconds (7 days).
pub const REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("wrong token type")]
    WrongType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_public_id: String,
    pub company_public_id: String,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_public_id: String,
    /// Matches the `session_id` of the grant stored on the user record.
    pub token_id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Only the type discriminator, for the pre-verification peek.
#[derive(Deserialize)]
struct KindClaim {
    #[serde(rename = "type")]
    kind: Option<TokenKind>,
}

pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenService {
    #[must_use]
    pub fn new(access_secret: &SecretString, refresh_secret: &SecretString) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
        }
    }

    /// Mint a short-lived access token for the user within their company.
    pub fn mint_access_token(&self, user: &User, company: &Company) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_public_id: user.public_id.clone(),
            company_public_id: company.public_id.clone(),
            role: user.role.to_string(),
            kind: TokenKind::Access,
            iat: now,
            exp: now + ACCESS_TTL_SECS,
        };
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.access_encoding)
            .context("failed to sign access token")
    }

    /// Mint a refresh token and the session id it redeems against.
    pub fn mint_refresh_pair(&self, user: &User) -> Result<(String, String)> {
        let session_id = new_session_id()?;
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            user_public_id: user.public_id.clone(),
            token_id: session_id.clone(),
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + REFRESH_TTL_SECS,
        };
        let token =
            jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.refresh_encoding)
                .context("failed to sign refresh token")?;
        Ok((session_id, token))
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token, TokenKind::Access, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token, TokenKind::Refresh, &self.refresh_decoding)
    }

    fn verify<C: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        expected: TokenKind,
        key: &DecodingKey,
    ) -> Result<C, TokenError> {
        if peek_kind(token)? != expected {
            return Err(TokenError::WrongType);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<C>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

/// Read the `type` claim without checking the signature. The full decode
/// that follows still verifies signature and expiry with the proper key.
fn peek_kind(token: &str) -> Result<TokenKind, TokenError> {
    let mut unsigned = Validation::new(Algorithm::HS256);
    unsigned.insecure_disable_signature_validation();
    unsigned.validate_exp = false;
    unsigned.required_spec_claims.clear();
    jsonwebtoken::decode::<KindClaim>(token, &DecodingKey::from_secret(&[]), &unsigned)
        .map_err(|_| TokenError::Invalid)?
        .claims
        .kind
        .ok_or(TokenError::Invalid)
}

/// 256 bits of session-id entropy, base64url without padding.
pub fn new_session_id() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session id")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn service() -> TokenService {
        TokenService::new(
            &SecretString::from("access-secret"),
            &SecretString::from("refresh-secret"),
        )
    }

    fn user() -> User {
        User::new(
            "u-1".to_string(),
            "c-1".to_string(),
            "Ada".to_string(),
            "ada@acme.test".to_string(),
            "hash".to_string(),
            Role::Admin,
        )
    }

    fn company() -> Company {
        Company::new(
            "c-1".to_string(),
            "Acme Fitness".to_string(),
            "owner@acme.test".to_string(),
            "hash".to_string(),
        )
    }

    #[test]
    fn access_token_round_trip() {
        let service = service();
        let token = service.mint_access_token(&user(), &company()).unwrap();
        let claims = service.verify_access(&token).unwrap();
        assert_eq!(claims.user_public_id, "u-1");
        assert_eq!(claims.company_public_id, "c-1");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, ACCESS_TTL_SECS);
    }

    #[test]
    fn refresh_token_carries_the_session_id() {
        let service = service();
        let (session_id, token) = service.mint_refresh_pair(&user()).unwrap();
        let claims = service.verify_refresh(&token).unwrap();
        assert_eq!(claims.token_id, session_id);
        assert_eq!(claims.user_public_id, "u-1");
        assert_eq!(claims.exp - claims.iat, REFRESH_TTL_SECS);
    }

    #[test]
    fn token_types_are_isolated_both_ways() {
        let service = service();
        let access = service.mint_access_token(&user(), &company()).unwrap();
        let (_, refresh) = service.mint_refresh_pair(&user()).unwrap();

        assert_eq!(service.verify_refresh(&access), Err(TokenError::WrongType));
        assert_eq!(service.verify_access(&refresh), Err(TokenError::WrongType));
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let ours = service();
        let theirs = TokenService::new(
            &SecretString::from("other-access"),
            &SecretString::from("other-refresh"),
        );
        let token = theirs.mint_access_token(&user(), &company()).unwrap();
        assert_eq!(ours.verify_access(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let service = service();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_public_id: "u-1".to_string(),
            company_public_id: "c-1".to_string(),
            role: "viewer".to_string(),
            kind: TokenKind::Access,
            iat: now - 1000,
            exp: now - 120,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();
        assert_eq!(service.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_invalid() {
        let service = service();
        assert_eq!(service.verify_access("not.a.jwt"), Err(TokenError::Invalid));
    }

    #[test]
    fn session_ids_are_256_bit() {
        let id = new_session_id().unwrap();
        assert_eq!(URL_SAFE_NO_PAD.decode(id.as_bytes()).unwrap().len(), 32);
    }
}
