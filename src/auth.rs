use crate::config;
use crate::types::users::Session;

use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{Claims, Duration as JwtDuration, HS256Key, VerificationOptions};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use std::collections::HashSet;

#[derive(Debug, Clone)]
pub(crate) struct AuthState {
    key: HS256Key,
    issuer: String,
    cookie_name: String,
    token_ttl: time::Duration,
    cookie_secure: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid auth key")]
    InvalidKey,
    #[error("invalid auth token")]
    InvalidToken,
    #[error("auth token missing expiry")]
    MissingExpiry,
    #[error("auth token missing subject")]
    MissingSubject,
}

/// Role travels next to the subject (the user's email).
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    role: String,
}

/// How long the browser keeps the auth cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CookieLifetime {
    Remembered,
    BrowserSession,
}

impl AuthState {
    pub(crate) fn from_config(config: &config::AppConfig) -> Result<Self, AuthError> {
        let key_bytes = decode_key(&config.auth.key)?;
        Ok(Self {
            key: HS256Key::from_bytes(&key_bytes),
            issuer: config.app_name.clone(),
            cookie_name: config.auth.cookie_name.clone(),
            token_ttl: config.auth.token_ttl,
            cookie_secure: config.auth.cookie_secure,
        })
    }

    pub(crate) fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub(crate) fn issue_token(&self, session: &Session) -> Result<String, AuthError> {
        let ttl_seconds = self.token_ttl.whole_seconds();
        if ttl_seconds <= 0 {
            return Err(AuthError::InvalidToken);
        }
        let claims = Claims::with_custom_claims(
            SessionClaims {
                role: session.role.clone(),
            },
            JwtDuration::from_secs(ttl_seconds as u64),
        )
        .with_subject(&session.email)
        .with_issuer(&self.issuer);
        self.key
            .authenticate(claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub(crate) fn auth_cookie(&self, token: &str, lifetime: CookieLifetime) -> String {
        let mut cookie = format!(
            "{}={token}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name
        );
        if lifetime == CookieLifetime::Remembered {
            let max_age = self.token_ttl.whole_seconds().max(0);
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub(crate) fn clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub(crate) fn verify_token(&self, token: &str) -> Result<Session, AuthError> {
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from([self.issuer.clone()])),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.expires_at.is_none() {
            return Err(AuthError::MissingExpiry);
        }

        let email = claims.subject.ok_or(AuthError::MissingSubject)?;
        if email.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(Session {
            email,
            role: claims.custom.role,
        })
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub fn generate_auth_key() -> Result<String, AuthError> {
    let mut rng = OsRng;
    generate_auth_key_with_rng(&mut rng)
}

pub(crate) fn generate_auth_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let encoded = encode_config(bytes, URL_SAFE_NO_PAD);
    if encoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }
    Ok(encoded)
}
