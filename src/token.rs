//! Client-side access token inspection
//!
//! The payload segment is decoded without verifying the signature; the
//! backend stays the authority on validity. Decoding is only used to read
//! the user record and to skip requests with a token that has already expired.

use crate::types::UserInfo;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Claims carried by a dev2gis access token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Decode the payload of a JWT, `None` if it is not a well-formed token
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    if payload.is_empty() {
        return None;
    }

    // Accept both padded and unpadded encodings
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether the token is unusable at `now` (unix seconds)
pub fn is_token_expired_at(token: &str, now: i64) -> bool {
    match decode_claims(token) {
        Some(claims) if claims.exp > 0 => now >= claims.exp,
        _ => true,
    }
}

/// Whether the token is unusable right now
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, chrono::Utc::now().timestamp())
}

pub fn user_role(token: &str) -> Option<String> {
    decode_claims(token)?.role.filter(|role| !role.is_empty())
}

pub fn is_admin(token: &str) -> bool {
    user_role(token).as_deref() == Some("admin")
}

pub fn user_from_token(token: &str) -> Option<UserInfo> {
    let claims = decode_claims(token)?;
    Some(UserInfo {
        id: claims.user_id,
        email: claims.email,
        name: claims.name,
        role: claims.role.filter(|role| !role.is_empty()),
    })
}
