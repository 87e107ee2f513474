//! JWT access/refresh tokens (HS256).
//!
//! Access tokens authenticate API calls; refresh tokens only mint new
//! access tokens. The refresh expiry is mirrored onto the user row by the
//! accounts service and doubles as the login session id: both tokens of a
//! pair carry it in their `session` claim, and a token whose session no
//! longer matches the row is dead.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CryptoError;
use crate::models::enums::Role;
use crate::models::{session_key, BaseUser};

pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: Role,
    pub superuser: bool,
    pub kind: TokenKind,
    /// Login session this token belongs to.
    pub session: i64,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, CryptoError> {
        Uuid::parse_str(&self.sub).map_err(|_| CryptoError::InvalidToken("bad subject".into()))
    }
}

/// Token lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access: Duration::minutes(60),
            refresh: Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// HS256 signing material.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys(..)")
    }
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(CryptoError::SecretTooShort {
                min: MIN_SECRET_LENGTH,
            });
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

/// Random URL-safe secret with 32 bytes of entropy.
pub fn generate_secret() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn sign(
    user: &BaseUser,
    kind: TokenKind,
    session: i64,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    keys: &JwtKeys,
) -> Result<String, CryptoError> {
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role,
        superuser: user.is_superuser,
        kind,
        session,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .map_err(|e| CryptoError::TokenEncoding(e.to_string()))
}

/// Issue a fresh access + refresh pair at `now`, opening a new session.
pub fn issue_token_pair(
    user: &BaseUser,
    keys: &JwtKeys,
    ttl: &TokenTtl,
    now: DateTime<Utc>,
) -> Result<TokenPair, CryptoError> {
    let access_expires_at = now + ttl.access;
    let refresh_expires_at = now + ttl.refresh;
    let session = session_key(&refresh_expires_at);
    Ok(TokenPair {
        access: sign(user, TokenKind::Access, session, now, access_expires_at, keys)?,
        refresh: sign(user, TokenKind::Refresh, session, now, refresh_expires_at, keys)?,
        access_expires_at,
        refresh_expires_at,
    })
}

/// Issue only an access token within an existing session (refresh flow).
pub fn issue_access_token(
    user: &BaseUser,
    session: i64,
    keys: &JwtKeys,
    ttl: &TokenTtl,
    now: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>), CryptoError> {
    let expires_at = now + ttl.access;
    let token = sign(user, TokenKind::Access, session, now, expires_at, keys)?;
    Ok((token, expires_at))
}

/// Verify signature and expiry, and require the expected token kind.
pub fn decode_token(token: &str, expected: TokenKind, keys: &JwtKeys) -> Result<Claims, CryptoError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<Claims>(token, &keys.decoding, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => CryptoError::TokenExpired,
        _ => CryptoError::InvalidToken(e.to_string()),
    })?;

    if data.claims.kind != expected {
        return Err(CryptoError::InvalidToken(format!(
            "expected {expected:?} token"
        )));
    }
    Ok(data.claims)
}
