//! HS256 access and refresh tokens.
//!
//! Access and refresh tokens are signed with different secrets and carry a
//! `typ` claim. Validation accepts only the expected type, so a refresh
//! token can never open a protected route and an access token can never
//! mint new tokens.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use teller_config::AuthConfig;
use thiserror::Error;
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn other(self) -> Self {
        match self {
            TokenType::Access => TokenType::Refresh,
            TokenType::Refresh => TokenType::Access,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub jti: Uuid,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token type does not match, expected {expected}")]
    WrongType { expected: TokenType },
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("{0} signing secret must not be empty")]
    EmptySecret(TokenType),
    #[error("token lifetime out of range")]
    InvalidLifetime,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    fn from_decode(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::InvalidSignature
            }
            _ => TokenError::Malformed,
        }
    }
}

/// A signed token together with its decoded claims.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub claims: Claims,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("claims", &self.claims)
            .finish()
    }
}

/// What a successful PIN check or refresh hands back to the client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub username: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_token", &"<redacted>")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .finish()
    }
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: TimeDelta,
}

impl SigningKeys {
    fn new(
        token_type: TokenType,
        secret: &[u8],
        ttl: Duration,
    ) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret(token_type));
        }
        let ttl =
            TimeDelta::from_std(ttl).map_err(|_| TokenError::InvalidLifetime)?;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        })
    }
}

#[derive(Clone)]
pub struct TokenSettings {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub issuer: String,
    pub audience: String,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl From<&AuthConfig> for TokenSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_secret.as_bytes().to_vec(),
            refresh_secret: config.refresh_secret.as_bytes().to_vec(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }
}

pub struct TokenSigner {
    access: SigningKeys,
    refresh: SigningKeys,
    issuer: String,
    audience: String,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("access_ttl", &self.access.ttl)
            .field("refresh_ttl", &self.refresh.ttl)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(settings: TokenSettings) -> Result<Self, TokenError> {
        Ok(Self {
            access: SigningKeys::new(
                TokenType::Access,
                &settings.access_secret,
                settings.access_ttl,
            )?,
            refresh: SigningKeys::new(
                TokenType::Refresh,
                &settings.refresh_secret,
                settings.refresh_ttl,
            )?,
            issuer: settings.issuer,
            audience: settings.audience,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        Self::new(TokenSettings::from(config))
    }

    pub fn access_ttl(&self) -> TimeDelta {
        self.access.ttl
    }

    pub fn generate_tokens(
        &self,
        user_id: Uuid,
        username: &str,
    ) -> Result<TokenPair, TokenError> {
        self.generate_tokens_at(user_id, username, Utc::now())
    }

    pub fn generate_tokens_at(
        &self,
        user_id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let access = self.issue(TokenType::Access, user_id, username, now)?;
        let refresh = self.issue(TokenType::Refresh, user_id, username, now)?;

        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
            user_id,
            username: username.to_string(),
        })
    }

    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        username: &str,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(TokenType::Access, user_id, username, Utc::now())
    }

    /// Validate a refresh token and mint a fresh access token for its
    /// subject. The refresh token itself is not rotated.
    pub fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<(IssuedToken, Claims), TokenError> {
        let claims = self.validate_token(refresh_token, TokenType::Refresh)?;
        let access = self.generate_access_token(claims.sub, &claims.username)?;
        Ok((access, claims))
    }

    pub fn validate_token(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<Claims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Empty);
        }

        let validation = self.validation(true);
        let claims = match decode::<Claims>(
            token,
            &self.keys(expected).decoding,
            &validation,
        ) {
            Ok(data) => data.claims,
            Err(err) => {
                let err = TokenError::from_decode(err);
                if matches!(err, TokenError::InvalidSignature)
                    && self.signed_as(token, expected.other())
                {
                    return Err(TokenError::WrongType { expected });
                }
                return Err(err);
            }
        };

        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }

        Ok(claims)
    }

    /// Whether `token` carries a valid signature for `token_type`,
    /// ignoring expiry.
    fn signed_as(&self, token: &str, token_type: TokenType) -> bool {
        let validation = self.validation(false);
        decode::<Claims>(token, &self.keys(token_type).decoding, &validation)
            .is_ok_and(|data| data.claims.token_type == token_type)
    }

    fn validation(&self, check_expiry: bool) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation
    }

    fn keys(&self, token_type: TokenType) -> &SigningKeys {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    fn issue(
        &self,
        token_type: TokenType,
        user_id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let keys = self.keys(token_type);
        // Claims carry whole seconds; report the same instant to callers.
        let expires_at = now
            .checked_add_signed(keys.ttl)
            .and_then(|at| DateTime::from_timestamp(at.timestamp(), 0))
            .ok_or(TokenError::InvalidLifetime)?;

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &keys.encoding)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            expires_at,
            claims,
        })
    }
}
