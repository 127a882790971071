//! Core library for the Teller banking backend.
//!
//! The centre of the crate is [`auth`]: the PIN verification and lockout
//! state machine, the JWT signer and the credential store with its optional
//! read-through cache. [`users`] and [`dashboard`] are thin read models used
//! by the HTTP layer.

pub mod api_types;
pub mod auth;
pub mod dashboard;
pub mod users;

pub use auth::{
    AuthCrypto, AuthError, AuthenticationService, Claims, LockoutPolicy,
    TokenError, TokenPair, TokenSigner, TokenType,
};

/// Embedded schema migrations.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
