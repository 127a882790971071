//! PIN authentication.
//!
//! [`AuthenticationService`] drives the lockout state machine over a
//! [`CredentialStore`] and hands out [`TokenPair`]s signed by
//! [`TokenSigner`]. Storage adapters live in [`infrastructure`].

pub mod credential;
pub mod crypto;
pub mod error;
pub mod infrastructure;
pub mod lockout;
pub mod repositories;
pub mod revocation;
pub mod service;
pub mod token;

pub use credential::{AttemptSnapshot, CredentialRecord};
pub use crypto::{Argon2Params, AuthCrypto, AuthCryptoError};
pub use error::AuthError;
pub use lockout::{LockDecision, LockoutPolicy};
pub use repositories::{AttemptCache, CacheKeys, CredentialStore};
pub use revocation::TokenRevocationList;
pub use service::AuthenticationService;
pub use token::{
    Claims, IssuedToken, TokenError, TokenPair, TokenSettings, TokenSigner,
    TokenType,
};
