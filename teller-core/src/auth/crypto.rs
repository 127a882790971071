use argon2::{
    Algorithm, Argon2, ParamsBuilder, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
};
use password_hash::Error as PasswordHashError;
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::Zeroizing;

pub use argon2::Params as Argon2Params;

/// PIN hashing with Argon2id and a server-side pepper.
///
/// Verification goes through the argon2 verifier, which compares digests in
/// constant time.
#[derive(Debug)]
pub struct AuthCrypto {
    argon2: Argon2<'static>,
    pin_pepper: Zeroizing<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum AuthCryptoError {
    #[error("PIN pepper must not be empty")]
    EmptyPepper,
    #[error("invalid Argon2 parameters: {0}")]
    InvalidArgon2Params(String),
    #[error("PIN hashing error: {0}")]
    PinHash(String),
}

impl From<PasswordHashError> for AuthCryptoError {
    fn from(err: PasswordHashError) -> Self {
        AuthCryptoError::PinHash(err.to_string())
    }
}

impl AuthCrypto {
    const DEFAULT_MEMORY_KIB: u32 = 64 * 1024; // 64 MiB
    const DEFAULT_ITERATIONS: u32 = 3;
    const DEFAULT_PARALLELISM: u32 = 1;
    const SALT_LENGTH: usize = password_hash::Salt::RECOMMENDED_LENGTH;

    pub fn new(pin_pepper: impl AsRef<[u8]>) -> Result<Self, AuthCryptoError> {
        Self::with_params(
            pin_pepper,
            ParamsBuilder::new()
                .m_cost(Self::DEFAULT_MEMORY_KIB)
                .t_cost(Self::DEFAULT_ITERATIONS)
                .p_cost(Self::DEFAULT_PARALLELISM)
                .output_len(32)
                .build()
                .map_err(|err| {
                    AuthCryptoError::InvalidArgon2Params(err.to_string())
                })?,
        )
    }

    /// Caller-chosen Argon2 cost, for tests and constrained hosts.
    pub fn with_params(
        pin_pepper: impl AsRef<[u8]>,
        params: Argon2Params,
    ) -> Result<Self, AuthCryptoError> {
        let pepper = pin_pepper.as_ref();
        if pepper.is_empty() {
            return Err(AuthCryptoError::EmptyPepper);
        }

        let argon2 =
            Argon2::new(Algorithm::Argon2id, Version::default(), params);

        Ok(Self {
            argon2,
            pin_pepper: Zeroizing::new(pepper.to_vec()),
        })
    }

    /// Cheapest parameters argon2 accepts. Never use outside tests.
    pub fn insecure_for_tests(
        pin_pepper: impl AsRef<[u8]>,
    ) -> Result<Self, AuthCryptoError> {
        let params = Argon2Params::new(8, 1, 1, None).map_err(|err| {
            AuthCryptoError::InvalidArgon2Params(err.to_string())
        })?;
        Self::with_params(pin_pepper, params)
    }

    pub fn hash_pin(&self, pin: &str) -> Result<String, AuthCryptoError> {
        let material = self.peppered(pin);

        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| AuthCryptoError::PinHash(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let hash = self.argon2.hash_password(&material, &salt)?.to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    pub fn verify_pin(
        &self,
        pin: &str,
        pin_hash: &str,
    ) -> Result<bool, AuthCryptoError> {
        let parsed = PasswordHash::new(pin_hash)?;
        let material = self.peppered(pin);
        Ok(self.argon2.verify_password(&material, &parsed).is_ok())
    }

    fn peppered(&self, pin: &str) -> Zeroizing<Vec<u8>> {
        let mut material = Zeroizing::new(Vec::with_capacity(
            pin.len() + self.pin_pepper.len(),
        ));
        material.extend_from_slice(pin.as_bytes());
        material.extend_from_slice(&self.pin_pepper);
        material
    }
}
