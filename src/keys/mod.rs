//! Key generation. One key pair serves a whole run; the secret half is only
//! ever handed to a [`crate::crypto::Decryptor`].

pub mod public_key;
pub mod secret_key;

pub use public_key::PublicKey;
pub use secret_key::SecretKey;

use crate::context::EncryptionContext;
use crate::crypto::{CkksError, CkksResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::fmt;
use tracing::debug;

/// Random identifier tying ciphertexts to the key pair that produced them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(u64);

impl KeyId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}

#[derive(Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

impl KeyPair {
    pub fn into_parts(self) -> (PublicKey, SecretKey) {
        (self.public, self.secret)
    }
}

pub struct KeyGenerator<'a> {
    ctx: &'a EncryptionContext,
}

impl<'a> KeyGenerator<'a> {
    pub fn new(ctx: &'a EncryptionContext) -> Self {
        Self { ctx }
    }

    /// Generates a fresh key pair from an OS-seeded ChaCha20 generator.
    pub fn generate(&self) -> CkksResult<KeyPair> {
        let mut rng =
            ChaCha20Rng::try_from_os_rng().map_err(|e| CkksError::KeyGenerationFailure {
                message: format!("entropy source unavailable: {e}"),
            })?;
        self.generate_with_rng(&mut rng)
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> CkksResult<KeyPair> {
        let key_id = KeyId(rng.random());
        let secret = SecretKey::generate(self.ctx, key_id, rng);
        let public = PublicKey::generate(self.ctx, &secret, rng);
        debug!(
            key_id = %key_id,
            parms_id = %self.ctx.parms_id(),
            "generated key pair"
        );
        Ok(KeyPair { public, secret })
    }
}
