use super::{Ciphertext, CkksError, CkksResult, Plaintext};
use crate::context::{EncryptionContext, ParmsId};
use crate::keys::{KeyId, SecretKey};
use crate::rings::RnsPoly;
use serde::Serialize;
use std::{fmt, sync::Arc};

/// A correct decryption leaves coefficients near `Delta * |z|`. Anything this
/// close to `Q / 2` is the uniform garbage produced by the wrong key.
const NOISE_MARGIN_BITS: f64 = 1.5;

/// Number of decoded values kept for display.
const SAMPLE_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub max_abs_error: f64,
    pub within_tolerance: bool,
    /// First decoded values, for display.
    pub sample: Vec<f64>,
}

/// Owns the secret key, restricted to the data basis.
pub struct Decryptor {
    ctx: Arc<EncryptionContext>,
    s: RnsPoly,
    key_id: KeyId,
    parms_id: ParmsId,
}

impl fmt::Debug for Decryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decryptor")
            .field("key_id", &self.key_id)
            .field("parms_id", &self.parms_id)
            .finish_non_exhaustive()
    }
}

impl Decryptor {
    pub fn new(ctx: Arc<EncryptionContext>, secret_key: SecretKey) -> CkksResult<Self> {
        if secret_key.parms_id() != ctx.parms_id() {
            return Err(CkksError::decryption(format!(
                "secret key parameters {} do not match context {}",
                secret_key.parms_id(),
                ctx.parms_id()
            )));
        }
        let s = secret_key
            .poly()
            .restrict_to(ctx.data_basis())
            .map_err(|e| CkksError::decryption(e.to_string()))?;
        Ok(Self {
            s,
            key_id: secret_key.key_id(),
            parms_id: ctx.parms_id(),
            ctx,
        })
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// `m = c0 + c1 * s`
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> CkksResult<Plaintext> {
        let (poly, _) = self.decrypt_centered(ciphertext)?;
        Ok(Plaintext::new(
            poly,
            ciphertext.scale_bits(),
            ciphertext.slots(),
            self.parms_id,
        ))
    }

    /// Decrypts and decodes the values a ciphertext holds.
    pub fn decrypt_values(&self, ciphertext: &Ciphertext) -> CkksResult<Vec<f64>> {
        let (_, coeffs) = self.decrypt_centered(ciphertext)?;
        Ok(self
            .ctx
            .encoder()
            .decode_coefficients(&coeffs, ciphertext.slots()))
    }

    /// Decrypts `ciphertext` and compares it slot by slot with `expected`.
    pub fn verify(
        &self,
        ciphertext: &Ciphertext,
        expected: &[f64],
        tolerance: f64,
    ) -> CkksResult<Verification> {
        let decoded = self.decrypt_values(ciphertext)?;
        if decoded.len() != expected.len() {
            return Err(CkksError::decryption(format!(
                "ciphertext holds {} values, expected {}",
                decoded.len(),
                expected.len()
            )));
        }
        let max_abs_error = decoded
            .iter()
            .zip(expected)
            .map(|(d, e)| (d - e).abs())
            .fold(0.0, f64::max);
        Ok(Verification {
            max_abs_error,
            within_tolerance: max_abs_error <= tolerance,
            sample: decoded.into_iter().take(SAMPLE_LEN).collect(),
        })
    }

    fn decrypt_centered(&self, ciphertext: &Ciphertext) -> CkksResult<(RnsPoly, Vec<f64>)> {
        if ciphertext.key_id() != self.key_id {
            return Err(CkksError::decryption(format!(
                "ciphertext was encrypted under key {}, this decryptor holds {}",
                ciphertext.key_id(),
                self.key_id
            )));
        }
        if ciphertext.parms_id() != self.parms_id
            || ciphertext.c0().basis().moduli() != self.s.basis().moduli()
            || ciphertext.c1().basis().moduli() != self.s.basis().moduli()
        {
            return Err(CkksError::decryption(format!(
                "ciphertext parameters {} do not match context {}",
                ciphertext.parms_id(),
                self.parms_id
            )));
        }
        if ciphertext.scale_bits() != self.ctx.scale_bits() {
            return Err(CkksError::decryption(format!(
                "ciphertext scale 2^{} does not match context scale 2^{}",
                ciphertext.scale_bits(),
                self.ctx.scale_bits()
            )));
        }

        let mut m = ciphertext.c1().clone();
        m *= &self.s;
        m.to_coeff_domain();
        m += ciphertext.c0();

        let coeffs = m.to_centered_f64();
        let limit = self.s.basis().modulus_log2() - NOISE_MARGIN_BITS;
        if coeffs.iter().any(|c| c.abs().log2() >= limit) {
            return Err(CkksError::decryption(
                "decrypted coefficients span the whole modulus (wrong key or corrupted ciphertext)",
            ));
        }
        Ok((m, coeffs))
    }
}
