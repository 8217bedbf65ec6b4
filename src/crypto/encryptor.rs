//! Public-key CKKS encryption of encoded batches.
//!
//! For a plaintext `m` over the data basis and public key `(b, a)`:
//!   `c0 = b * u + e0 + m`
//!   `c1 = a * u + e1`
//! with `u` sparse ternary and `e0`, `e1` rounded Gaussian. Then
//! `c0 + c1 * s = e * u + e0 + e1 * s + m`, which is `m` plus small noise.

use super::{Ciphertext, CkksError, CkksResult, EncryptedBatch, Plaintext};
use crate::batching::SlotBatcher;
use crate::context::{EncryptionContext, ParmsId};
use crate::keys::{KeyId, PublicKey};
use crate::rings::RnsPoly;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// First batch of a column that could not be encrypted. Earlier batches were
/// encrypted; later ones were not attempted.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("batch {batch} failed: {error}")]
pub struct BatchFailure {
    pub batch: usize,
    pub error: CkksError,
}

/// Holds the public key restricted to the data basis. Shares no mutable
/// state, so one instance serves every worker.
#[derive(Debug)]
pub struct Encryptor {
    ctx: Arc<EncryptionContext>,
    b: RnsPoly,
    a: RnsPoly,
    key_id: KeyId,
    parms_id: ParmsId,
}

impl Encryptor {
    pub fn new(ctx: Arc<EncryptionContext>, public_key: &PublicKey) -> CkksResult<Self> {
        if public_key.parms_id() != ctx.parms_id() {
            return Err(CkksError::encryption(format!(
                "public key parameters {} do not match context {}",
                public_key.parms_id(),
                ctx.parms_id()
            )));
        }
        let restrict = |poly: &RnsPoly| {
            poly.restrict_to(ctx.data_basis())
                .map_err(|e| CkksError::encryption(e.to_string()))
        };
        let b = restrict(public_key.b())?;
        let a = restrict(public_key.a())?;
        Ok(Self {
            b,
            a,
            key_id: public_key.key_id(),
            parms_id: ctx.parms_id(),
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<EncryptionContext> {
        &self.ctx
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn encrypt<R: Rng + ?Sized>(
        &self,
        plaintext: &Plaintext,
        rng: &mut R,
    ) -> CkksResult<Ciphertext> {
        if plaintext.parms_id() != self.parms_id {
            return Err(CkksError::encryption(format!(
                "plaintext parameters {} do not match context {}",
                plaintext.parms_id(),
                self.parms_id
            )));
        }
        if plaintext.scale_bits() != self.ctx.scale_bits() {
            return Err(CkksError::encryption(format!(
                "plaintext scale 2^{} does not match context scale 2^{}",
                plaintext.scale_bits(),
                self.ctx.scale_bits()
            )));
        }
        let basis = self.ctx.data_basis();

        let mut u = RnsPoly::sample_ternary(self.ctx.hamming_weight(), basis.clone(), rng);
        u.to_ntt_domain();
        let e0 = RnsPoly::sample_gaussian(self.ctx.error_std(), basis.clone(), rng);
        let e1 = RnsPoly::sample_gaussian(self.ctx.error_std(), basis.clone(), rng);

        // c0 = b * u + e0 + m
        let mut c0 = self.b.clone();
        c0 *= &u;
        c0.to_coeff_domain();
        c0 += &e0;
        c0 += plaintext.poly();

        // c1 = a * u + e1
        let mut c1 = self.a.clone();
        c1 *= &u;
        c1.to_coeff_domain();
        c1 += &e1;

        Ok(Ciphertext::new(
            c0,
            c1,
            plaintext.scale_bits(),
            plaintext.slots(),
            self.key_id,
            self.parms_id,
        ))
    }

    /// Encodes and encrypts one batch of values.
    pub fn encrypt_values<R: Rng + ?Sized>(
        &self,
        values: &[f64],
        rng: &mut R,
    ) -> CkksResult<Ciphertext> {
        let plaintext = self.ctx.encode(values)?;
        self.encrypt(&plaintext, rng)
    }

    /// Splits a column into slot-sized batches and encrypts them in order.
    ///
    /// Stops at the first failing batch.
    pub fn encrypt_column<R: Rng + ?Sized>(
        &self,
        values: &[f64],
        rng: &mut R,
    ) -> Result<Vec<EncryptedBatch>, BatchFailure> {
        let batcher = SlotBatcher::for_context(&self.ctx);
        let mut encrypted = Vec::with_capacity(batcher.batch_count(values.len()));
        for batch in batcher.batches(values) {
            match self.encrypt_values(batch.values, rng) {
                Ok(ciphertext) => {
                    debug!(batch = batch.index, len = batch.values.len(), "encrypted batch");
                    encrypted.push(EncryptedBatch {
                        index: batch.index,
                        len: batch.values.len(),
                        ciphertext,
                    });
                }
                Err(error) => {
                    warn!(batch = batch.index, %error, "batch encryption failed");
                    return Err(BatchFailure {
                        batch: batch.index,
                        error,
                    });
                }
            }
        }
        Ok(encrypted)
    }
}
