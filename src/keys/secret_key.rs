//! Secret Key (sk): a sparse ternary polynomial s(X) with coefficients in
//! {-1, 0, 1}, held in NTT form over the key basis.
use super::KeyId;
use crate::context::{EncryptionContext, ParmsId};
use crate::rings::RnsPoly;
use rand::Rng;
use std::fmt;

/// Deliberately neither `Clone` nor `Serialize`; `Debug` hides the polynomial.
pub struct SecretKey {
    s: RnsPoly,
    key_id: KeyId,
    parms_id: ParmsId,
}

impl SecretKey {
    pub(crate) fn generate<R: Rng + ?Sized>(
        ctx: &EncryptionContext,
        key_id: KeyId,
        rng: &mut R,
    ) -> Self {
        let mut s = RnsPoly::sample_ternary(
            ctx.hamming_weight(),
            ctx.key_basis().clone(),
            rng,
        );
        s.to_ntt_domain();
        Self {
            s,
            key_id,
            parms_id: ctx.parms_id(),
        }
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub(crate) fn poly(&self) -> &RnsPoly {
        &self.s
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("key_id", &self.key_id)
            .field("parms_id", &self.parms_id)
            .field("s", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityLevel;
    use crate::context::ContextBuilder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn ctx() -> EncryptionContext {
        ContextBuilder::new()
            .poly_modulus_degree(64)
            .coeff_modulus_bits([30, 30])
            .scale_bits(10)
            .security(SecurityLevel::None)
            .hamming_weight(20)
            .build()
            .unwrap()
    }

    #[test]
    fn secret_has_requested_hamming_weight() {
        let ctx = ctx();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let sk = SecretKey::generate(&ctx, KeyId::from_raw(1), &mut rng);
        let coeffs = sk.poly().to_centered_f64();
        assert_eq!(coeffs.iter().filter(|&&c| c != 0.0).count(), 20);
        assert!(coeffs.iter().all(|&c| c == 0.0 || c == 1.0 || c == -1.0));
    }

    #[test]
    fn debug_output_is_redacted() {
        let ctx = ctx();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let sk = SecretKey::generate(&ctx, KeyId::from_raw(0xabc), &mut rng);
        let shown = format!("{sk:?}");
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("channels"));
    }
}
