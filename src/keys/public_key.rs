use super::{KeyId, SecretKey};
use crate::context::{EncryptionContext, ParmsId};
use crate::rings::RnsPoly;
use rand::Rng;

/// RNS-encoded public key (RLWE sample) over the key basis, NTT form.
#[derive(Debug, Clone)]
pub struct PublicKey {
    /// "b" component: b = -(a * s) + e
    b: RnsPoly,
    /// "a" component: uniformly random
    a: RnsPoly,
    key_id: KeyId,
    parms_id: ParmsId,
}

impl PublicKey {
    pub(crate) fn generate<R: Rng + ?Sized>(
        ctx: &EncryptionContext,
        secret_key: &SecretKey,
        rng: &mut R,
    ) -> Self {
        let basis = ctx.key_basis().clone();

        let a = RnsPoly::sample_uniform(basis.clone(), true, rng);

        let mut e = RnsPoly::sample_gaussian(ctx.error_std(), basis, rng);
        e.to_ntt_domain();

        let mut a_times_s = a.clone();
        a_times_s *= secret_key.poly();

        let mut b = -a_times_s;
        b += &e;

        Self {
            b,
            a,
            key_id: secret_key.key_id(),
            parms_id: secret_key.parms_id(),
        }
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub(crate) fn b(&self) -> &RnsPoly {
        &self.b
    }

    pub(crate) fn a(&self) -> &RnsPoly {
        &self.a
    }
}
