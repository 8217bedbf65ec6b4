use crate::context::ParmsId;
use crate::keys::KeyId;
use crate::rings::RnsPoly;

#[derive(Debug, Clone)]
pub struct Plaintext {
    poly: RnsPoly,
    scale_bits: u32,
    slots: usize, // Number of encoded slots (determines decode output length)
    parms_id: ParmsId,
}

impl Plaintext {
    pub(crate) fn new(poly: RnsPoly, scale_bits: u32, slots: usize, parms_id: ParmsId) -> Self {
        Self {
            poly,
            scale_bits,
            slots,
            parms_id,
        }
    }

    pub fn poly(&self) -> &RnsPoly {
        &self.poly
    }

    pub fn scale_bits(&self) -> u32 {
        self.scale_bits
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }
}

/// Fresh CKKS ciphertext `(c0, c1)` over the data basis, coefficient form.
///
/// Decrypts as `c0 + c1 * s` under the secret key identified by `key_id`.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    c0: RnsPoly,
    c1: RnsPoly,
    scale_bits: u32,
    slots: usize,
    key_id: KeyId,
    parms_id: ParmsId,
}

impl Ciphertext {
    pub(crate) fn new(
        c0: RnsPoly,
        c1: RnsPoly,
        scale_bits: u32,
        slots: usize,
        key_id: KeyId,
        parms_id: ParmsId,
    ) -> Self {
        debug_assert_eq!(c0.basis().moduli(), c1.basis().moduli());
        Self {
            c0,
            c1,
            scale_bits,
            slots,
            key_id,
            parms_id,
        }
    }

    pub fn c0(&self) -> &RnsPoly {
        &self.c0
    }

    pub fn c1(&self) -> &RnsPoly {
        &self.c1
    }

    pub fn scale_bits(&self) -> u32 {
        self.scale_bits
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }
}

/// One encrypted batch of a column, in source order.
#[derive(Debug, Clone)]
pub struct EncryptedBatch {
    pub index: usize,
    pub len: usize,
    pub ciphertext: Ciphertext,
}
