//! Byte-level serialization of ciphertexts.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic      4  b"CKCT"
//! version    2  u16
//! degree     4  u32
//! channels   2  u16
//! scale_bits 4  u32
//! slots      4  u32
//! key_id     8  u64
//! parms_id   32
//! moduli     channels x u64
//! c0         channels x degree x u64
//! c1         channels x degree x u64
//! ```
//!
//! Each polynomial is stored channel by channel, coefficient form.

use super::Ciphertext;
use crate::context::{EncryptionContext, ParmsId};
use crate::keys::KeyId;
use crate::rings::{RingError, RnsBasis, RnsPoly};
use std::sync::Arc;
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"CKCT";
pub const VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 4 + 2 + 4 + 4 + 8 + 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated input: needed {needed} more bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("bad magic bytes {found:?}")]
    BadMagic { found: [u8; 4] },
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("ciphertext parameters do not match the context: {0}")]
    ParameterMismatch(String),
    #[error("{slots} slots exceed the {max} available")]
    TooManySlots { slots: usize, max: usize },
    #[error("coefficient out of range at channel {channel}, index {index}: {coefficient} >= {modulus}")]
    CoefficientOutOfRange {
        channel: usize,
        index: usize,
        coefficient: u64,
        modulus: u64,
    },
    #[error("{0} trailing bytes after ciphertext")]
    TrailingBytes(usize),
    #[error("invalid polynomial: {0}")]
    Ring(#[from] RingError),
}

/// Serialize a ciphertext. Its polynomials must be in coefficient form, which
/// is what the encryptor produces.
pub fn ciphertext_to_bytes(ct: &Ciphertext) -> Vec<u8> {
    let basis = ct.c0().basis();
    let (n, channels) = (basis.degree(), basis.channel_count());
    let mut bytes = Vec::with_capacity(HEADER_LEN + channels * 8 + 2 * channels * n * 8);

    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&(n as u32).to_le_bytes());
    bytes.extend_from_slice(&(channels as u16).to_le_bytes());
    bytes.extend_from_slice(&ct.scale_bits().to_le_bytes());
    bytes.extend_from_slice(&(ct.slots() as u32).to_le_bytes());
    bytes.extend_from_slice(&ct.key_id().raw().to_le_bytes());
    bytes.extend_from_slice(ct.parms_id().as_bytes());
    for &q in basis.moduli() {
        bytes.extend_from_slice(&q.to_le_bytes());
    }
    for poly in [ct.c0(), ct.c1()] {
        debug_assert!(!poly.is_ntt_domain());
        for channel in poly.channels() {
            for &c in channel {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
    }
    bytes
}

/// Deserialize a ciphertext produced under `ctx`, validating the header,
/// the parameter set and every coefficient.
pub fn ciphertext_from_bytes(
    bytes: &[u8],
    ctx: &EncryptionContext,
) -> Result<Ciphertext, WireError> {
    let mut reader = Reader { rest: bytes };

    let magic = reader.array::<4>()?;
    if magic != MAGIC {
        return Err(WireError::BadMagic { found: magic });
    }
    let version = u16::from_le_bytes(reader.array()?);
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let degree = u32::from_le_bytes(reader.array()?) as usize;
    let channels = u16::from_le_bytes(reader.array()?) as usize;
    let scale_bits = u32::from_le_bytes(reader.array()?);
    let slots = u32::from_le_bytes(reader.array()?) as usize;
    let key_id = KeyId::from_raw(u64::from_le_bytes(reader.array()?));
    let parms_id = ParmsId::from_bytes(reader.array()?);

    let basis = ctx.data_basis();
    if degree != basis.degree() || channels != basis.channel_count() {
        return Err(WireError::ParameterMismatch(format!(
            "shape {degree}x{channels}, context expects {}x{}",
            basis.degree(),
            basis.channel_count()
        )));
    }
    if parms_id != ctx.parms_id() {
        return Err(WireError::ParameterMismatch(format!(
            "parms id {parms_id}, context has {}",
            ctx.parms_id()
        )));
    }
    if scale_bits != ctx.scale_bits() {
        return Err(WireError::ParameterMismatch(format!(
            "scale bits {scale_bits}, context uses {}",
            ctx.scale_bits()
        )));
    }
    if slots > ctx.slot_count() {
        return Err(WireError::TooManySlots {
            slots,
            max: ctx.slot_count(),
        });
    }
    for &expected in basis.moduli() {
        let q = u64::from_le_bytes(reader.array()?);
        if q != expected {
            return Err(WireError::ParameterMismatch(format!(
                "modulus {q}, context expects {expected}"
            )));
        }
    }

    let c0 = reader.poly(basis)?;
    let c1 = reader.poly(basis)?;
    if !reader.rest.is_empty() {
        return Err(WireError::TrailingBytes(reader.rest.len()));
    }
    Ok(Ciphertext::new(c0, c1, scale_bits, slots, key_id, parms_id))
}

struct Reader<'a> {
    rest: &'a [u8],
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let (head, tail) = self
            .rest
            .split_first_chunk::<N>()
            .ok_or(WireError::Truncated {
                needed: N,
                available: self.rest.len(),
            })?;
        self.rest = tail;
        Ok(*head)
    }

    fn poly(&mut self, basis: &Arc<RnsBasis>) -> Result<RnsPoly, WireError> {
        let n = basis.degree();
        let mut channels = Vec::with_capacity(basis.channel_count());
        for (channel, &q) in basis.moduli().iter().enumerate() {
            let mut coeffs = Vec::with_capacity(n);
            for index in 0..n {
                let coefficient = u64::from_le_bytes(self.array()?);
                if coefficient >= q {
                    return Err(WireError::CoefficientOutOfRange {
                        channel,
                        index,
                        coefficient,
                        modulus: q,
                    });
                }
                coeffs.push(coefficient);
            }
            channels.push(coeffs);
        }
        Ok(RnsPoly::from_channels(channels, basis.clone(), false)?)
    }
}
