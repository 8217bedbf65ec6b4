use super::errors::{RingError, RingResult};
use super::ntt::NttTable;
use crate::math::modular::{mod_inverse, mul_mod};
use crypto_bigint::{U1024, Word};

/// Widest product of moduli the CRT reconstruction handles. Centering doubles
/// the accumulator, so one bit of the 1024-bit integer stays free.
pub const MAX_BASIS_BITS: u32 = 1000;

/// RNS basis: a set of NTT-friendly prime moduli with precomputed NTT tables
/// and CRT constants.
///
/// Invariant: `moduli.len() == ntt_tables.len()` and
/// `ntt_tables[i].modulus() == moduli[i]` for all `i`.
#[derive(Debug, Clone)]
pub struct RnsBasis {
    degree: usize,
    moduli: Vec<u64>,
    ntt_tables: Vec<NttTable>,
    crt: CrtConstants,
}

#[derive(Debug, Clone)]
struct CrtConstants {
    /// Q = q_0 * ... * q_{L-1}
    product: U1024,
    /// Q / q_i
    punctured: Vec<U1024>,
    /// (Q / q_i)^-1 mod q_i
    punctured_inv: Vec<u64>,
}

impl RnsBasis {
    pub fn new(degree: usize, moduli: Vec<u64>) -> RingResult<Self> {
        if moduli.is_empty() {
            return Err(RingError::EmptyBasis);
        }
        let bits: u32 = moduli.iter().map(|&q| 64 - q.leading_zeros()).sum();
        if bits > MAX_BASIS_BITS {
            return Err(RingError::ModulusTooWide {
                bits,
                max: MAX_BASIS_BITS,
            });
        }
        let ntt_tables = moduli
            .iter()
            .map(|&modulus| NttTable::new(degree, modulus))
            .collect::<RingResult<Vec<_>>>()?;
        let crt = CrtConstants::new(&moduli);
        Ok(Self {
            degree,
            moduli,
            ntt_tables,
            crt,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    pub fn ntt_table(&self, channel: usize) -> &NttTable {
        &self.ntt_tables[channel]
    }

    pub fn channel_count(&self) -> usize {
        self.moduli.len()
    }

    /// `log2(Q)` as a float; used for the encoding and decryption bounds.
    pub fn modulus_log2(&self) -> f64 {
        self.moduli.iter().map(|&q| (q as f64).log2()).sum()
    }

    /// Returns a new basis keeping only the first `keep` channels.
    pub fn prefix(&self, keep: usize) -> RingResult<Self> {
        if keep == 0 {
            return Err(RingError::EmptyBasis);
        }
        if keep > self.channel_count() {
            return Err(RingError::ChannelCountMismatch {
                expected: self.channel_count(),
                actual: keep,
            });
        }
        let moduli = self.moduli[..keep].to_vec();
        Ok(Self {
            degree: self.degree,
            crt: CrtConstants::new(&moduli),
            ntt_tables: self.ntt_tables[..keep].to_vec(),
            moduli,
        })
    }

    /// `true` when `self` holds the leading channels of `other`.
    pub fn is_prefix_of(&self, other: &RnsBasis) -> bool {
        self.degree == other.degree
            && other.moduli.len() >= self.moduli.len()
            && other.moduli[..self.moduli.len()] == self.moduli[..]
    }

    /// CRT-reconstructs one coefficient, centers it in `(-Q/2, Q/2]` and
    /// returns it as the nearest `f64`.
    ///
    /// Each term `((r_i * inv_i) mod q_i) * (Q / q_i)` is below `Q`, so the
    /// running sum needs a single conditional subtraction per channel.
    pub fn reconstruct_centered(&self, residues: &[u64]) -> f64 {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let crt = &self.crt;
        let mut acc = U1024::ZERO;
        for ((&r, &q), (punctured, &inv)) in residues
            .iter()
            .zip(&self.moduli)
            .zip(crt.punctured.iter().zip(&crt.punctured_inv))
        {
            let digit = U1024::from_u64(mul_mod(r, inv, q));
            acc = acc.wrapping_add(&punctured.wrapping_mul(&digit));
            if acc >= crt.product {
                acc = acc.wrapping_sub(&crt.product);
            }
        }

        if acc.wrapping_add(&acc) > crt.product {
            -to_f64(&crt.product.wrapping_sub(&acc))
        } else {
            to_f64(&acc)
        }
    }
}

impl CrtConstants {
    fn new(moduli: &[u64]) -> Self {
        let product = moduli
            .iter()
            .fold(U1024::ONE, |acc, &q| acc.wrapping_mul(&U1024::from_u64(q)));
        let punctured: Vec<U1024> = (0..moduli.len())
            .map(|i| {
                moduli
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .fold(U1024::ONE, |acc, (_, &q)| {
                        acc.wrapping_mul(&U1024::from_u64(q))
                    })
            })
            .collect();
        let punctured_inv = moduli
            .iter()
            .enumerate()
            .map(|(i, &q)| {
                let residue = moduli
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .fold(1u64, |acc, (_, &other)| mul_mod(acc, other % q, q));
                mod_inverse(residue, q)
            })
            .collect();
        Self {
            product,
            punctured,
            punctured_inv,
        }
    }
}

fn to_f64(value: &U1024) -> f64 {
    let radix = 2f64.powi(Word::BITS as i32);
    value
        .as_words()
        .iter()
        .rev()
        .fold(0.0, |acc, &word| acc * radix + word as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_basis() {
        assert!(matches!(
            RnsBasis::new(8, vec![]),
            Err(RingError::EmptyBasis)
        ));
    }

    #[test]
    fn prefix_reduces_channel_count() {
        let basis = RnsBasis::new(8, vec![17, 97, 113]).unwrap();
        let reduced = basis.prefix(2).unwrap();
        assert_eq!(reduced.channel_count(), 2);
        assert_eq!(reduced.moduli(), &[17, 97]);
        assert!(reduced.is_prefix_of(&basis));
        assert!(!basis.is_prefix_of(&reduced));
    }

    #[test]
    fn prefix_of_zero_channels_fails() {
        let basis = RnsBasis::new(8, vec![17, 97]).unwrap();
        assert!(matches!(basis.prefix(0), Err(RingError::EmptyBasis)));
    }

    #[test]
    fn reconstruct_centered_single_channel() {
        let basis = RnsBasis::new(8, vec![97]).unwrap();
        assert_eq!(basis.reconstruct_centered(&[5]), 5.0);
        // 96 = -1 (mod 97)
        assert_eq!(basis.reconstruct_centered(&[96]), -1.0);
    }

    #[test]
    fn reconstruct_centered_two_channels() {
        let basis = RnsBasis::new(8, vec![17, 97]).unwrap();
        assert_eq!(basis.reconstruct_centered(&[3, 3]), 3.0);
        // -7: 17 - 7 = 10, 97 - 7 = 90
        assert_eq!(basis.reconstruct_centered(&[10, 90]), -7.0);
    }

    #[test]
    fn reconstruct_beyond_u128() {
        // Three 60-bit primes: Q is ~180 bits, past what u128 can hold.
        let degree = 8;
        let moduli = crate::math::coeff_modulus_primes(degree, &[60, 60, 60]).unwrap();
        let basis = RnsBasis::new(degree as usize, moduli.clone()).unwrap();
        let value: i128 = -(1i128 << 100) - 12345;
        let residues: Vec<u64> = moduli
            .iter()
            .map(|&q| value.rem_euclid(q as i128) as u64)
            .collect();
        let recovered = basis.reconstruct_centered(&residues);
        assert_eq!(recovered, value as f64);
    }

    #[test]
    fn modulus_log2_sums_channels() {
        let basis = RnsBasis::new(8, vec![17, 97]).unwrap();
        let expected = 17f64.log2() + 97f64.log2();
        assert!((basis.modulus_log2() - expected).abs() < 1e-12);
    }
}
