use super::{
    basis::RnsBasis,
    errors::{RingError, RingResult},
};
use crate::math::{
    modular::{add_mod, mul_mod, neg_mod, reduce_rounded_f64},
    sampling::{gaussian_coefficients, ternary_coefficients, uniform_coefficients},
};
use rand::Rng;
use std::{
    ops::{AddAssign, MulAssign, Neg},
    sync::Arc,
};

/// A polynomial in `Z_{q_0} x … x Z_{q_{L-1}}[X] / (X^N + 1)`.
///
/// Stores one coefficient vector per RNS channel. The `in_ntt_domain` flag
/// tracks whether the vectors hold coefficient-domain or NTT-domain values.
///
/// # Invariants
/// - `channels.len() == basis.channel_count()`
/// - `channels[i].len() == basis.degree()`
/// - Every `channels[i][j] < basis.moduli()[i]`
#[derive(Clone, Debug)]
pub struct RnsPoly {
    channels: Vec<Vec<u64>>,
    basis: Arc<RnsBasis>,
    in_ntt_domain: bool,
}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl RnsPoly {
    /// Creates a polynomial from signed integer coefficients, reducing each
    /// into `[0, q_i)` per channel.
    ///
    /// # Panics
    /// Panics if `coeffs.len() != basis.degree()`.
    pub fn from_signed(coeffs: &[i64], basis: Arc<RnsBasis>) -> Self {
        assert_eq!(
            coeffs.len(),
            basis.degree(),
            "from_signed: coefficient count must equal the ring degree"
        );
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| {
                coeffs
                    .iter()
                    .map(|&c| (c as i128).rem_euclid(q as i128) as u64)
                    .collect()
            })
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Creates a polynomial from rounded (integral, finite) `f64` coefficients
    /// of arbitrary magnitude.
    pub fn from_rounded(coeffs: &[f64], basis: Arc<RnsBasis>) -> RingResult<Self> {
        if coeffs.len() != basis.degree() {
            return Err(RingError::DegreeMismatch {
                expected: basis.degree(),
                actual: coeffs.len(),
            });
        }
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| coeffs.iter().map(|&c| reduce_rounded_f64(c, q)).collect())
            .collect();
        Ok(Self {
            channels,
            basis,
            in_ntt_domain: false,
        })
    }

    /// Creates a polynomial from pre-built channel vectors.
    ///
    /// Returns an error if the shape doesn't match the basis, or if any
    /// coefficient is not reduced (i.e., ≥ the corresponding modulus).
    pub fn from_channels(
        channels: Vec<Vec<u64>>,
        basis: Arc<RnsBasis>,
        in_ntt_domain: bool,
    ) -> RingResult<Self> {
        let expected = basis.channel_count();
        if channels.len() != expected {
            return Err(RingError::ChannelCountMismatch {
                expected,
                actual: channels.len(),
            });
        }
        for (channel, &q) in channels.iter().zip(basis.moduli()) {
            if channel.len() != basis.degree() {
                return Err(RingError::DegreeMismatch {
                    expected: basis.degree(),
                    actual: channel.len(),
                });
            }
            if let Some(&c) = channel.iter().find(|&&c| c >= q) {
                return Err(RingError::NonReducedCoefficient {
                    coefficient: c,
                    modulus: q,
                });
            }
        }
        Ok(Self {
            channels,
            basis,
            in_ntt_domain,
        })
    }
}

// ─── Sampling ─────────────────────────────────────────────────────────────────

impl RnsPoly {
    /// Samples with coefficients uniform in `[0, q_i)` per channel. Uniform
    /// in one domain is uniform in the other, so the result is tagged with the
    /// requested domain without transforming.
    pub fn sample_uniform<R: Rng + ?Sized>(
        basis: Arc<RnsBasis>,
        in_ntt_domain: bool,
        rng: &mut R,
    ) -> Self {
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| uniform_coefficients(basis.degree(), q, rng))
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain,
        }
    }

    /// Samples rounded Gaussian noise with standard deviation `std_dev`.
    pub fn sample_gaussian<R: Rng + ?Sized>(
        std_dev: f64,
        basis: Arc<RnsBasis>,
        rng: &mut R,
    ) -> Self {
        let noise = gaussian_coefficients(basis.degree(), std_dev, rng);
        Self::from_signed(&noise, basis)
    }

    /// Samples a ternary polynomial with exactly `hamming_weight` non-zero
    /// coefficients.
    pub fn sample_ternary<R: Rng + ?Sized>(
        hamming_weight: usize,
        basis: Arc<RnsBasis>,
        rng: &mut R,
    ) -> Self {
        let ternary = ternary_coefficients(basis.degree(), hamming_weight, rng);
        Self::from_signed(&ternary, basis)
    }
}

// ─── Accessors & domain conversion ───────────────────────────────────────────

impl RnsPoly {
    pub fn channels(&self) -> &[Vec<u64>] {
        &self.channels
    }

    pub fn basis(&self) -> &Arc<RnsBasis> {
        &self.basis
    }

    pub fn degree(&self) -> usize {
        self.basis.degree()
    }

    pub fn is_ntt_domain(&self) -> bool {
        self.in_ntt_domain
    }

    /// Converts to NTT domain in-place (no-op if already there).
    pub fn to_ntt_domain(&mut self) {
        if self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(ch).forward(channel);
        }
        self.in_ntt_domain = true;
    }

    /// Converts to coefficient domain in-place (no-op if already there).
    pub fn to_coeff_domain(&mut self) {
        if !self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(ch).inverse(channel);
        }
        self.in_ntt_domain = false;
    }

    /// Keeps only the channels of `target`, which must be a prefix of this
    /// polynomial's basis. Valid in both domains since the per-channel NTTs
    /// are independent.
    pub fn restrict_to(&self, target: &Arc<RnsBasis>) -> RingResult<Self> {
        if !target.is_prefix_of(&self.basis) {
            return Err(RingError::NotASubBasis);
        }
        Ok(Self {
            channels: self.channels[..target.channel_count()].to_vec(),
            basis: Arc::clone(target),
            in_ntt_domain: self.in_ntt_domain,
        })
    }

    /// CRT-reconstructs each coefficient, centered in `(-Q/2, Q/2]`.
    ///
    /// If the polynomial is in NTT domain, a temporary clone is converted to
    /// coefficient domain first.
    pub fn to_centered_f64(&self) -> Vec<f64> {
        let tmp;
        let channels: &[Vec<u64>] = if self.in_ntt_domain {
            tmp = {
                let mut clone = self.clone();
                clone.to_coeff_domain();
                clone
            };
            &tmp.channels
        } else {
            &self.channels
        };

        let mut residues = vec![0u64; self.basis.channel_count()];
        (0..self.degree())
            .map(|i| {
                for (slot, channel) in residues.iter_mut().zip(channels) {
                    *slot = channel[i];
                }
                self.basis.reconstruct_centered(&residues)
            })
            .collect()
    }

    fn same_basis(&self, rhs: &RnsPoly) -> bool {
        Arc::ptr_eq(&self.basis, &rhs.basis)
            || (self.basis.degree() == rhs.basis.degree()
                && self.basis.moduli() == rhs.basis.moduli())
    }
}

// ─── Arithmetic ───────────────────────────────────────────────────────────────

impl AddAssign<&RnsPoly> for RnsPoly {
    /// Coefficient-wise addition modulo each `q_i`. Both operands must share
    /// the same basis and domain.
    fn add_assign(&mut self, rhs: &RnsPoly) {
        assert!(self.same_basis(rhs), "add_assign: basis mismatch");
        assert_eq!(
            self.in_ntt_domain, rhs.in_ntt_domain,
            "add_assign: domain mismatch"
        );
        for ((channel, other), &q) in self
            .channels
            .iter_mut()
            .zip(&rhs.channels)
            .zip(self.basis.moduli())
        {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = add_mod(*a, b, q);
            }
        }
    }
}

impl MulAssign<&RnsPoly> for RnsPoly {
    /// Negacyclic product via pointwise multiplication in the NTT domain.
    ///
    /// `self` is moved to NTT domain and stays there; `rhs` is transformed on
    /// a temporary copy if needed.
    fn mul_assign(&mut self, rhs: &RnsPoly) {
        assert!(self.same_basis(rhs), "mul_assign: basis mismatch");
        self.to_ntt_domain();
        let converted;
        let rhs = if rhs.in_ntt_domain {
            rhs
        } else {
            converted = {
                let mut clone = rhs.clone();
                clone.to_ntt_domain();
                clone
            };
            &converted
        };
        for ((channel, other), &q) in self
            .channels
            .iter_mut()
            .zip(&rhs.channels)
            .zip(self.basis.moduli())
        {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = mul_mod(*a, b, q);
            }
        }
    }
}

impl Neg for RnsPoly {
    type Output = Self;

    /// Coefficient-wise negation modulo each `q_i`. Works in both domains.
    fn neg(mut self) -> Self {
        for (channel, &q) in self.channels.iter_mut().zip(self.basis.moduli()) {
            for c in channel.iter_mut() {
                *c = neg_mod(*c, q);
            }
        }
        self
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
