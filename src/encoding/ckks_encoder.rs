//! Canonical-embedding encoder for real-valued CKKS slots.
//!
//! A polynomial `m(X) = sum a_i X^i` in `R[X]/(X^N + 1)` is identified with
//! its evaluations at the primitive `2N`-th roots `zeta_k = psi^(2k+1)`,
//! `psi = e^(i*pi/N)`. Writing `zeta_k = psi * omega^k` turns the evaluation
//! into an `N`-point DFT of the twisted coefficients `a_i * psi^i`, which
//! `rustfft` computes directly.
//!
//! Slot `j` lives at the root `psi^(5^j mod 2N)`; its conjugate root
//! `psi^(2N - 5^j)` carries the complex conjugate, so a real input yields a
//! polynomial with real coefficients.

use crate::crypto::{CkksError, CkksResult};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::{f64::consts::PI, fmt, sync::Arc};

/// Bits of headroom kept between the scaled values and the modulus.
const HEADROOM_BITS: f64 = 2.0;

pub struct CkksEncoder {
    degree: usize,
    scale_bits: u32,
    /// `slot_index[j] = (5^j mod 2N - 1) / 2`: the evaluation index of slot `j`.
    slot_index: Vec<usize>,
    /// `psi^i` for `i` in `0..N`.
    twist: Vec<Complex64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for CkksEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CkksEncoder")
            .field("degree", &self.degree)
            .field("scale_bits", &self.scale_bits)
            .finish_non_exhaustive()
    }
}

impl CkksEncoder {
    pub fn new(degree: usize, scale_bits: u32) -> CkksResult<Self> {
        if degree < 2 || !degree.is_power_of_two() {
            return Err(CkksError::invalid_parameters(format!(
                "encoder degree must be a power of two >= 2, got {degree}"
            )));
        }
        if scale_bits == 0 || scale_bits >= 1023 {
            return Err(CkksError::invalid_parameters(format!(
                "scale bits must be in [1, 1022], got {scale_bits}"
            )));
        }

        let two_n = 2 * degree;
        let mut slot_index = Vec::with_capacity(degree / 2);
        let mut exponent = 1usize;
        for _ in 0..degree / 2 {
            slot_index.push((exponent - 1) / 2);
            exponent = (exponent * 5) % two_n;
        }

        let twist = (0..degree)
            .map(|i| Complex64::from_polar(1.0, PI * i as f64 / degree as f64))
            .collect();

        let mut planner = FftPlanner::new();
        Ok(Self {
            degree,
            scale_bits,
            slot_index,
            twist,
            forward: planner.plan_fft_forward(degree),
            inverse: planner.plan_fft_inverse(degree),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn slot_count(&self) -> usize {
        self.degree / 2
    }

    pub fn scale_bits(&self) -> u32 {
        self.scale_bits
    }

    /// `Delta = 2^scale_bits`
    pub fn scale(&self) -> f64 {
        2f64.powi(self.scale_bits as i32)
    }

    /// Encodes up to `slot_count` real values into rounded polynomial
    /// coefficients. Unused slots are zero.
    ///
    /// `modulus_log2` is `log2(Q)` of the basis the plaintext will live in;
    /// any value or coefficient with `log2(|x|) + 2 >= log2(Q)` is rejected.
    pub fn encode_coefficients(&self, values: &[f64], modulus_log2: f64) -> CkksResult<Vec<f64>> {
        if values.len() > self.slot_count() {
            return Err(CkksError::out_of_range(format!(
                "input too long: {} values for {} slots",
                values.len(),
                self.slot_count()
            )));
        }

        let delta = self.scale();
        let limit = modulus_log2 - HEADROOM_BITS;
        for (i, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(CkksError::out_of_range(format!(
                    "value at index {i} is not finite ({value})"
                )));
            }
            let bits = (value.abs() * delta).log2();
            if bits >= limit {
                return Err(CkksError::out_of_range(format!(
                    "value {value} at index {i} needs {bits:.1} bits, modulus leaves {limit:.1}"
                )));
            }
        }

        let n = self.degree;
        let mut evaluations = vec![Complex64::new(0.0, 0.0); n];
        for (&value, &k) in values.iter().zip(&self.slot_index) {
            let scaled = Complex64::new(value * delta, 0.0);
            evaluations[k] = scaled;
            evaluations[n - 1 - k] = scaled.conj();
        }

        self.forward.process(&mut evaluations);

        let inv_n = (n as f64).recip();
        let coeffs: Vec<f64> = evaluations
            .iter()
            .zip(&self.twist)
            .map(|(e, psi_i)| ((e * psi_i.conj()).re * inv_n).round())
            .collect();

        if let Some((i, c)) = coeffs
            .iter()
            .enumerate()
            .find(|&(_, c)| c.abs().log2() >= limit)
        {
            return Err(CkksError::out_of_range(format!(
                "coefficient {i} = {c:e} exceeds the {limit:.1}-bit bound"
            )));
        }
        Ok(coeffs)
    }

    /// Evaluates the polynomial at the slot roots and returns the first
    /// `slots` values divided by `Delta`.
    pub fn decode_coefficients(&self, coeffs: &[f64], slots: usize) -> Vec<f64> {
        debug_assert_eq!(coeffs.len(), self.degree);
        let mut buffer: Vec<Complex64> = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&a, psi_i)| psi_i * a)
            .collect();
        self.inverse.process(&mut buffer);

        let delta = self.scale();
        self.slot_index
            .iter()
            .take(slots)
            .map(|&k| buffer[k].re / delta)
            .collect()
    }
}
