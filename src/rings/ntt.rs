//! Negacyclic NTT over `Z_q[X] / (X^n + 1)`.
//!
//! The forward transform twists the input by powers of a primitive `2n`-th
//! root `psi`, then runs an iterative Cooley-Tukey cyclic NTT with
//! `omega = psi^2`. The inverse undoes both and folds `n^-1` into the untwist
//! table, so pointwise products of two forward transforms invert to the
//! negacyclic convolution.

use super::errors::{RingError, RingResult};
use crate::math::{
    is_ntt_friendly_prime,
    modular::{add_mod, mod_inverse, mod_pow, mul_mod, sub_mod},
};

#[derive(Debug, Clone)]
pub struct NttTable {
    modulus: u64,
    psi_powers: Vec<u64>,
    psi_inv_powers_scaled: Vec<u64>,
    omega_powers: Vec<u64>,
    omega_inv_powers: Vec<u64>,
}

impl NttTable {
    pub fn new(degree: usize, modulus: u64) -> RingResult<Self> {
        if degree < 2 || !degree.is_power_of_two() {
            return Err(RingError::InvalidDegree { degree });
        }
        if !is_ntt_friendly_prime(modulus, degree as u64) {
            return Err(RingError::NonNttFriendlyModulus { modulus, degree });
        }

        let psi = find_primitive_root(modulus, degree);
        let psi_inv = mod_inverse(psi, modulus);
        let omega = mul_mod(psi, psi, modulus);
        let omega_inv = mul_mod(psi_inv, psi_inv, modulus);
        let n_inv = mod_inverse(degree as u64, modulus);

        let psi_powers = powers(psi, degree, modulus);
        let psi_inv_powers_scaled = powers(psi_inv, degree, modulus)
            .into_iter()
            .map(|p| mul_mod(p, n_inv, modulus))
            .collect();

        Ok(Self {
            modulus,
            psi_powers,
            psi_inv_powers_scaled,
            omega_powers: powers(omega, degree / 2, modulus),
            omega_inv_powers: powers(omega_inv, degree / 2, modulus),
        })
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    pub fn degree(&self) -> usize {
        self.psi_powers.len()
    }

    /// Coefficients -> evaluations at the odd powers of `psi`.
    pub fn forward(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree());
        for (v, &twist) in values.iter_mut().zip(&self.psi_powers) {
            *v = mul_mod(*v, twist, self.modulus);
        }
        cyclic_ntt(values, &self.omega_powers, self.modulus);
    }

    /// Evaluations -> coefficients.
    pub fn inverse(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree());
        cyclic_ntt(values, &self.omega_inv_powers, self.modulus);
        for (v, &untwist) in values.iter_mut().zip(&self.psi_inv_powers_scaled) {
            *v = mul_mod(*v, untwist, self.modulus);
        }
    }
}

fn powers(base: u64, count: usize, modulus: u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(count);
    let mut current = 1u64;
    for _ in 0..count {
        out.push(current);
        current = mul_mod(current, base, modulus);
    }
    out
}

/// Finds a primitive `2 * degree`-th root of unity modulo an NTT-friendly
/// prime. Since `2 * degree` is a power of two, `psi^degree = -1` is enough
/// to pin the order.
fn find_primitive_root(modulus: u64, degree: usize) -> u64 {
    let exponent = (modulus - 1) / (2 * degree as u64);
    (2..modulus)
        .map(|candidate| mod_pow(candidate, exponent, modulus))
        .find(|&psi| mod_pow(psi, degree as u64, modulus) == modulus - 1)
        .unwrap_or_else(|| {
            panic!(
                "find_primitive_root: no root of order {} modulo {modulus}",
                2 * degree
            )
        })
}

fn cyclic_ntt(values: &mut [u64], roots: &[u64], modulus: u64) {
    let n = values.len();
    bit_reverse_permute(values);
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let step = n / len;
        for start in (0..n).step_by(len) {
            for offset in 0..half {
                let left = start + offset;
                let right = left + half;
                let t = mul_mod(values[right], roots[offset * step], modulus);
                let u = values[left];
                values[left] = add_mod(u, t, modulus);
                values[right] = sub_mod(u, t, modulus);
            }
        }
        len *= 2;
    }
}

fn bit_reverse_permute(values: &mut [u64]) {
    let bits = values.len().trailing_zeros();
    if bits == 0 {
        return;
    }
    for i in 0..values.len() {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            values.swap(i, j);
        }
    }
}
