//! Prime utilities for constructing NTT-friendly coefficient modulus chains.
//!
//! Primality uses Miller-Rabin with a fixed base set that is deterministic for
//! every `u64`. The chain builder mirrors the usual CKKS convention: for each
//! requested bit length pick the largest primes `p < 2^bits` with
//! `p = 1 (mod 2n)`, never reusing a prime inside one chain.
//! Reference:
//! https://en.wikipedia.org/wiki/Miller%E2%80%93Rabin_primality_test

use super::modular::{mod_pow, mul_mod};
use std::collections::HashMap;
use thiserror::Error;

// Deterministic for all n < 318,665,857,834,031,151,167,461.
// Source: https://miller-rabin.appspot.com/
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Widest prime the RNS kernels accept.
pub const MAX_PRIME_BITS: u32 = 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrimeError {
    #[error("prime bit size {bits} outside supported range [{min}, {max}]")]
    BitSizeOutOfRange { bits: u32, min: u32, max: u32 },

    #[error("ran out of {bits}-bit NTT-friendly primes for degree {degree}")]
    Exhausted { bits: u32, degree: u64 },
}

/// Returns `(odd_part, power_of_two)` such that `n = odd_part * 2^power_of_two`.
fn decompose(n: u64) -> (u64, u32) {
    assert!(n > 0, "decompose: n must be positive");
    let mut d = n;
    let mut r = 0;
    while d & 1 == 0 {
        d >>= 1;
        r += 1;
    }
    (d, r)
}

/// Returns `true` if `n` is prime using deterministic Miller-Rabin on `u64`.
pub fn is_prime(n: u64) -> bool {
    match n {
        0 | 1 => return false,
        2 | 3 => return true,
        _ if n & 1 == 0 => return false,
        _ => {}
    }

    let (d, r) = decompose(n - 1);
    'bases: for &a in MILLER_RABIN_BASES.iter() {
        if a >= n {
            continue;
        }
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

/// Returns `true` when `p` is prime and `p = 1 (mod 2n)`, i.e. `Z_p` holds a
/// primitive `2n`-th root of unity for the negacyclic NTT over `x^n + 1`.
#[inline]
pub fn is_ntt_friendly_prime(p: u64, n: u64) -> bool {
    assert!(n > 0, "is_ntt_friendly_prime: n must be positive");
    let modulus = n
        .checked_mul(2)
        .expect("is_ntt_friendly_prime: 2 * n must fit in u64");
    is_prime(p) && p % modulus == 1
}

/// Returns the largest `x <= value` such that `x % modulus == 1`, or `None`
/// when no such `x` exists.
fn snap_down_to_congruence(value: u64, modulus: u64) -> Option<u64> {
    assert!(
        modulus > 1,
        "snap_down_to_congruence: modulus must be greater than 1"
    );
    let remainder = value % modulus;
    let delta = (remainder + modulus - 1) % modulus;
    value.checked_sub(delta)
}

/// Returns the largest NTT-friendly prime `p` such that `p < bound`.
///
/// Returns `None` if no such prime exists below `bound`.
pub fn get_first_prime_down(bound: u64, n: u64) -> Option<u64> {
    assert!(n > 0, "get_first_prime_down: n must be positive");
    if bound <= 2 {
        return None;
    }

    let step = n
        .checked_mul(2)
        .expect("get_first_prime_down: 2 * n must fit in u64");
    let mut candidate = snap_down_to_congruence(bound - 1, step)?;

    loop {
        if candidate <= 2 {
            return None;
        }
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(step)?;
    }
}

/// Smallest prime width that can still satisfy `p = 1 (mod 2n)` with room
/// for more than one candidate: `log2(2n) + 2`.
pub fn min_prime_bits(degree: u64) -> u32 {
    (2 * degree).trailing_zeros() + 2
}

/// Builds the coefficient modulus chain for `degree` from a list of bit sizes.
///
/// Each entry yields a prime in `(2^(bits-1), 2^bits)`. Repeated sizes walk
/// further down so the chain never contains duplicates.
pub fn coeff_modulus_primes(
    degree: u64,
    bit_sizes: &[u32],
) -> Result<Vec<u64>, PrimeError> {
    let min = min_prime_bits(degree);
    let mut cursors: HashMap<u32, u64> = HashMap::new();
    let mut chain = Vec::with_capacity(bit_sizes.len());

    for &bits in bit_sizes {
        if !(min..=MAX_PRIME_BITS).contains(&bits) {
            return Err(PrimeError::BitSizeOutOfRange {
                bits,
                min,
                max: MAX_PRIME_BITS,
            });
        }
        let bound = cursors.get(&bits).copied().unwrap_or(1u64 << bits);
        let prime = get_first_prime_down(bound, degree)
            .filter(|&p| p > 1u64 << (bits - 1))
            .ok_or(PrimeError::Exhausted { bits, degree })?;
        cursors.insert(bits, prime);
        chain.push(prime);
    }

    Ok(chain)
}
