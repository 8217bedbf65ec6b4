//! Word-sized modular arithmetic shared by the prime search, the NTT tables
//! and the RNS polynomial kernels. All moduli are below `2^62`, so sums of two
//! reduced values never overflow a `u64`.

#[inline]
pub fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    let s = a + b;
    if s >= q { s - q } else { s }
}

#[inline]
pub fn sub_mod(a: u64, b: u64, q: u64) -> u64 {
    if a >= b { a - b } else { a + q - b }
}

/// Computes `(a * b) mod q` using `u128` intermediate arithmetic.
#[inline]
pub fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

#[inline]
pub fn neg_mod(a: u64, q: u64) -> u64 {
    if a == 0 { 0 } else { q - a }
}

/// Computes `base^exp mod modulus` via binary exponentiation.
pub fn mod_pow(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    assert!(modulus > 0, "mod_pow: modulus must be positive");
    if modulus == 1 {
        return 0;
    }
    let mut acc = 1u64;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    acc
}

/// Modular inverse via the extended Euclidean algorithm.
///
/// # Panics
/// Panics if `value` and `modulus` are not coprime.
pub fn mod_inverse(value: u64, modulus: u64) -> u64 {
    fn extended_gcd(a: i128, b: i128) -> (i128, i128, i128) {
        if a == 0 {
            (b, 0, 1)
        } else {
            let (gcd, x1, y1) = extended_gcd(b % a, a);
            (gcd, y1 - (b / a) * x1, x1)
        }
    }
    let (gcd, x, _) = extended_gcd((value % modulus) as i128, modulus as i128);
    assert_eq!(gcd, 1, "mod_inverse: values must be coprime");
    x.rem_euclid(modulus as i128) as u64
}

/// Reduces an already-rounded `f64` integer into `[0, q)` without going
/// through `i64`, so magnitudes up to the full `f64` exponent range are exact.
pub fn reduce_rounded_f64(value: f64, q: u64) -> u64 {
    debug_assert!(value.is_finite(), "reduce_rounded_f64: non-finite input");
    debug_assert_eq!(value, value.round(), "reduce_rounded_f64: not an integer");
    let magnitude = value.abs();
    let residue = if magnitude < 9.223_372_036_854_775e18 {
        (magnitude as u64) % q
    } else {
        // |value| >= 2^63 means the exponent is positive: value = m * 2^e.
        let bits = magnitude.to_bits();
        let exponent = ((bits >> 52) & 0x7ff) as u64 - 1075;
        let mantissa = (bits & 0x000f_ffff_ffff_ffff) | 0x0010_0000_0000_0000;
        mul_mod(mantissa % q, mod_pow(2, exponent, q), q)
    };
    if value.is_sign_negative() {
        neg_mod(residue, q)
    } else {
        residue
    }
}
