//! Parameter validation and the immutable encryption context shared by every
//! stage of a run.

use crate::{
    config::{EncryptionConfig, Scheme, SecurityLevel},
    crypto::{CkksError, CkksResult, Plaintext},
    encoding::CkksEncoder,
    math::primes::{MAX_PRIME_BITS, coeff_modulus_primes, min_prime_bits},
    rings::{RnsBasis, RnsPoly},
};
use std::{fmt, sync::Arc};

const MIN_DEGREE: usize = 8;
const MAX_DEGREE: usize = 32768;

/// Fingerprint of a parameter set: blake3 over the degree, the prime chain and
/// the scale.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParmsId([u8; 32]);

impl ParmsId {
    fn compute(degree: usize, primes: &[u64], scale_bits: u32) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(degree as u64).to_le_bytes());
        hasher.update(&(primes.len() as u64).to_le_bytes());
        for prime in primes {
            hasher.update(&prime.to_le_bytes());
        }
        hasher.update(&scale_bits.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ParmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ParmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParmsId({self})")
    }
}

/// Validated CKKS parameters plus everything derived from them.
///
/// The key basis holds the whole prime chain; the data basis drops the last
/// (special) prime when the chain has more than one. Ciphertexts live over
/// the data basis.
#[derive(Debug)]
pub struct EncryptionContext {
    config: EncryptionConfig,
    hamming_weight: usize,
    key_basis: Arc<RnsBasis>,
    data_basis: Arc<RnsBasis>,
    parms_id: ParmsId,
    encoder: CkksEncoder,
}

impl EncryptionContext {
    pub fn from_config(config: &EncryptionConfig) -> CkksResult<Self> {
        if config.scheme != Scheme::Ckks {
            return Err(CkksError::invalid_parameters(format!(
                "scheme {:?} is not supported, only CKKS",
                config.scheme
            )));
        }

        let degree = config.poly_modulus_degree;
        if !degree.is_power_of_two() || !(MIN_DEGREE..=MAX_DEGREE).contains(&degree) {
            return Err(CkksError::invalid_parameters(format!(
                "poly modulus degree must be a power of two in [{MIN_DEGREE}, {MAX_DEGREE}], got {degree}"
            )));
        }
        let budget = config.security.max_coeff_bits(degree).ok_or_else(|| {
            CkksError::invalid_parameters(format!(
                "degree {degree} has no {:?} security entry (1024..=32768 required)",
                config.security
            ))
        })?;

        let chain = &config.coeff_modulus_bits;
        if chain.is_empty() {
            return Err(CkksError::invalid_parameters(
                "coefficient modulus chain is empty",
            ));
        }
        let min_bits = min_prime_bits(degree as u64);
        if let Some(&bits) = chain
            .iter()
            .find(|&&bits| !(min_bits..=MAX_PRIME_BITS).contains(&bits))
        {
            return Err(CkksError::invalid_parameters(format!(
                "prime size {bits} outside [{min_bits}, {MAX_PRIME_BITS}] for degree {degree}"
            )));
        }
        let total_bits: u32 = chain.iter().sum();
        if total_bits > budget {
            let level = match config.security {
                SecurityLevel::None => "the global".to_string(),
                other => format!("the {other:?}"),
            };
            return Err(CkksError::invalid_parameters(format!(
                "coefficient modulus of {total_bits} bits exceeds {level} limit of {budget} bits for degree {degree}"
            )));
        }

        let data_channels = if chain.len() > 1 {
            chain.len() - 1
        } else {
            1
        };
        let data_bits: u32 = chain[..data_channels].iter().sum();
        if config.scale_bits == 0 || config.scale_bits >= data_bits {
            return Err(CkksError::invalid_parameters(format!(
                "scale bits must be in [1, {data_bits}), got {}",
                config.scale_bits
            )));
        }

        if !config.error_std.is_finite() || config.error_std <= 0.0 {
            return Err(CkksError::invalid_parameters(format!(
                "error standard deviation must be finite and positive, got {}",
                config.error_std
            )));
        }
        let hamming_weight = config.hamming_weight.unwrap_or(degree / 2);
        if hamming_weight == 0 || hamming_weight > degree {
            return Err(CkksError::invalid_parameters(format!(
                "hamming weight must be in [1, {degree}], got {hamming_weight}"
            )));
        }

        let primes = coeff_modulus_primes(degree as u64, chain)
            .map_err(|e| CkksError::invalid_parameters(e.to_string()))?;
        let key_basis = RnsBasis::new(degree, primes.clone())
            .map_err(|e| CkksError::invalid_parameters(e.to_string()))?;
        let data_basis = key_basis
            .prefix(data_channels)
            .map_err(|e| CkksError::invalid_parameters(e.to_string()))?;
        let encoder = CkksEncoder::new(degree, config.scale_bits)?;

        Ok(Self {
            config: config.clone(),
            hamming_weight,
            key_basis: Arc::new(key_basis),
            data_basis: Arc::new(data_basis),
            parms_id: ParmsId::compute(degree, &primes, config.scale_bits),
            encoder,
        })
    }

    pub fn config(&self) -> &EncryptionConfig {
        &self.config
    }

    pub fn degree(&self) -> usize {
        self.config.poly_modulus_degree
    }

    pub fn slot_count(&self) -> usize {
        self.encoder.slot_count()
    }

    pub fn scale_bits(&self) -> u32 {
        self.config.scale_bits
    }

    pub fn error_std(&self) -> f64 {
        self.config.error_std
    }

    pub fn hamming_weight(&self) -> usize {
        self.hamming_weight
    }

    pub fn key_basis(&self) -> &Arc<RnsBasis> {
        &self.key_basis
    }

    pub fn data_basis(&self) -> &Arc<RnsBasis> {
        &self.data_basis
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub fn encoder(&self) -> &CkksEncoder {
        &self.encoder
    }

    /// Encodes values into a plaintext over the data basis.
    pub fn encode(&self, values: &[f64]) -> CkksResult<Plaintext> {
        let coeffs = self
            .encoder
            .encode_coefficients(values, self.data_basis.modulus_log2())?;
        let poly = RnsPoly::from_rounded(&coeffs, Arc::clone(&self.data_basis))
            .map_err(|e| CkksError::out_of_range(e.to_string()))?;
        Ok(Plaintext::new(poly, self.scale_bits(), values.len(), self.parms_id))
    }

    /// Decodes the `slots` values held by a plaintext.
    pub fn decode(&self, plaintext: &Plaintext) -> Vec<f64> {
        let coeffs = plaintext.poly().to_centered_f64();
        self.encoder.decode_coefficients(&coeffs, plaintext.slots())
    }
}

/// Fluent construction of an [`EncryptionContext`], starting from the
/// default parameter set.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: EncryptionConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.config.scheme = scheme;
        self
    }

    pub fn poly_modulus_degree(mut self, degree: usize) -> Self {
        self.config.poly_modulus_degree = degree;
        self
    }

    pub fn coeff_modulus_bits(mut self, bits: impl Into<Vec<u32>>) -> Self {
        self.config.coeff_modulus_bits = bits.into();
        self
    }

    pub fn scale_bits(mut self, scale_bits: u32) -> Self {
        self.config.scale_bits = scale_bits;
        self
    }

    pub fn security(mut self, security: SecurityLevel) -> Self {
        self.config.security = security;
        self
    }

    pub fn error_std(mut self, error_std: f64) -> Self {
        self.config.error_std = error_std;
        self
    }

    pub fn hamming_weight(mut self, weight: usize) -> Self {
        self.config.hamming_weight = Some(weight);
        self
    }

    pub fn build(self) -> CkksResult<EncryptionContext> {
        EncryptionContext::from_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn small_context() -> EncryptionContext {
        ContextBuilder::new()
            .poly_modulus_degree(16)
            .coeff_modulus_bits([40, 30, 40])
            .scale_bits(20)
            .security(SecurityLevel::None)
            .build()
            .unwrap()
    }

    fn assert_invalid(builder: ContextBuilder) {
        assert!(matches!(
            builder.build(),
            Err(CkksError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn default_parameters_build() {
        let ctx = ContextBuilder::new().build().unwrap();
        assert_eq!(ctx.degree(), 8192);
        assert_eq!(ctx.slot_count(), 4096);
        assert_eq!(ctx.key_basis().channel_count(), 4);
        assert_eq!(ctx.data_basis().channel_count(), 3);
        assert!(ctx.data_basis().is_prefix_of(ctx.key_basis()));
        assert_eq!(ctx.hamming_weight(), 4096);
    }

    #[test]
    fn single_prime_chain_keeps_it_for_data() {
        let ctx = ContextBuilder::new()
            .poly_modulus_degree(1024)
            .coeff_modulus_bits([27])
            .scale_bits(10)
            .build()
            .unwrap();
        assert_eq!(ctx.data_basis().channel_count(), 1);
    }

    #[test]
    fn parms_id_depends_on_primes() {
        let a = small_context();
        let b = small_context();
        assert_eq!(a.parms_id(), b.parms_id());
        let c = ContextBuilder::new()
            .poly_modulus_degree(16)
            .coeff_modulus_bits([40, 31, 40])
            .scale_bits(20)
            .security(SecurityLevel::None)
            .build()
            .unwrap();
        assert_ne!(a.parms_id(), c.parms_id());
    }

    #[test]
    fn parms_id_depends_on_scale() {
        let coarse = ContextBuilder::new().scale_bits(30).build().unwrap();
        let fine = ContextBuilder::new().build().unwrap();
        assert_eq!(coarse.key_basis().moduli(), fine.key_basis().moduli());
        assert_ne!(coarse.parms_id(), fine.parms_id());
    }

    #[test]
    fn rejects_other_schemes() {
        assert_invalid(ContextBuilder::new().scheme(Scheme::Bfv));
        assert_invalid(ContextBuilder::new().scheme(Scheme::Bgv));
    }

    #[test]
    fn rejects_bad_degrees() {
        assert_invalid(ContextBuilder::new().poly_modulus_degree(0));
        assert_invalid(ContextBuilder::new().poly_modulus_degree(3000));
        assert_invalid(ContextBuilder::new().poly_modulus_degree(65536));
        // 512 is below the smallest standard table entry.
        assert_invalid(
            ContextBuilder::new()
                .poly_modulus_degree(512)
                .coeff_modulus_bits([20]),
        );
    }

    #[test]
    fn rejects_chain_over_security_budget() {
        // 8192 allows 218 bits at 128-bit security.
        assert_invalid(ContextBuilder::new().coeff_modulus_bits([60, 60, 60, 60]));
        assert_invalid(
            ContextBuilder::new()
                .security(SecurityLevel::Tc256)
                .coeff_modulus_bits([60, 40, 40, 60]),
        );
    }

    #[test]
    fn rejects_bad_prime_sizes() {
        assert_invalid(ContextBuilder::new().coeff_modulus_bits(Vec::<u32>::new()));
        assert_invalid(ContextBuilder::new().coeff_modulus_bits([61, 40]));
        // 2N = 16384 needs primes of at least 16 bits.
        assert_invalid(ContextBuilder::new().coeff_modulus_bits([60, 12, 60]));
    }

    #[test]
    fn rejects_bad_scale() {
        assert_invalid(ContextBuilder::new().scale_bits(0));
        // Data modulus is 60 + 40 + 40 = 140 bits.
        assert_invalid(ContextBuilder::new().scale_bits(140));
    }

    #[test]
    fn rejects_bad_noise_parameters() {
        assert_invalid(ContextBuilder::new().error_std(0.0));
        assert_invalid(ContextBuilder::new().error_std(f64::NAN));
        assert_invalid(ContextBuilder::new().hamming_weight(0));
        assert_invalid(ContextBuilder::new().hamming_weight(8193));
    }

    #[test]
    fn encode_decode_through_context() {
        let ctx = small_context();
        let values = [0.5, -1.25, 3.0];
        let plaintext = ctx.encode(&values).unwrap();
        assert_eq!(plaintext.slots(), 3);
        assert_eq!(plaintext.parms_id(), ctx.parms_id());
        let decoded = ctx.decode(&plaintext);
        assert_eq!(decoded.len(), 3);
        for (d, v) in decoded.iter().zip(&values) {
            assert_abs_diff_eq!(d, v, epsilon = 1e-4);
        }
    }

    #[test]
    fn parms_id_display_is_short_hex() {
        let shown = small_context().parms_id().to_string();
        assert_eq!(shown.len(), 16);
        assert!(shown.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
