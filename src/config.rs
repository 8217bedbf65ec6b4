//! Run and encryption configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest total coefficient modulus any supported parameter set may use.
pub const GLOBAL_MAX_COEFF_BITS: u32 = 881;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Ckks,
    Bfv,
    Bgv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Only the global modulus ceiling applies. Test use only.
    None,
    Tc128,
    Tc192,
    Tc256,
}

impl SecurityLevel {
    /// Maximum total coefficient modulus bits for `degree` (HE standard
    /// tables). `None` when the degree has no entry at this level.
    pub fn max_coeff_bits(self, degree: usize) -> Option<u32> {
        let table: &[u32; 6] = match self {
            SecurityLevel::None => {
                return Some(GLOBAL_MAX_COEFF_BITS);
            }
            SecurityLevel::Tc128 => &[27, 54, 109, 218, 438, 881],
            SecurityLevel::Tc192 => &[19, 37, 75, 152, 305, 611],
            SecurityLevel::Tc256 => &[14, 29, 58, 118, 237, 476],
        };
        let index = match degree {
            1024 => 0,
            2048 => 1,
            4096 => 2,
            8192 => 3,
            16384 => 4,
            32768 => 5,
            _ => return None,
        };
        Some(table[index])
    }
}

/// CKKS parameter set. Scale is `2^scale_bits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub scheme: Scheme,
    pub poly_modulus_degree: usize,
    pub coeff_modulus_bits: Vec<u32>,
    pub scale_bits: u32,
    pub security: SecurityLevel,
    pub error_std: f64,
    /// Non-zero coefficients of the secret key; `degree / 2` when unset.
    pub hamming_weight: Option<usize>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Ckks,
            poly_modulus_degree: 8192,
            coeff_modulus_bits: vec![60, 40, 40, 60],
            scale_bits: 40,
            security: SecurityLevel::Tc128,
            error_std: 3.2,
            hamming_weight: None,
        }
    }
}

impl EncryptionConfig {
    pub fn scale(&self) -> f64 {
        2f64.powi(self.scale_bits as i32)
    }

    pub fn slot_capacity(&self) -> usize {
        self.poly_modulus_degree / 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding one subdirectory per user.
    pub data_root: PathBuf,
    /// Name of the numeric column to encrypt.
    pub column: String,
    /// Substring a file name must contain to be picked up.
    pub file_marker: String,
    pub file_extension: String,
    pub encryption: EncryptionConfig,
    /// Maximum absolute error accepted when verifying the sample batch.
    pub verification_tolerance: f64,
    pub parallel: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            column: "saberSpeed".to_string(),
            file_marker: "normalized".to_string(),
            file_extension: "csv".to_string(),
            encryption: EncryptionConfig::default(),
            verification_tolerance: 1e-3,
            parallel: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RunConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_parameters() {
        let config = RunConfig::default();
        assert_eq!(config.column, "saberSpeed");
        assert_eq!(config.encryption.poly_modulus_degree, 8192);
        assert_eq!(config.encryption.coeff_modulus_bits, vec![60, 40, 40, 60]);
        assert_eq!(config.encryption.scale(), 2f64.powi(40));
        assert_eq!(config.encryption.slot_capacity(), 4096);
        assert!(config.parallel);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RunConfig::from_toml_str(
            r#"
            data_root = "/tmp/users"
            parallel = false

            [encryption]
            poly_modulus_degree = 16384
            security = "tc192"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_root, PathBuf::from("/tmp/users"));
        assert!(!config.parallel);
        assert_eq!(config.encryption.poly_modulus_degree, 16384);
        assert_eq!(config.encryption.security, SecurityLevel::Tc192);
        assert_eq!(config.encryption.scale_bits, 40);
        assert_eq!(config.column, "saberSpeed");
    }

    #[test]
    fn unknown_scheme_is_a_parse_error() {
        let result = RunConfig::from_toml_str("[encryption]\nscheme = \"paillier\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn security_tables() {
        assert_eq!(SecurityLevel::Tc128.max_coeff_bits(8192), Some(218));
        assert_eq!(SecurityLevel::Tc192.max_coeff_bits(16384), Some(305));
        assert_eq!(SecurityLevel::Tc256.max_coeff_bits(1024), Some(14));
        assert_eq!(SecurityLevel::Tc128.max_coeff_bits(512), None);
        assert_eq!(
            SecurityLevel::None.max_coeff_bits(16),
            Some(GLOBAL_MAX_COEFF_BITS)
        );
    }
}
