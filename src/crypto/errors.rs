use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CkksError {
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Key generation failed: {message}")]
    KeyGenerationFailure { message: String },

    #[error("Encoding out of range: {message}")]
    EncodingOutOfRange { message: String },

    #[error("Encryption failed: {message}")]
    EncryptionFailure { message: String },

    #[error("Decryption failed: {message}")]
    DecryptionFailure { message: String },
}

impl CkksError {
    pub(crate) fn invalid_parameters(message: impl Into<String>) -> Self {
        CkksError::InvalidParameters {
            message: message.into(),
        }
    }

    pub(crate) fn out_of_range(message: impl Into<String>) -> Self {
        CkksError::EncodingOutOfRange {
            message: message.into(),
        }
    }

    pub(crate) fn encryption(message: impl Into<String>) -> Self {
        CkksError::EncryptionFailure {
            message: message.into(),
        }
    }

    pub(crate) fn decryption(message: impl Into<String>) -> Self {
        CkksError::DecryptionFailure {
            message: message.into(),
        }
    }
}

pub type CkksResult<T> = Result<T, CkksError>;
