//! CKKS encryption, decryption and the ciphertext wire format.

pub mod decryptor;
pub mod encryptor;
pub mod errors;
pub mod types;
pub mod wire;

pub use decryptor::{Decryptor, Verification};
pub use encryptor::{BatchFailure, Encryptor};
pub use errors::{CkksError, CkksResult};
pub use types::{Ciphertext, EncryptedBatch, Plaintext};
