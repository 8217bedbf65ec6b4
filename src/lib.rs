//! CKKS encryption of per-user numeric columns.
//!
//! The pipeline: [`EncryptionContext`] validates the parameter set,
//! [`KeyGenerator`] derives one key pair, [`SlotBatcher`] splits each column
//! into slot-sized batches, [`Encryptor`] encodes and encrypts them, and
//! [`Decryptor`] checks a sample. [`EncryptionRun`] drives all of it over a
//! [`ColumnSource`].

pub mod batching;
pub mod config;
pub mod context;
pub mod crypto;
pub mod dataset;
pub mod encoding;
pub mod keys;
pub mod math;
pub mod rings;
pub mod run;

pub use batching::{Batch, SlotBatcher};
pub use config::{EncryptionConfig, RunConfig, Scheme, SecurityLevel};
pub use context::{ContextBuilder, EncryptionContext, ParmsId};
pub use crypto::{
    Ciphertext, CkksError, CkksResult, Decryptor, EncryptedBatch, Encryptor, Plaintext,
    Verification,
};
pub use dataset::{ColumnSource, CsvDirectorySource, DataError, UnavailableReason};
pub use encoding::CkksEncoder;
pub use keys::{KeyGenerator, KeyId, KeyPair, PublicKey, SecretKey};
pub use run::{EncryptionRun, RunError, RunReport, RunSummary};
