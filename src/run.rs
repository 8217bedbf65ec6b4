//! The per-run driver: one context and one key pair, every user's matching
//! files encrypted batch by batch, and a single sample verification at the end.

use crate::config::RunConfig;
use crate::context::{EncryptionContext, ParmsId};
use crate::crypto::{CkksError, Decryptor, EncryptedBatch, Encryptor, Verification};
use crate::dataset::{ColumnSource, DataError};
use crate::keys::{KeyGenerator, KeyId, SecretKey};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("run setup failed: {0}")]
    Setup(#[from] CkksError),
    #[error(transparent)]
    DataRoot(DataError),
}

/// A user or file left out of the run because its data was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipRecord {
    pub user: String,
    /// `None` when the whole user was skipped.
    pub file: Option<String>,
    pub reason: String,
}

/// A file whose encryption stopped at `batch`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub user: String,
    pub file: String,
    pub batch: usize,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct EncryptedFile {
    pub user: String,
    pub file: String,
    pub values: usize,
    pub batches: Vec<EncryptedBatch>,
}

#[derive(Debug)]
pub struct RunReport {
    pub parms_id: ParmsId,
    pub key_id: KeyId,
    pub users_seen: usize,
    pub users_processed: usize,
    pub files_encrypted: usize,
    pub batches_encrypted: usize,
    pub skipped: Vec<SkipRecord>,
    pub failures: Vec<FailureRecord>,
    pub files: Vec<EncryptedFile>,
    pub verification: Option<Verification>,
}

/// Ciphertext-free view of a [`RunReport`] for printing.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub parms_id: String,
    pub key_id: String,
    pub users_seen: usize,
    pub users_processed: usize,
    pub files_encrypted: usize,
    pub batches_encrypted: usize,
    pub skipped: Vec<SkipRecord>,
    pub failures: Vec<FailureRecord>,
    pub files: Vec<FileSummary>,
    pub verification: Option<Verification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub user: String,
    pub file: String,
    pub values: usize,
    pub batches: usize,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            parms_id: self.parms_id.to_string(),
            key_id: self.key_id.to_string(),
            users_seen: self.users_seen,
            users_processed: self.users_processed,
            files_encrypted: self.files_encrypted,
            batches_encrypted: self.batches_encrypted,
            skipped: self.skipped.clone(),
            failures: self.failures.clone(),
            files: self
                .files
                .iter()
                .map(|f| FileSummary {
                    user: f.user.clone(),
                    file: f.file.clone(),
                    values: f.values,
                    batches: f.batches.len(),
                })
                .collect(),
            verification: self.verification.clone(),
        }
    }
}

struct FileJob {
    user: String,
    file: String,
}

enum FileOutcome {
    Encrypted {
        file: EncryptedFile,
        /// Source values of batch 0, kept for the sample verification.
        first_batch: Vec<f64>,
    },
    Skipped(SkipRecord),
    Failed(FailureRecord),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    AllUsers,
    /// First file of the first user only.
    Probe,
}

pub struct EncryptionRun {
    config: RunConfig,
}

impl EncryptionRun {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Encrypts every matching file of every user.
    pub fn execute<S: ColumnSource + ?Sized>(&self, source: &S) -> Result<RunReport, RunError> {
        self.run(source, Scope::AllUsers)
    }

    /// Quick environment check: encrypts the first matching file of the
    /// first user and verifies its first batch.
    pub fn probe<S: ColumnSource + ?Sized>(&self, source: &S) -> Result<RunReport, RunError> {
        self.run(source, Scope::Probe)
    }

    fn run<S: ColumnSource + ?Sized>(&self, source: &S, scope: Scope) -> Result<RunReport, RunError> {
        let tolerance = self.config.verification_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(CkksError::invalid_parameters(format!(
                "verification tolerance must be finite and non-negative, got {tolerance}"
            ))
            .into());
        }

        let ctx = Arc::new(EncryptionContext::from_config(&self.config.encryption)?);
        info!(
            degree = ctx.degree(),
            slots = ctx.slot_count(),
            parms_id = %ctx.parms_id(),
            "encryption context ready"
        );
        let (public, secret) = KeyGenerator::new(&ctx).generate()?.into_parts();
        let encryptor = Encryptor::new(ctx.clone(), &public)?;
        let mut master = ChaCha20Rng::try_from_os_rng().map_err(|e| {
            CkksError::KeyGenerationFailure {
                message: format!("entropy source unavailable: {e}"),
            }
        })?;

        let mut users = source.users().map_err(RunError::DataRoot)?;
        if scope == Scope::Probe {
            users.truncate(1);
        }
        info!(users = users.len(), "scanning user folders");

        let mut skipped = Vec::new();
        let mut jobs = Vec::new();
        let mut users_processed = 0;
        for user in &users {
            match source.files(user) {
                Ok(mut files) => {
                    if scope == Scope::Probe {
                        files.truncate(1);
                    }
                    info!(user = %user, files = files.len(), "processing user");
                    users_processed += 1;
                    jobs.extend(files.into_iter().map(|file| FileJob {
                        user: user.clone(),
                        file,
                    }));
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "skipping user");
                    skipped.push(SkipRecord {
                        user: user.clone(),
                        file: None,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let seeds: Vec<[u8; 32]> = jobs.iter().map(|_| master.random()).collect();
        let outcomes: Vec<FileOutcome> = if self.config.parallel {
            jobs.par_iter()
                .zip(seeds.into_par_iter())
                .map(|(job, seed)| encrypt_file(&encryptor, source, job, seed))
                .collect()
        } else {
            jobs.iter()
                .zip(seeds)
                .map(|(job, seed)| encrypt_file(&encryptor, source, job, seed))
                .collect()
        };

        let mut failures = Vec::new();
        let mut files = Vec::new();
        let mut sample: Option<Vec<f64>> = None;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Encrypted { file, first_batch } => {
                    if !file.batches.is_empty() {
                        sample = Some(first_batch);
                    }
                    files.push(file);
                }
                FileOutcome::Skipped(record) => skipped.push(record),
                FileOutcome::Failed(record) => failures.push(record),
            }
        }

        let mut verification = None;
        if let (Some(expected), Some(file)) = (
            sample,
            files.iter().rev().find(|f| !f.batches.is_empty()),
        ) {
            match verify_sample(&ctx, secret, file, &expected, tolerance) {
                Ok(result) => verification = Some(result),
                Err(record) => failures.push(record),
            }
        } else {
            info!("no encrypted batches to verify");
        }

        let report = RunReport {
            parms_id: ctx.parms_id(),
            key_id: public.key_id(),
            users_seen: users.len(),
            users_processed,
            files_encrypted: files.len(),
            batches_encrypted: files.iter().map(|f| f.batches.len()).sum(),
            skipped,
            failures,
            files,
            verification,
        };
        info!(
            files = report.files_encrypted,
            batches = report.batches_encrypted,
            skipped = report.skipped.len(),
            failures = report.failures.len(),
            "run complete"
        );
        Ok(report)
    }
}

/// Decrypts the first batch of `file` and compares it with `expected`. The
/// secret key is consumed here and dropped on return.
fn verify_sample(
    ctx: &Arc<EncryptionContext>,
    secret: SecretKey,
    file: &EncryptedFile,
    expected: &[f64],
    tolerance: f64,
) -> Result<Verification, FailureRecord> {
    let outcome = Decryptor::new(ctx.clone(), secret)
        .and_then(|decryptor| decryptor.verify(&file.batches[0].ciphertext, expected, tolerance));
    match outcome {
        Ok(result) => {
            info!(
                user = %file.user,
                file = %file.file,
                max_abs_error = result.max_abs_error,
                within_tolerance = result.within_tolerance,
                sample = ?result.sample,
                "verified first batch"
            );
            Ok(result)
        }
        Err(e) => {
            error!(user = %file.user, file = %file.file, error = %e, "sample verification failed");
            Err(FailureRecord {
                user: file.user.clone(),
                file: file.file.clone(),
                batch: 0,
                error: e.to_string(),
            })
        }
    }
}

fn encrypt_file<S: ColumnSource + ?Sized>(
    encryptor: &Encryptor,
    source: &S,
    job: &FileJob,
    seed: [u8; 32],
) -> FileOutcome {
    let values = match source.load_column(&job.user, &job.file) {
        Ok(values) => values,
        Err(e) => {
            warn!(user = %job.user, file = %job.file, error = %e, "skipping file");
            return FileOutcome::Skipped(SkipRecord {
                user: job.user.clone(),
                file: Some(job.file.clone()),
                reason: e.to_string(),
            });
        }
    };
    debug!(
        user = %job.user,
        file = %job.file,
        preview = ?&values[..values.len().min(5)],
        "loaded values"
    );

    let mut rng = ChaCha20Rng::from_seed(seed);
    match encryptor.encrypt_column(&values, &mut rng) {
        Ok(batches) => {
            info!(
                user = %job.user,
                file = %job.file,
                values = values.len(),
                batches = batches.len(),
                "encrypted file"
            );
            let first_len = values.len().min(encryptor.context().slot_count());
            FileOutcome::Encrypted {
                first_batch: values[..first_len].to_vec(),
                file: EncryptedFile {
                    user: job.user.clone(),
                    file: job.file.clone(),
                    values: values.len(),
                    batches,
                },
            }
        }
        Err(failure) => {
            warn!(user = %job.user, file = %job.file, %failure, "file encryption aborted");
            FileOutcome::Failed(FailureRecord {
                user: job.user.clone(),
                file: job.file.clone(),
                batch: failure.batch,
                error: failure.error.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncryptionConfig, SecurityLevel};
    use crate::dataset::UnavailableReason;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    /// In-memory source: user -> file -> column.
    struct MemorySource(BTreeMap<String, BTreeMap<String, Result<Vec<f64>, UnavailableReason>>>);

    impl MemorySource {
        fn new(entries: &[(&str, &str, Result<Vec<f64>, UnavailableReason>)]) -> Self {
            let mut users: BTreeMap<String, BTreeMap<_, _>> = BTreeMap::new();
            for (user, file, column) in entries {
                let files = users.entry(user.to_string()).or_default();
                if !file.is_empty() {
                    files.insert(file.to_string(), column.clone());
                }
            }
            Self(users)
        }
    }

    impl ColumnSource for MemorySource {
        fn users(&self) -> Result<Vec<String>, DataError> {
            Ok(self.0.keys().cloned().collect())
        }

        fn files(&self, user: &str) -> Result<Vec<String>, DataError> {
            let files: Vec<String> = self.0[user].keys().cloned().collect();
            if files.is_empty() {
                return Err(DataError::Unavailable {
                    reason: UnavailableReason::NoMatchingFiles,
                });
            }
            Ok(files)
        }

        fn load_column(&self, user: &str, file: &str) -> Result<Vec<f64>, DataError> {
            self.0[user][file]
                .clone()
                .map_err(|reason| DataError::Unavailable { reason })
        }
    }

    fn small_config(parallel: bool) -> RunConfig {
        RunConfig {
            encryption: EncryptionConfig {
                poly_modulus_degree: 32,
                coeff_modulus_bits: vec![45, 35, 45],
                scale_bits: 25,
                security: SecurityLevel::None,
                ..EncryptionConfig::default()
            },
            parallel,
            ..RunConfig::default()
        }
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64) * 0.01).collect()
    }

    #[test]
    fn encrypts_all_users_and_verifies_last_file() {
        let source = MemorySource::new(&[
            ("alice", "a.csv", Ok(ramp(40))),
            ("alice", "b.csv", Ok(ramp(5))),
            ("bob", "c.csv", Ok(ramp(16))),
            ("carol", "", Ok(vec![])),
        ]);
        for parallel in [true, false] {
            let report = EncryptionRun::new(small_config(parallel)).execute(&source).unwrap();
            assert_eq!(report.users_seen, 3);
            assert_eq!(report.users_processed, 2);
            assert_eq!(report.files_encrypted, 3);
            // 16 slots: 40 -> 3 batches, 5 -> 1, 16 -> 1
            assert_eq!(report.batches_encrypted, 5);
            assert_eq!(report.skipped.len(), 1);
            assert_eq!(report.skipped[0].user, "carol");
            assert!(report.failures.is_empty());
            let order: Vec<&str> = report.files.iter().map(|f| f.file.as_str()).collect();
            assert_eq!(order, vec!["a.csv", "b.csv", "c.csv"]);
            let verification = report.verification.unwrap();
            assert!(verification.within_tolerance);
            assert_eq!(verification.sample.len(), 5);
        }
    }

    #[test]
    fn bad_batch_fails_only_its_file() {
        let mut poisoned = ramp(40);
        poisoned[20] = f64::INFINITY;
        let source = MemorySource::new(&[
            ("alice", "a.csv", Ok(poisoned)),
            ("alice", "b.csv", Ok(ramp(3))),
            ("alice", "c.csv", Err(UnavailableReason::MissingColumn {
                column: "saberSpeed".into(),
            })),
        ]);
        let report = EncryptionRun::new(small_config(true)).execute(&source).unwrap();
        assert_eq!(report.files_encrypted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file, "a.csv");
        assert_eq!(report.failures[0].batch, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file.as_deref(), Some("c.csv"));
        assert!(report.verification.is_some());
    }

    #[test]
    fn no_files_means_no_verification() {
        let source = MemorySource::new(&[("alice", "", Ok(vec![]))]);
        let report = EncryptionRun::new(small_config(false)).execute(&source).unwrap();
        assert_eq!(report.files_encrypted, 0);
        assert!(report.verification.is_none());
    }

    #[test]
    fn probe_touches_one_file() {
        let source = MemorySource::new(&[
            ("alice", "a.csv", Ok(ramp(10))),
            ("alice", "b.csv", Ok(ramp(10))),
            ("bob", "c.csv", Ok(ramp(10))),
        ]);
        let report = EncryptionRun::new(small_config(true)).probe(&source).unwrap();
        assert_eq!(report.users_seen, 1);
        assert_eq!(report.files_encrypted, 1);
        assert_eq!(report.files[0].file, "a.csv");
        assert!(report.verification.unwrap().within_tolerance);
    }

    #[test]
    fn invalid_parameters_abort_before_user_work() {
        let source = MemorySource::new(&[("alice", "a.csv", Ok(ramp(10)))]);
        let mut config = small_config(false);
        config.encryption.poly_modulus_degree = 1000;
        let err = EncryptionRun::new(config).execute(&source).unwrap_err();
        assert!(matches!(
            err,
            RunError::Setup(CkksError::InvalidParameters { .. })
        ));
    }

    fn encrypted_sample(
        ctx: &Arc<EncryptionContext>,
        seed: u64,
        values: &[f64],
    ) -> (EncryptedFile, SecretKey) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let (public, secret) = KeyGenerator::new(ctx)
            .generate_with_rng(&mut rng)
            .unwrap()
            .into_parts();
        let encryptor = Encryptor::new(ctx.clone(), &public).unwrap();
        let file = EncryptedFile {
            user: "alice".into(),
            file: "a.csv".into(),
            values: values.len(),
            batches: encryptor.encrypt_column(values, &mut rng).unwrap(),
        };
        (file, secret)
    }

    #[test]
    fn sample_verification_passes_with_matching_key() {
        let ctx = Arc::new(EncryptionContext::from_config(&small_config(false).encryption).unwrap());
        let values = ramp(12);
        let (file, secret) = encrypted_sample(&ctx, 21, &values);
        let result = verify_sample(&ctx, secret, &file, &values, 1e-3).unwrap();
        assert!(result.within_tolerance);
    }

    #[test]
    fn failed_sample_verification_becomes_failure_record() {
        let ctx = Arc::new(EncryptionContext::from_config(&small_config(false).encryption).unwrap());
        let values = ramp(12);
        let (file, _) = encrypted_sample(&ctx, 22, &values);
        let (_, other_secret) = encrypted_sample(&ctx, 23, &values);

        let record = verify_sample(&ctx, other_secret, &file, &values, 1e-3).unwrap_err();
        assert_eq!(record.user, "alice");
        assert_eq!(record.file, "a.csv");
        assert_eq!(record.batch, 0);
        assert!(record.error.starts_with("Decryption failed"));
    }

    #[test]
    fn summary_serializes_without_ciphertexts() {
        let source = MemorySource::new(&[("alice", "a.csv", Ok(ramp(20)))]);
        let report = EncryptionRun::new(small_config(false)).execute(&source).unwrap();
        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["files"][0]["batches"], 2);
        assert_eq!(json["files_encrypted"], 1);
        assert!(json["verification"]["within_tolerance"].as_bool().unwrap());
    }
}
