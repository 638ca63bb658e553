use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::vector::TestVector;

/// Errors raised while loading and validating the corpus. All of them are
/// unit-scoped: the offending case or file is dropped and the walk goes on.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed reading fixture {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed fixture {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    UnknownNetwork(#[from] fork_rules::UnknownNetwork),
}

/// A scheduled test: one named vector from one fixture file.
///
/// Identity is the (source path, test name) pair. A case is owned by exactly
/// one worker for its whole lifetime, so it carries no synchronization.
#[derive(Clone, Debug)]
pub struct TestCase {
    pub path: PathBuf,
    pub name: String,
    pub vector: TestVector,
}

impl TestCase {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, vector: TestVector) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            vector,
        }
    }

    /// Reject cases whose network has no fork schedule, before any staging
    /// or provisioning can happen.
    pub fn validate(&self) -> Result<(), CorpusError> {
        fork_rules::resolve(&self.vector.network)?;
        Ok(())
    }

    /// Collision-resistant staging identity: hex SHA-256 over source path and
    /// test name. Identical pairs always map to the same digest; distinct
    /// pairs (including duplicate names across files) never share one.
    pub fn identity(&self) -> String {
        identity_digest(&self.path, &self.name)
    }

    /// Result label handed to the reporting sink.
    pub fn label(&self) -> String {
        format!("{}:{}", self.path.display(), self.name)
    }
}

pub fn identity_digest(path: &Path, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_os_str().as_encoded_bytes());
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}
