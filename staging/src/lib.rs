use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use corpus::{AccountState, TestVector};

pub const GENESIS_FILE: &str = "genesis.json";
pub const BLOCKS_DIR: &str = "blocks";

/// Zero-pad width for block payload file names. Lexicographic listing of the
/// blocks directory must equal execution order.
const BLOCK_INDEX_WIDTH: usize = 4;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("block {index} payload is not valid hex: {source}")]
    Payload {
        index: usize,
        source: hex::FromHexError,
    },
    #[error("failed encoding genesis descriptor: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Paths handed to the subject via its environment.
#[derive(Clone, Debug)]
pub struct StagedArtifacts {
    pub genesis_path: PathBuf,
    pub blocks_dir: PathBuf,
}

/// Genesis descriptor in the form subjects initialize from: header fields
/// relayed verbatim plus the account pre-state as `alloc`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenesisSpec<'a> {
    nonce: &'a str,
    timestamp: &'a str,
    extra_data: &'a str,
    gas_limit: &'a str,
    difficulty: &'a str,
    mix_hash: &'a str,
    coinbase: &'a str,
    alloc: &'a BTreeMap<String, AccountState>,
}

/// Materializes a vector's genesis and block payloads under a
/// content-addressed directory.
///
/// The directory name is the unit identity digest, so re-staging the same
/// (file, test name) pair is idempotent and concurrently executing units can
/// never collide. On failure, partial output is left in place for diagnosis.
#[derive(Clone, Debug)]
pub struct ArtifactStager {
    root: PathBuf,
}

impl ArtifactStager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn stage(
        &self,
        vector: &TestVector,
        identity: &str,
    ) -> Result<StagedArtifacts, StagingError> {
        let unit_dir = self.root.join(identity);
        let blocks_dir = unit_dir.join(BLOCKS_DIR);
        fs::create_dir_all(&blocks_dir).map_err(|source| StagingError::Io {
            path: blocks_dir.clone(),
            source,
        })?;

        let genesis = GenesisSpec {
            nonce: &vector.genesis.nonce,
            timestamp: &vector.genesis.timestamp,
            extra_data: &vector.genesis.extra_data,
            gas_limit: &vector.genesis.gas_limit,
            difficulty: &vector.genesis.difficulty,
            mix_hash: &vector.genesis.mix_hash,
            coinbase: &vector.genesis.coinbase,
            alloc: &vector.pre,
        };
        let genesis_path = unit_dir.join(GENESIS_FILE);
        write_file(&genesis_path, &serde_json::to_vec(&genesis)?)?;

        for (index, block) in vector.blocks.iter().enumerate() {
            let payload = block
                .payload()
                .map_err(|source| StagingError::Payload { index, source })?;
            // 1-based, so the first payload the subject imports is 0001.rlp.
            let name = format!("{:0width$}.rlp", index + 1, width = BLOCK_INDEX_WIDTH);
            write_file(&blocks_dir.join(name), &payload)?;
        }

        debug!(
            identity,
            blocks = vector.blocks.len(),
            dir = %unit_dir.display(),
            "staged artifacts"
        );
        Ok(StagedArtifacts {
            genesis_path,
            blocks_dir,
        })
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StagingError> {
    fs::write(path, bytes).map_err(|source| StagingError::Io {
        path: path.to_path_buf(),
        source,
    })
}
