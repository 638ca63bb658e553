use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::case::{CorpusError, TestCase};
use crate::vector::TestVector;

pub const FIXTURE_EXTENSION: &str = "json";

/// Queue depth between the walk and the worker pool. Small on purpose: the
/// walk is cheap and only needs to stay ahead of the consumers.
const QUEUE_CAPACITY: usize = 64;

/// Stream validated test cases from the fixture tree under `root`.
///
/// A single blocking producer walks the tree once, in lexical order, and
/// sends every valid case into the returned channel. Malformed fixture files
/// and cases with an unknown network are logged and dropped without stopping
/// the walk. The channel closes when the walk completes; the stream is
/// finite and not restartable.
pub fn deliver_tests(root: PathBuf) -> mpsc::Receiver<TestCase> {
    let (out, cases) = mpsc::channel(QUEUE_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let mut stats = WalkStats::default();
        walk(&root, &out, &mut stats);
        info!(files = stats.files, tests = stats.tests, "fixture walk done");
    });
    cases
}

#[derive(Default)]
struct WalkStats {
    files: usize,
    tests: usize,
}

/// Returns false once the receiving side is gone and walking is pointless.
fn walk(dir: &Path, out: &mpsc::Sender<TestCase>, stats: &mut WalkStats) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            error!(dir = %dir.display(), %err, "skipping unreadable directory");
            return true;
        }
    };

    let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            if !walk(&path, out, stats) {
                return false;
            }
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(FIXTURE_EXTENSION) {
            continue;
        }

        let tests = match load_fixture(&path) {
            Ok(tests) => tests,
            Err(err) => {
                error!(%err, "skipping fixture");
                continue;
            }
        };
        stats.files += 1;

        for (name, vector) in tests {
            // Each entry becomes its own case value before it crosses the
            // channel; workers must never observe a reused binding.
            let case = TestCase::new(&path, name, vector);
            if let Err(err) = case.validate() {
                error!(test = %case.name, %err, "dropping invalid case");
                continue;
            }
            debug!(test = %case.name, file = %path.display(), "queueing case");
            stats.tests += 1;
            if out.blocking_send(case).is_err() {
                return false;
            }
        }
    }
    true
}

fn load_fixture(path: &Path) -> Result<BTreeMap<String, TestVector>, CorpusError> {
    let data = fs::read_to_string(path).map_err(|source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| CorpusError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
