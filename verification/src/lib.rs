use std::time::Duration;

use corpus::Hash256;
use serde_json::json;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

/// Deadline applied to each query attempt separately.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wire port of a subject's query endpoint, appended when the host
/// hands back a bare address.
const SUBJECT_RPC_PORT: u16 = 8545;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("query timed out")]
    Timeout,
    #[error("no hash field in response")]
    MissingHash,
    #[error("hash field is not valid hex: {0}")]
    MalformedHash(hex::FromHexError),
}

impl QueryError {
    /// Transport-level failures cover the subject-still-starting race and
    /// get one retry; protocol-level failures are deterministic.
    fn is_transport(&self) -> bool {
        matches!(self, QueryError::Transport(_) | QueryError::Timeout)
    }
}

/// Hash inequality between the vector's expectation and the subject's chain.
/// Deterministic, never retried; the message carries both values.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{block} mismatch, expected {expected} got {got}")]
pub struct Mismatch {
    pub block: &'static str,
    pub expected: String,
    pub got: String,
}

/// Which block of the subject's chain to query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSelector {
    Number(u64),
    /// The subject's current best block.
    Head,
}

impl BlockSelector {
    pub fn rpc_param(self) -> String {
        match self {
            BlockSelector::Number(number) => format!("0x{number:x}"),
            BlockSelector::Head => "latest".to_string(),
        }
    }
}

/// Query client for one subject instance.
pub struct SubjectClient {
    endpoint: String,
    http: reqwest::Client,
}

impl SubjectClient {
    pub fn new(address: &str) -> Self {
        let endpoint = if address.contains(':') {
            format!("http://{address}")
        } else {
            format!("http://{address}:{SUBJECT_RPC_PORT}")
        };
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the selected block's hash as raw bytes.
    ///
    /// Exactly one retry on a transport-level failure: the host reports a
    /// node as started slightly before its endpoint accepts connections,
    /// and a single second attempt absorbs that race.
    pub async fn query_hash(&self, selector: BlockSelector) -> Result<Vec<u8>, QueryError> {
        match self.attempt(selector).await {
            Err(err) if err.is_transport() => {
                debug!(%err, "subject query failed, making one more attempt");
                self.attempt(selector).await
            }
            outcome => outcome,
        }
    }

    async fn attempt(&self, selector: BlockSelector) -> Result<Vec<u8>, QueryError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getBlockByNumber",
            "params": [selector.rpc_param(), false],
        });

        let response = timeout(QUERY_TIMEOUT, async {
            self.http
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<serde_json::Value>()
                .await
        })
        .await
        .map_err(|_| QueryError::Timeout)??;

        let hash = response
            .pointer("/result/hash")
            .and_then(|hash| hash.as_str())
            .ok_or(QueryError::MissingHash)?;
        hex::decode(hash.trim_start_matches("0x")).map_err(QueryError::MalformedHash)
    }
}

/// Compare the observed genesis hash against the vector's expectation.
pub fn verify_genesis(expected: &Hash256, got: &[u8]) -> Result<(), Mismatch> {
    compare("genesis", expected, got)
}

/// Compare the observed best-block hash against the vector's expectation.
pub fn verify_best_block(expected: &Hash256, got: &[u8]) -> Result<(), Mismatch> {
    compare("last block", expected, got)
}

fn compare(block: &'static str, expected: &Hash256, got: &[u8]) -> Result<(), Mismatch> {
    if expected.as_bytes()[..] == *got {
        return Ok(());
    }
    Err(Mismatch {
        block,
        expected: expected.to_string(),
        got: format!("0x{}", hex::encode(got)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn selector_renders_rpc_params() {
        assert_eq!(BlockSelector::Number(0).rpc_param(), "0x0");
        assert_eq!(BlockSelector::Number(31).rpc_param(), "0x1f");
        assert_eq!(BlockSelector::Head.rpc_param(), "latest");
    }

    #[test]
    fn byte_equal_hashes_verify() {
        let expected = Hash256([0xab; 32]);
        assert!(verify_genesis(&expected, &[0xab; 32]).is_ok());
        assert!(verify_best_block(&expected, &[0xab; 32]).is_ok());
    }

    #[test]
    fn a_single_differing_byte_fails_with_both_values() {
        let expected = Hash256([0xab; 32]);
        let mut got = [0xab; 32];
        got[31] = 0xac;

        let err = verify_best_block(&expected, &got).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&expected.to_string()), "{message}");
        assert!(message.contains(&format!("0x{}", hex::encode(got))), "{message}");
    }

    #[test]
    fn length_mismatch_fails() {
        let expected = Hash256([0; 32]);
        assert!(verify_genesis(&expected, &[0; 31]).is_err());
    }
}
