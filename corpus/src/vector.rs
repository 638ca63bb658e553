use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::serde_helpers::decode_hex_payload;
use crate::types::Hash256;

/// One fixture entry: canonical genesis state, a block sequence, and the
/// expected terminal chain state. Deserialized once and never mutated.
///
/// Unknown fixture fields are ignored; only the fields the executor needs
/// are extracted.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestVector {
    pub network: String,
    #[serde(default)]
    pub seal_engine: String,
    #[serde(rename = "genesisBlockHeader")]
    pub genesis: GenesisHeader,
    #[serde(default)]
    pub pre: BTreeMap<String, AccountState>,
    #[serde(default)]
    pub blocks: Vec<BlockEntry>,
    #[serde(rename = "lastblockhash")]
    pub best_block: Hash256,
}

/// Genesis header fields carried through to the staged genesis descriptor.
///
/// Numeric fields stay in their fixture hex encoding; the subject parses
/// them, we only relay. The `hash` field is the expected genesis hash and
/// is decoded for byte comparison.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisHeader {
    pub coinbase: String,
    pub difficulty: String,
    pub extra_data: String,
    pub gas_limit: String,
    pub mix_hash: String,
    pub nonce: String,
    pub timestamp: String,
    pub hash: Hash256,
}

/// Pre-state allocation for a single account.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AccountState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<String, String>>,
}

/// One encoded block of the vector's chain.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BlockEntry {
    #[serde(default)]
    pub rlp: String,
}

impl BlockEntry {
    /// The raw block payload, decoded from its hex encoding.
    pub fn payload(&self) -> Result<Vec<u8>, hex::FromHexError> {
        decode_hex_payload(&self.rlp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "network": "Frontier",
        "sealEngine": "NoProof",
        "genesisBlockHeader": {
            "coinbase": "0x8888f1f195afa192cfee860698584c030f4c9db1",
            "difficulty": "0x020000",
            "extraData": "0x42",
            "gasLimit": "0x2fefd8",
            "mixHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "nonce": "0x0102030405060708",
            "timestamp": "0x54c98c81",
            "stateRoot": "0x7dba07d6b448a186e9612e5f737d1c909dce473e53199901a302c00646d523c1",
            "hash": "0x5a39ed1020c04d4d84539975b893a4e7c53eab6c2965db8bc3468093a31bc5ae"
        },
        "pre": {
            "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": {
                "balance": "0x09184e72a000",
                "code": "0x",
                "nonce": "0x00",
                "storage": {}
            }
        },
        "blocks": [
            { "rlp": "0xf9045df90458c0c0" },
            { "rlp": "0xdeadbeef", "blocknumber": "2" }
        ],
        "lastblockhash": "0x8f7fd20b53ec9f3e92e6b7a07b9fdfdb7b6d2f9f8fdd1f4b4fe3a2a8a2f9e9d1"
    }"#;

    #[test]
    fn parses_the_fields_the_executor_needs() {
        let vector: TestVector = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(vector.network, "Frontier");
        assert_eq!(vector.seal_engine, "NoProof");
        assert_eq!(vector.genesis.difficulty, "0x020000");
        assert_eq!(
            vector.genesis.hash.to_string(),
            "0x5a39ed1020c04d4d84539975b893a4e7c53eab6c2965db8bc3468093a31bc5ae"
        );
        assert_eq!(vector.pre.len(), 1);
        assert_eq!(vector.blocks.len(), 2);
        assert_eq!(vector.blocks[1].payload().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn seal_engine_defaults_to_empty() {
        let trimmed = SAMPLE.replacen("\"sealEngine\": \"NoProof\",", "", 1);
        let vector: TestVector = serde_json::from_str(&trimmed).unwrap();
        assert_eq!(vector.seal_engine, "");
    }

    #[test]
    fn truncated_hash_is_rejected() {
        let bad = SAMPLE.replace(
            "0x8f7fd20b53ec9f3e92e6b7a07b9fdfdb7b6d2f9f8fdd1f4b4fe3a2a8a2f9e9d1",
            "0x8f7fd2",
        );
        assert!(serde_json::from_str::<TestVector>(&bad).is_err());
    }
}
