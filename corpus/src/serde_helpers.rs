// Serde helpers for the fixture JSON format. Hashes arrive as 0x-prefixed
// hex strings and are compared as raw bytes, so they are decoded eagerly.

use serde::{Deserialize, Deserializer, Serializer};

pub mod hash_hex {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let hex_str = String::deserialize(deserializer)?;
        let stripped = hex_str.trim_start_matches("0x");
        let bytes = hex::decode(stripped)
            .map_err(|e| D::Error::custom(format!("invalid hex string: {e}")))?;
        bytes.as_slice().try_into().map_err(|_| {
            D::Error::custom(format!("expected 32 hash bytes, got {}", bytes.len()))
        })
    }

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }
}

/// Decode a 0x-prefixed hex payload into raw bytes.
pub fn decode_hex_payload(payload: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(payload.trim_start_matches("0x"))
}
