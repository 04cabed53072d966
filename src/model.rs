//! Data model for ledger blocks and their content hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Payload carried by the genesis block.
pub const GENESIS_PAYLOAD: &[u8] = b"Genesis block";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// 0-indexed position in the ledger; genesis is 0.
    pub index: u64,
    /// UTC creation time (RFC3339 on the wire, nanosecond precision).
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Opaque payload bytes, hex on the wire.
    #[serde(with = "payload_hex")]
    pub payload: Vec<u8>,
    /// SHA-256 hex over index, timestamp, payload and previous hash.
    pub hash: String,
    /// Hash of the preceding block (empty for genesis).
    pub previous_hash: String,
}

impl Block {
    /// First block of a fresh ledger, stamped now.
    pub fn genesis() -> Self {
        Self::genesis_at(OffsetDateTime::now_utc())
    }

    pub fn genesis_at(timestamp: OffsetDateTime) -> Self {
        Self::seal(0, timestamp, GENESIS_PAYLOAD.to_vec(), String::new())
    }

    /// Build the successor of `previous` carrying `payload`, stamped now.
    ///
    /// Pure constructor: the ledger is not touched.
    pub fn next(previous: &Block, payload: Vec<u8>) -> Self {
        Self::next_at(previous, payload, OffsetDateTime::now_utc())
    }

    /// A `previous` at `u64::MAX` yields a block that fails the successor rule.
    pub fn next_at(previous: &Block, payload: Vec<u8>, timestamp: OffsetDateTime) -> Self {
        Self::seal(
            previous.index.saturating_add(1),
            timestamp,
            payload,
            previous.hash.clone(),
        )
    }

    /// True when the stored hash matches the block's own fields.
    pub fn is_sealed(&self) -> bool {
        self.hash == compute_block_hash(self)
    }

    fn seal(index: u64, timestamp: OffsetDateTime, payload: Vec<u8>, previous_hash: String) -> Self {
        let mut block = Block {
            index,
            timestamp,
            payload,
            hash: String::new(),
            previous_hash,
        };
        block.hash = compute_block_hash(&block);
        block
    }
}

/// Hash inputs (concatenate as bytes, SHA-256) and return lowercase hex.
pub fn hash_concat(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    hex::encode(hasher.finalize())
}

/// Compute a block hash from its fields.
/// Included: index (decimal), timestamp (decimal unix nanos), payload bytes, previous hash.
pub fn compute_block_hash(b: &Block) -> String {
    hash_concat(&[
        b.index.to_string().as_bytes(),
        b.timestamp.unix_timestamp_nanos().to_string().as_bytes(),
        &b.payload,
        b.previous_hash.as_bytes(),
    ])
}

mod payload_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
