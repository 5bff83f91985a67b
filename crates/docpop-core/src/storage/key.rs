//! Key encoding for stored documents.
//!
//! Keys start with a one-byte identifier type tag so identifiers of different
//! types never collide. Integer keys are stored big-endian with the sign bit
//! flipped, so they sort numerically.

use docpop_proto::DocId;

use crate::error::Error;

const UUID_TAG: u8 = 1;
const STRING_TAG: u8 = 2;
const INT_TAG: u8 = 3;

/// Prefix of every collection tree name.
pub const COLLECTION_TREE_PREFIX: &str = "collection:";

/// Encode an identifier as a tree key.
pub fn encode_id(id: &DocId) -> Vec<u8> {
    match id {
        DocId::Uuid(uuid) => {
            let mut key = Vec::with_capacity(17);
            key.push(UUID_TAG);
            key.extend_from_slice(uuid);
            key
        }
        DocId::String(s) => {
            let mut key = Vec::with_capacity(1 + s.len());
            key.push(STRING_TAG);
            key.extend_from_slice(s.as_bytes());
            key
        }
        DocId::Int(i) => {
            let mut key = Vec::with_capacity(9);
            key.push(INT_TAG);
            key.extend_from_slice(&((*i as u64) ^ (1 << 63)).to_be_bytes());
            key
        }
    }
}

/// Decode a tree key back to an identifier.
pub fn decode_id(key: &[u8]) -> Result<DocId, Error> {
    let (tag, rest) = key
        .split_first()
        .ok_or_else(|| Error::InvalidData("empty key".into()))?;
    match *tag {
        UUID_TAG => {
            let uuid: [u8; 16] = rest
                .try_into()
                .map_err(|_| Error::InvalidData("uuid key has wrong length".into()))?;
            Ok(DocId::Uuid(uuid))
        }
        STRING_TAG => String::from_utf8(rest.to_vec())
            .map(DocId::String)
            .map_err(|_| Error::InvalidData("string key is not UTF-8".into())),
        INT_TAG => {
            let bytes: [u8; 8] = rest
                .try_into()
                .map_err(|_| Error::InvalidData("int key has wrong length".into()))?;
            Ok(DocId::Int((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64))
        }
        other => Err(Error::InvalidData(format!("unknown key tag: {}", other))),
    }
}

/// Tree name for a collection.
pub fn collection_tree(collection: &str) -> String {
    format!("{}{}", COLLECTION_TREE_PREFIX, collection)
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
