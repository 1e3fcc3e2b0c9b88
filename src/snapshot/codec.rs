//! Snapshot codec
//!
//! Serializes the record set to bytes and back.

use crate::error::{Result, SnapError};
use crate::store::Records;

/// Record set serializer
///
/// Implementations must round-trip exactly: `decode(encode(m)) == m`.
pub trait Codec: Send + Sync {
    /// Serialize a record set
    fn encode(&self, records: &Records) -> Result<Vec<u8>>;

    /// Deserialize a record set
    fn decode(&self, bytes: &[u8]) -> Result<Records>;

    /// Short identifier used in log lines
    fn name(&self) -> &'static str;
}

/// bincode encoding of the record map
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode(&self, records: &Records) -> Result<Vec<u8>> {
        bincode::serialize(records).map_err(|e| SnapError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Records> {
        bincode::deserialize(bytes).map_err(|e| SnapError::Decode(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "bincode"
    }
}
