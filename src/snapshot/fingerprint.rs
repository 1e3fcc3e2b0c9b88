//! Content fingerprints
//!
//! Stable hash of a record set, used only to tell whether the in-memory
//! state has drifted from the last snapshot. Not an integrity check.

use xxhash_rust::xxh3::xxh3_128;

use crate::store::Records;

/// Deterministic content hash of a record set
///
/// Two maps holding the same key/value pairs must produce the same string,
/// whatever their iteration order.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, records: &Records) -> String;
}

/// XXH3-128 over the entries sorted by key
///
/// Every key and value is fed length-prefixed, so `("ab", "c")` and
/// `("a", "bc")` hash differently.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3Fingerprinter;

impl Fingerprinter for Xxh3Fingerprinter {
    fn fingerprint(&self, records: &Records) -> String {
        let mut entries: Vec<(&String, &String)> = records.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let capacity = entries.iter().map(|(k, v)| 16 + k.len() + v.len()).sum::<usize>();
        let mut buf = Vec::with_capacity(8 + capacity);
        buf.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        for (key, value) in entries {
            buf.extend_from_slice(&(key.len() as u64).to_le_bytes());
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(&(value.len() as u64).to_le_bytes());
            buf.extend_from_slice(value.as_bytes());
        }

        format!("{:032x}", xxh3_128(&buf))
    }
}
