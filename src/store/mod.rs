//! Record Store Module
//!
//! In-memory mapping from string keys to string values.
//!
//! ## Responsibilities
//! - Create/read/update/delete single records
//! - Many concurrent readers or one writer, never both
//! - Hand out detached copies of the record set
//! - Remember the fingerprint of the last snapshot written to disk
//!
//! ## Data Structure Choice
//! `HashMap` wrapped in a `parking_lot::RwLock`:
//! - Key order is irrelevant (fingerprints sort on their own)
//! - Every operation is a single short critical section

mod collection;

pub use collection::RecordStore;

/// The full record set, as stored, encoded and fingerprinted
pub type Records = std::collections::HashMap<String, String>;
