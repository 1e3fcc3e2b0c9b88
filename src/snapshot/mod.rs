//! Snapshot Module
//!
//! Pluggable pieces that turn a record set into snapshot bytes and back.
//!
//! ## Pipeline
//! ```text
//! Records ──Codec::encode──► bytes ──Compressor::compress──► file content
//! Records ◄─Codec::decode─── bytes ◄─Compressor::decompress─ file content
//!
//! Records ──Fingerprinter──► "9f1c…"   (change detection only)
//! ```
//!
//! The snapshot file carries no header or version tag: its content is
//! exactly `compress(encode(records))`.

mod codec;
mod compress;
mod fingerprint;

pub use codec::{BincodeCodec, Codec};
pub use compress::{Compressor, NoCompression, ZstdCompressor};
pub use fingerprint::{Fingerprinter, Xxh3Fingerprinter};
