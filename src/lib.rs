//! msgrelay - store-and-forward relay for end-to-end encrypted messaging
//!
//! The relay speaks a fixed-layout little-endian binary protocol over TCP,
//! exchanged in 1024-byte units. It keeps a registry of client public keys
//! and a queue of opaque payloads that are deleted once delivered.

pub mod relay;

pub use relay::{RelayCli, RelayServer, SqliteStore};
