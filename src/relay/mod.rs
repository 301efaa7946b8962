// Relay server module
//
// Clients register a public key, look each other up, and leave encrypted
// payloads for one another. The relay stores each payload until its
// recipient collects it, then deletes it.

pub mod error;
pub mod protocol;
pub mod transport;
pub mod storage;
pub mod handler;
pub mod server;
pub mod cli;

pub use error::{ProtocolError, RelayError, StoreError, TransportError};
pub use protocol::{ClientId, MessageType, PublicKey, Request, Response, ResponseCode};
pub use storage::{RelayStore, SqliteStore};
pub use handler::{Dispatcher, Outcome};
pub use server::{serve_connection, RelayServer};
pub use cli::RelayCli;
