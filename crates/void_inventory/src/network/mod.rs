//! Inventory replication
//!
//! The server is the only mutator of authoritative container state. It
//! pushes changes to every client observing a container; clients send
//! move/split/transfer requests which the server re-validates and
//! re-executes.
//!
//! Transport is the host's job. The inventory system queues outgoing
//! [`Envelope`]s and the host drains them with
//! [`InventorySystem::drain_outbox`](crate::InventorySystem::drain_outbox),
//! feeding received frames back through `handle_client_message` /
//! `handle_server_message`.

pub mod protocol;
pub mod replication;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use void_core::CodecError;

pub use protocol::{InventoryMessage, NetworkEvent};

/// Identifier of a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

/// Which side of the connection this system runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetRole {
    /// Authoritative simulation
    Server,
    /// Replica applying server pushes
    Client,
}

impl Default for NetRole {
    fn default() -> Self {
        Self::Server
    }
}

/// Destination of an outgoing frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Client to server request
    Server,
    /// Server to the listed clients
    Clients(Vec<ClientId>),
}

/// An encoded message waiting for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub recipient: Recipient,
    pub frame: Vec<u8>,
}

/// Protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unknown message kind: {0}")]
    UnknownKind(u8),

    #[error("Frame length mismatch: header says {declared} bytes, {actual} available")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0} trailing bytes after message payload")]
    TrailingBytes(usize),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
