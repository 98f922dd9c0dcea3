//! Error types for rendezvous transports

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for rendezvous operations
pub type Result<T> = std::result::Result<T, RendezvousError>;

/// Errors that can occur in rendezvous operations
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// Failed to create the region file
    #[error("Failed to create region file {path:?}: {source}")]
    FileCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to open an existing region file
    #[error("Failed to open region file {path:?}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create shared memory
    #[error("Failed to create shared memory '{name}': {source}")]
    ShmCreate {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to open shared memory
    #[error("Failed to open shared memory '{name}': {source}")]
    ShmOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to map memory
    #[error("Failed to map memory: {0}")]
    Mmap(#[source] io::Error),

    /// Failed to size the region
    #[error("Failed to set region size: {0}")]
    Truncate(#[source] io::Error),

    /// Positional read or write on the medium failed
    #[error("Medium I/O failed at offset {offset}: {source}")]
    Io {
        offset: usize,
        #[source]
        source: io::Error,
    },

    /// Field access outside the region
    #[error("Access out of bounds: offset {offset} + {len} bytes exceeds region of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    /// The channel has been closed by this endpoint or its peer
    #[error("Channel is closed")]
    Closed,

    /// Message larger than the payload capacity
    #[error("Payload too large: max {max} bytes, got {got} bytes")]
    PayloadTooLarge { max: usize, got: usize },

    /// Zero-length messages cannot be told apart from an empty slot
    #[error("Empty messages cannot be sent")]
    EmptyMessage,

    /// Receive buffer cannot hold the pending message
    #[error("Receive buffer too small: need {need} bytes, got {got} bytes")]
    BufferTooSmall { need: usize, got: usize },

    /// The size field holds a value the protocol never writes
    #[error("Corrupt channel header: pending size {pending_size}, payload capacity {max}")]
    CorruptHeader { pending_size: i32, max: usize },

    /// Region too small to hold the header
    #[error("Region of {size} bytes cannot hold the {header} byte header")]
    RegionTooSmall { size: usize, header: usize },

    /// Echoed bytes differ from what was sent
    #[error("Integrity violation at byte {offset}: expected 0x{expected:02X}, got 0x{got:02X}")]
    IntegrityViolation { offset: usize, expected: u8, got: u8 },

    /// Echoed message has a different length than what was sent
    #[error("Echo length mismatch: sent {sent} bytes, received {received} bytes")]
    LengthMismatch { sent: usize, received: usize },

    /// Benchmark configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The echo peer terminated abnormally
    #[error("Echo peer failed: {0}")]
    PeerFailed(String),
}

impl RendezvousError {
    /// True for the closed sentinel, the only expected terminal condition
    pub fn is_closed(&self) -> bool {
        matches!(self, RendezvousError::Closed)
    }
}
