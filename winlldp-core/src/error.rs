//! Error types for winlldp

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for winlldp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for winlldp
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration '{name}': {reason}")]
    Config { name: String, reason: String },

    /// TLV payload exceeds the 9-bit length field
    #[error("TLV type {tlv_type} payload is {len} bytes, maximum is 511")]
    TlvTooLong { tlv_type: u8, len: usize },

    /// Encoded frame exceeds the Ethernet payload limit
    #[error("Frame is {0} bytes on the wire, maximum is 1500")]
    FrameTooLong(usize),

    /// Management address or OID exceeds its one-byte length field
    #[error("Management address TLV field is {0} bytes, exceeding its one-byte length")]
    MgmtAddressTooLong(usize),

    /// Frame failed to decode
    #[error("Malformed LLDP frame: {0}")]
    MalformedFrame(String),

    /// Mandatory TLVs out of order
    #[error("Mandatory TLV order violated (expected Chassis ID, Port ID, TTL)")]
    FrameOrderInvalid,

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Send or receive failure on one interface
    #[error("Link I/O error on '{interface}': {reason}")]
    Link { interface: String, reason: String },

    /// Packet capture error
    #[error("Capture error: {0}")]
    Capture(String),

    /// Neighbor table file failed to parse
    #[error("Neighbor store at {} is corrupt", .0.display())]
    StoreCorrupt(PathBuf),

    /// Raw socket access denied
    #[error("Insufficient privileges: {0}")]
    PrivilegeDenied(String),

    /// Capture worker already running
    #[error("Capture worker already running (PID {0})")]
    WorkerAlreadyRunning(u32),

    /// Capture worker not running
    #[error("Capture worker is not running")]
    WorkerNotRunning,

    /// Operation not supported on this platform
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::Config {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a link I/O error
    pub fn link<I: Into<String>, R: Into<String>>(interface: I, reason: R) -> Self {
        Error::Link {
            interface: interface.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-frame error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedFrame(msg.into())
    }

    /// Process exit code for this error: 1 user error, 2 runtime error,
    /// 3 privilege error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. }
            | Error::InterfaceNotFound(_)
            | Error::WorkerAlreadyRunning(_)
            | Error::WorkerNotRunning
            | Error::NotSupported(_) => 1,
            Error::PrivilegeDenied(_) => 3,
            _ => 2,
        }
    }
}
