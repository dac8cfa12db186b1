//! Error taxonomy for the oracle core.
//!
//! Every fallible boundary in this crate returns one of these types rather
//! than `anyhow::Error` — the coordinator and its callers need to pattern
//! match on *why* something failed (malformed bytes vs. unrecognized
//! protocol vs. storage I/O) to decide whether to log-and-continue or abort.

use thiserror::Error;

/// Failure decoding a Plutus constructor-tagged CBOR value.
///
/// `NotMyDatum` is deliberately absent from this enum: a structurally valid
/// constructor tag that a given parser does not handle is a successful
/// `Ok(None)` result (see the `parsers` module), never an `Err`.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed CBOR: {0}")]
    Malformed(String),

    #[error("unexpected constructor tag: got {got}, expected {expected}")]
    UnexpectedTag { got: u64, expected: String },

    #[error("unexpected shape: {0}")]
    UnexpectedShape(String),
}

impl DecodeError {
    pub fn shape(msg: impl Into<String>) -> Self {
        DecodeError::UnexpectedShape(msg.into())
    }
}

/// Failure opening, reading, or writing the embedded key-value store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage operation failed: {0}")]
    Sled(#[from] sled::Error),

    #[error("storage value encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("storage value decode failed for key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure parsing a caller-supplied identifier (hex string, pool id, etc).
#[derive(Error, Debug)]
pub enum ParseInputError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}
