// src/error.rs
use thiserror::Error;

/// Failures while parsing raw NDEF bytes (TLV area or message records).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NdefError {
    #[error("NDEF data ended at offset {offset}, {needed} more byte(s) expected")]
    Truncated { offset: usize, needed: usize },

    #[error("NDEF message contains no records")]
    EmptyMessage,

    #[error("NDEF message is missing its Message End record")]
    MissingMessageEnd,
}

/// Failures talking to the card through the reader.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("transmit error: {0}")]
    Transmit(#[from] pcsc::Error),

    #[error("card answered with status {sw1:02X}{sw2:02X}")]
    Status { sw1: u8, sw2: u8 },

    #[error("response too short ({0} bytes)")]
    ShortResponse(usize),

    #[error("could not authenticate block {0} with any known key")]
    Auth(u8),

    #[error("no data could be read from the card")]
    NoData,
}

/// Everything that can go wrong while processing one discovered tag.
#[derive(Debug, Error)]
pub enum TagError {
    /// The tag does not expose NDEF at all.
    #[error("tag is not NDEF formatted")]
    UnsupportedTag,

    #[error("failed to connect to tag: {0}")]
    Connection(String),

    #[error("tag session is not open")]
    NotConnected,

    /// Neither a live nor a cached message is available.
    #[error("no NDEF message found")]
    NoMessageFound,

    #[error("failed to read tag: {0}")]
    Read(#[from] CardError),

    #[error("failed to decode NDEF message: {0}")]
    Decode(#[from] NdefError),

    /// Only ever logged.
    #[error("failed to close tag session: {0}")]
    Close(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
