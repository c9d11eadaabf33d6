//! Error types for the ancillary data depacketizer.

use bytes::Bytes;
use smpte291_protocol::ProtocolError;
use thiserror::Error;

use crate::depacketizer::PacketOutcome;

/// Errors returned while processing an RTP packet.
///
/// Every variant hands back the frames finalized while handling the packet,
/// so no caption bytes are lost to an error. See [`DepayError::into_frames`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DepayError {
    /// A unit of the packet could not be decoded.
    ///
    /// Units before the broken one were kept and the timestamp and marker
    /// were applied as usual; `outcome` tells what became of the frames.
    #[error("Malformed payload: {source}")]
    Protocol {
        #[source]
        source: ProtocolError,
        outcome: PacketOutcome,
    },

    /// Appending the packet's caption bytes would exceed the frame capacity.
    ///
    /// The packet is rejected. Whatever frame was open has been finalized
    /// into `partial` and the depacketizer is idle.
    #[error("Frame buffer overflow: {attempted} bytes exceed capacity of {capacity}")]
    FrameBufferOverflow {
        attempted: usize,
        capacity: usize,
        partial: Option<Bytes>,
    },

    /// The frame buffer could not be allocated.
    ///
    /// The packet is dropped and the depacketizer is idle. A frame left open
    /// by a missed marker was finalized into `flushed` first.
    #[error("Failed to allocate {requested} byte frame buffer")]
    AllocationFailure {
        requested: usize,
        flushed: Option<Bytes>,
    },
}

impl DepayError {
    /// Frames handed back with the error, oldest first.
    pub fn into_frames(self) -> Vec<Bytes> {
        match self {
            DepayError::Protocol { outcome, .. } => outcome.into_frames(),
            DepayError::FrameBufferOverflow { partial, .. } => partial.into_iter().collect(),
            DepayError::AllocationFailure { flushed, .. } => flushed.into_iter().collect(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for [`crate::DepayConfig`].
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by SDP attribute handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    /// `fmtp:` line without a payload type.
    #[error("Missing payload type in fmtp attribute: {0:?}")]
    MissingPayloadType(String),

    /// Payload type is not a number in 0..=127.
    #[error("Invalid payload type in fmtp attribute: {0:?}")]
    InvalidPayloadType(String),
}

/// Result type alias using DepayError.
pub type Result<T> = std::result::Result<T, DepayError>;
