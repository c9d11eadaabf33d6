//! Error types for the ST 291 ancillary bitstream.

use thiserror::Error;

/// Errors raised while reading or building an ancillary data payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not enough bits left to satisfy a field read.
    #[error("Bitstream exhausted: requested {requested} bits, {remaining} remaining")]
    BitstreamExhausted { requested: u32, remaining: usize },

    /// Field width outside the supported 1..=32 range.
    #[error("Invalid field width: {0} bits")]
    InvalidFieldWidth(u32),

    /// Payload is shorter than its fixed header.
    #[error("Payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },

    /// An ancillary unit ended before all of its words could be decoded.
    #[error("Malformed ancillary unit #{unit} at bit {bit_offset}")]
    MalformedAncillaryUnit {
        unit: usize,
        bit_offset: usize,
        #[source]
        source: Box<ProtocolError>,
    },

    /// Caption data must be whole triplets, at most 31 of them.
    #[error("Invalid caption data length: {0} bytes")]
    InvalidCaptionData(usize),

    /// A payload can carry at most 255 ancillary units.
    #[error("Too many ancillary units: {0} (max: 255)")]
    TooManyUnits(usize),

    /// A unit's user data does not fit the 8-bit data count.
    #[error("Ancillary unit too long: {0} user data words (max: 255)")]
    UnitTooLong(usize),
}
