//! Bitstream definitions for SMPTE ST 291 ancillary data over RTP.
//!
//! This crate decodes the ANC payload carried in an RTP packet down to the
//! caption bytes of CEA-708 caption distribution packets. It holds no state
//! between packets; reassembly into frames lives in `smpte291-rtp`.
//!
//! # Payload Format
//!
//! ```text
//! +---------+--------+-------+-------+------------------------------+
//! | Ext seq | Length | Count | F/rsv |  ANC units (10-bit words)    |
//! +---------+--------+-------+-------+------------------------------+
//! | 2 bytes | 2 bytes| 1 byte| ...   |  starts at byte 12           |
//! ```
//!
//! Each unit opens with DID, SDID and data count words. Units with
//! DID/SDID `0x61/0x01` carry a CDP whose caption triplets are extracted.
//!
//! # Example
//!
//! ```rust
//! use smpte291_protocol::{AncPayload, AncPayloadBuilder, DEFAULT_ANC_DATA_OFFSET};
//!
//! let payload = AncPayloadBuilder::new()
//!     .caption_unit(&[0xFC, 0x94, 0x2C, 0xFC, 0x94, 0x25, 0xFD, 0x80, 0x80])
//!     .build()
//!     .unwrap();
//!
//! let parsed = AncPayload::parse(&payload, DEFAULT_ANC_DATA_OFFSET).unwrap();
//! assert_eq!(parsed.header.anc_count, 1);
//!
//! let captions: Vec<u8> = parsed
//!     .units()
//!     .map(|unit| unit.unwrap().captions)
//!     .flat_map(|bytes| bytes.to_vec())
//!     .collect();
//! assert_eq!(captions.len(), 9);
//! ```

pub mod anc;
pub mod bits;
pub mod cdp;
pub mod error;
pub mod payload;

pub use anc::{encode_word, read_word, word_parity_ok, AncUnitHeader, ANC_WORD_BITS};
pub use bits::{read_bits, BitReader, BitWriter};
pub use cdp::{read_unit, AncillaryUnit, CdpHeader, CC_TRIPLET_SIZE, MAX_CC_COUNT};
pub use error::ProtocolError;
pub use payload::{
    AncPayload, AncPayloadBuilder, AncUnitIterator, FieldIndication, PayloadHeader,
    DEFAULT_ANC_DATA_OFFSET,
};
