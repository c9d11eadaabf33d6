//! ANC word and unit header decoding.
//!
//! Every logical byte of an ancillary data packet travels as a 10-bit word:
//!
//! ```text
//!  b9   b8   b7 ............ b0
//! +----+----+-------------------+
//! | !P |  P |    data value     |
//! +----+----+-------------------+
//! ```
//!
//! `P` is the even parity of b0..b7. Decoding keeps only the low 8 bits.

use serde::{Deserialize, Serialize};

use crate::bits::{BitReader, BitWriter};
use crate::error::ProtocolError;

/// Width of one ANC word in bits.
pub const ANC_WORD_BITS: u32 = 10;

/// Well-known data identifiers.
pub mod did {
    /// EIA-708 caption distribution packet (SMPTE ST 334).
    pub const CAPTION_DISTRIBUTION: u16 = 0x61;
}

/// Well-known secondary data identifiers.
pub mod sdid {
    /// CEA-708 CDP under DID 0x61.
    pub const CEA708_CDP: u16 = 0x01;
    /// CEA-608 line 21 data under DID 0x61.
    pub const CEA608: u16 = 0x02;
}

/// Read one 10-bit ANC word and return its data value, dropping b8/b9.
pub fn read_word(reader: &mut BitReader<'_>) -> Result<u8, ProtocolError> {
    Ok((reader.read_bits(ANC_WORD_BITS)? & 0xFF) as u8)
}

/// Skip `count` ANC words.
pub fn skip_words(reader: &mut BitReader<'_>, count: usize) -> Result<(), ProtocolError> {
    reader.skip_bits(count * ANC_WORD_BITS as usize)
}

/// Build the 10-bit word for `value`, setting b8 to even parity and b9 to its inverse.
pub fn encode_word(value: u8) -> u16 {
    let parity = (value.count_ones() & 1) as u16;
    ((parity ^ 1) << 9) | (parity << 8) | value as u16
}

/// Write `value` as one 10-bit word.
pub fn write_word(writer: &mut BitWriter, value: u8) -> Result<(), ProtocolError> {
    writer.write_bits(encode_word(value) as u32, ANC_WORD_BITS)
}

/// Check b8/b9 of a raw 10-bit word against its data value.
///
/// The decoder never calls this; parity errors are passed through.
pub fn word_parity_ok(word: u16) -> bool {
    encode_word((word & 0xFF) as u8) == word & 0x3FF
}

/// The three words opening every ancillary unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncUnitHeader {
    /// Data identifier.
    pub did: u16,
    /// Secondary data identifier.
    pub sdid: u16,
    /// Declared number of user data words.
    pub data_count: u16,
}

impl AncUnitHeader {
    /// Decode DID, SDID and data count.
    pub fn read(reader: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        let did = read_word(reader)? as u16;
        let sdid = read_word(reader)? as u16;
        let data_count = read_word(reader)? as u16;
        Ok(Self {
            did,
            sdid,
            data_count,
        })
    }

    /// Encode DID, SDID and data count.
    pub fn write(&self, writer: &mut BitWriter) -> Result<(), ProtocolError> {
        write_word(writer, self.did as u8)?;
        write_word(writer, self.sdid as u8)?;
        write_word(writer, self.data_count as u8)
    }

    /// Whether this unit carries a CEA-708 caption distribution packet.
    pub fn is_caption_distribution(&self) -> bool {
        self.did == did::CAPTION_DISTRIBUTION && self.sdid == sdid::CEA708_CDP
    }
}
