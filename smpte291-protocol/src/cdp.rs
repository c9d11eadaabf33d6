//! Caption distribution packet (CDP) extraction.
//!
//! Layout of a caption unit, one 10-bit ANC word per row:
//!
//! ```text
//! DID (0x61) | SDID (0x01) | data count
//! cdp_identifier (0x96, 0x69)
//! cdp_length
//! cdp_frame_rate
//! cdp_flags
//! cdp_hdr_sequence_cntr (2 words)
//! ccdata_id (0x72)
//! marker bits | cc_count (low 5 bits)
//! cc_count x { cc_info, cc_data_1, cc_data_2 }
//! cdp footer (0x74, sequence counter, checksum)
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::anc::{self, read_word, skip_words, write_word, AncUnitHeader, ANC_WORD_BITS};
use crate::bits::{BitReader, BitWriter};
use crate::error::ProtocolError;

/// `cdp_identifier` value.
pub const CDP_IDENTIFIER: u16 = 0x9669;
/// `ccdata_section` id.
pub const CCDATA_ID: u8 = 0x72;
/// `cdp_footer` section id.
pub const CDP_FOOTER_ID: u8 = 0x74;

/// Words consumed before the first caption triplet.
pub const CDP_PREAMBLE_WORDS: usize = 9;
/// Footer words: section id, two sequence counter bytes, checksum.
pub const CDP_FOOTER_WORDS: usize = 4;
/// Bytes per caption triplet.
pub const CC_TRIPLET_SIZE: usize = 3;
/// `cc_count` is a 5-bit field.
pub const MAX_CC_COUNT: usize = 0x1F;

/// Decoded CDP preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdpHeader {
    /// Should equal [`CDP_IDENTIFIER`].
    pub identifier: u16,
    pub cdp_length: u8,
    pub frame_rate: u8,
    pub flags: u8,
    pub sequence_counter: u16,
    /// Should equal [`CCDATA_ID`].
    pub ccdata_id: u8,
    /// Number of caption triplets (5 bits).
    pub cc_count: u8,
}

impl CdpHeader {
    /// Decode the nine preamble words.
    pub fn read(reader: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        let id_hi = read_word(reader)? as u16;
        let id_lo = read_word(reader)? as u16;
        let cdp_length = read_word(reader)?;
        let frame_rate = read_word(reader)?;
        let flags = read_word(reader)?;
        // Sequence counter spans two words, read as one 20-bit field
        let seq = reader.read_bits(2 * ANC_WORD_BITS)?;
        let sequence_counter = ((((seq >> ANC_WORD_BITS) & 0xFF) << 8) | (seq & 0xFF)) as u16;
        let ccdata_id = read_word(reader)?;
        let cc_count = read_word(reader)? & MAX_CC_COUNT as u8;

        Ok(Self {
            identifier: (id_hi << 8) | id_lo,
            cdp_length,
            frame_rate,
            flags,
            sequence_counter,
            ccdata_id,
            cc_count,
        })
    }

    /// Whether the identifier and ccdata section id hold their fixed values.
    pub fn is_well_formed(&self) -> bool {
        self.identifier == CDP_IDENTIFIER && self.ccdata_id == CCDATA_ID
    }

    /// Number of caption bytes following the preamble.
    pub fn caption_len(&self) -> usize {
        self.cc_count as usize * CC_TRIPLET_SIZE
    }
}

/// One decoded ancillary unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncillaryUnit {
    pub header: AncUnitHeader,
    /// Present when the unit is a caption distribution packet.
    pub cdp: Option<CdpHeader>,
    /// Caption triplet bytes in wire order; empty for other units.
    pub captions: Bytes,
}

impl AncillaryUnit {
    /// Whether this unit contributed caption bytes.
    pub fn has_captions(&self) -> bool {
        !self.captions.is_empty()
    }
}

/// Decode one ancillary unit starting at the reader's cursor.
///
/// Caption units yield their triplet bytes; any declared words past the
/// triplets (the CDP footer) are skipped. Other units are skipped by their
/// declared data count.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedAncillaryUnit`] if the bitstream ends
/// inside the unit.
pub fn read_unit(reader: &mut BitReader<'_>, index: usize) -> Result<AncillaryUnit, ProtocolError> {
    let start = reader.position();
    decode_unit(reader).map_err(|e| ProtocolError::MalformedAncillaryUnit {
        unit: index,
        bit_offset: start,
        source: Box::new(e),
    })
}

fn decode_unit(reader: &mut BitReader<'_>) -> Result<AncillaryUnit, ProtocolError> {
    let header = AncUnitHeader::read(reader)?;
    let declared = header.data_count as usize;

    if !header.is_caption_distribution() {
        skip_words(reader, declared)?;
        return Ok(AncillaryUnit {
            header,
            cdp: None,
            captions: Bytes::new(),
        });
    }

    let cdp = CdpHeader::read(reader)?;
    let mut captions = BytesMut::with_capacity(cdp.caption_len());
    for _ in 0..cdp.caption_len() {
        captions.put_u8(read_word(reader)?);
    }

    let consumed = CDP_PREAMBLE_WORDS + cdp.caption_len();
    if declared > consumed {
        skip_words(reader, declared - consumed)?;
    }

    Ok(AncillaryUnit {
        header,
        cdp: Some(cdp),
        captions: captions.freeze(),
    })
}

/// Encode a complete caption unit (header, CDP with footer and checksum).
///
/// `cc_data` must hold whole triplets, at most [`MAX_CC_COUNT`] of them.
pub fn write_caption_unit(
    writer: &mut BitWriter,
    cc_data: &[u8],
    sequence_counter: u16,
    frame_rate: u8,
) -> Result<(), ProtocolError> {
    if cc_data.len() % CC_TRIPLET_SIZE != 0 || cc_data.len() / CC_TRIPLET_SIZE > MAX_CC_COUNT {
        return Err(ProtocolError::InvalidCaptionData(cc_data.len()));
    }

    let cdp_length = CDP_PREAMBLE_WORDS + cc_data.len() + CDP_FOOTER_WORDS;
    let [seq_hi, seq_lo] = sequence_counter.to_be_bytes();
    let [id_hi, id_lo] = CDP_IDENTIFIER.to_be_bytes();

    let mut cdp = Vec::with_capacity(cdp_length);
    cdp.extend_from_slice(&[
        id_hi,
        id_lo,
        cdp_length as u8,
        frame_rate,
        0x43, // ccdata_present | caption_service_active | reserved
        seq_hi,
        seq_lo,
        CCDATA_ID,
        0xE0 | (cc_data.len() / CC_TRIPLET_SIZE) as u8,
    ]);
    cdp.extend_from_slice(cc_data);
    cdp.extend_from_slice(&[CDP_FOOTER_ID, seq_hi, seq_lo]);
    let sum = cdp.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    cdp.push(sum.wrapping_neg());

    let header = AncUnitHeader {
        did: anc::did::CAPTION_DISTRIBUTION,
        sdid: anc::sdid::CEA708_CDP,
        data_count: cdp_length as u16,
    };
    header.write(writer)?;
    for &b in &cdp {
        write_word(writer, b)?;
    }
    Ok(())
}
