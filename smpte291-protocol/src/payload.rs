//! RTP payload header for ST 291 ancillary data.
//!
//! ```text
//! +----------+----------+-------+----------+-----------------+
//! | Ext seq  | Length   | ANC   | F | rsvd |  ANC bitstream  |
//! | u16 BE   | u16 BE   | count |          |                 |
//! +----------+----------+-------+----------+-----------------+
//! | 2 bytes  | 2 bytes  | 1 byte| 3 bytes  |                 |
//! ```
//!
//! The ANC bitstream starts at a fixed offset (12 bytes by default); the
//! bytes between the fixed header and that offset are not interpreted.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::anc::{write_word, AncUnitHeader};
use crate::bits::{BitReader, BitWriter};
use crate::cdp::{read_unit, write_caption_unit, AncillaryUnit};
use crate::error::ProtocolError;

/// Offset of the ANC bitstream within the RTP payload.
pub const DEFAULT_ANC_DATA_OFFSET: usize = 12;

/// Bytes needed to read the header fields up to and including F.
pub const MIN_HEADER_SIZE: usize = 6;

/// Index of the ANC count byte.
pub const ANC_COUNT_OFFSET: usize = 4;

/// Maximum units one payload can announce.
pub const MAX_ANC_COUNT: usize = u8::MAX as usize;

/// The F field: which video field the payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldIndication {
    /// Progressive scan or field not specified.
    Progressive = 0,
    /// Reserved value.
    Invalid = 1,
    /// First field of an interlaced frame.
    Field1 = 2,
    /// Second field of an interlaced frame.
    Field2 = 3,
}

impl From<u8> for FieldIndication {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => FieldIndication::Progressive,
            2 => FieldIndication::Field1,
            3 => FieldIndication::Field2,
            _ => FieldIndication::Invalid,
        }
    }
}

/// Parsed payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHeader {
    /// High 16 bits of the extended RTP sequence number.
    pub extended_sequence_number: u16,
    /// Declared payload length in bytes.
    pub length: u16,
    /// Number of ANC units in the bitstream.
    pub anc_count: u8,
    pub field: FieldIndication,
}

impl PayloadHeader {
    /// Decode the header fields from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < MIN_HEADER_SIZE {
            return Err(ProtocolError::PayloadTooShort {
                expected: MIN_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        Ok(Self {
            extended_sequence_number: u16::from_be_bytes([buf[0], buf[1]]),
            length: u16::from_be_bytes([buf[2], buf[3]]),
            anc_count: buf[ANC_COUNT_OFFSET],
            field: FieldIndication::from(buf[5] >> 6),
        })
    }
}

/// A payload split into its header and ANC bitstream.
#[derive(Debug, Clone)]
pub struct AncPayload<'a> {
    pub header: PayloadHeader,
    /// Bitstream following the excluded header bytes.
    pub anc_data: &'a [u8],
}

impl<'a> AncPayload<'a> {
    /// Parse a payload whose ANC bitstream starts at `anc_data_offset`.
    pub fn parse(buf: &'a [u8], anc_data_offset: usize) -> Result<Self, ProtocolError> {
        let expected = anc_data_offset.max(MIN_HEADER_SIZE);
        if buf.len() < expected {
            return Err(ProtocolError::PayloadTooShort {
                expected,
                actual: buf.len(),
            });
        }

        Ok(Self {
            header: PayloadHeader::decode(buf)?,
            anc_data: &buf[anc_data_offset..],
        })
    }

    /// Iterate over the units announced by the header.
    pub fn units(&self) -> AncUnitIterator<'a> {
        AncUnitIterator {
            reader: BitReader::new(self.anc_data),
            index: 0,
            count: self.header.anc_count as usize,
            failed: false,
        }
    }
}

/// Iterator decoding ANC units in order.
///
/// Stops after the announced count, or after the first error since the
/// position of any later unit is unknown.
pub struct AncUnitIterator<'a> {
    reader: BitReader<'a>,
    index: usize,
    count: usize,
    failed: bool,
}

impl<'a> AncUnitIterator<'a> {
    /// Bit position of the next unit.
    pub fn position(&self) -> usize {
        self.reader.position()
    }
}

impl<'a> Iterator for AncUnitIterator<'a> {
    type Item = Result<AncillaryUnit, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.count {
            return None;
        }

        let result = read_unit(&mut self.reader, self.index);
        self.index += 1;
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.count - self.index))
        }
    }
}

enum PendingUnit {
    Caption { cc_data: Vec<u8>, sequence_counter: u16 },
    Raw { did: u8, sdid: u8, user_data: Vec<u8> },
}

/// Builder for synthetic ANC payloads.
///
/// # Example
///
/// ```
/// use smpte291_protocol::{AncPayload, AncPayloadBuilder, DEFAULT_ANC_DATA_OFFSET};
///
/// let payload = AncPayloadBuilder::new()
///     .caption_unit(&[0x80, 0x94, 0x2C])
///     .build()
///     .unwrap();
///
/// let parsed = AncPayload::parse(&payload, DEFAULT_ANC_DATA_OFFSET).unwrap();
/// let unit = parsed.units().next().unwrap().unwrap();
/// assert_eq!(&unit.captions[..], &[0x80, 0x94, 0x2C]);
/// ```
pub struct AncPayloadBuilder {
    extended_sequence_number: u16,
    field: FieldIndication,
    frame_rate: u8,
    anc_data_offset: usize,
    units: Vec<PendingUnit>,
}

impl AncPayloadBuilder {
    /// Create a builder for a progressive payload with the default layout.
    pub fn new() -> Self {
        Self {
            extended_sequence_number: 0,
            field: FieldIndication::Progressive,
            frame_rate: 0x4F,
            anc_data_offset: DEFAULT_ANC_DATA_OFFSET,
            units: Vec::new(),
        }
    }

    pub fn extended_sequence_number(mut self, value: u16) -> Self {
        self.extended_sequence_number = value;
        self
    }

    pub fn field(mut self, field: FieldIndication) -> Self {
        self.field = field;
        self
    }

    /// CDP frame rate byte (rate code in the high nibble).
    pub fn frame_rate(mut self, frame_rate: u8) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Offset at which the ANC bitstream starts; header bytes past the
    /// fixed fields are zero-filled.
    pub fn anc_data_offset(mut self, offset: usize) -> Self {
        self.anc_data_offset = offset.max(MIN_HEADER_SIZE);
        self
    }

    /// Append a caption distribution unit carrying `cc_data` triplets.
    pub fn caption_unit(mut self, cc_data: &[u8]) -> Self {
        let sequence_counter = self.units.len() as u16;
        self.units.push(PendingUnit::Caption {
            cc_data: cc_data.to_vec(),
            sequence_counter,
        });
        self
    }

    /// Append an arbitrary unit with the given user data words.
    pub fn raw_unit(mut self, did: u8, sdid: u8, user_data: &[u8]) -> Self {
        self.units.push(PendingUnit::Raw {
            did,
            sdid,
            user_data: user_data.to_vec(),
        });
        self
    }

    /// Encode the payload.
    pub fn build(self) -> Result<Bytes, ProtocolError> {
        if self.units.len() > MAX_ANC_COUNT {
            return Err(ProtocolError::TooManyUnits(self.units.len()));
        }

        let mut writer = BitWriter::new();
        for unit in &self.units {
            match unit {
                PendingUnit::Caption {
                    cc_data,
                    sequence_counter,
                } => write_caption_unit(&mut writer, cc_data, *sequence_counter, self.frame_rate)?,
                PendingUnit::Raw {
                    did,
                    sdid,
                    user_data,
                } => {
                    if user_data.len() > u8::MAX as usize {
                        return Err(ProtocolError::UnitTooLong(user_data.len()));
                    }
                    let header = AncUnitHeader {
                        did: *did as u16,
                        sdid: *sdid as u16,
                        data_count: user_data.len() as u16,
                    };
                    header.write(&mut writer)?;
                    for &b in user_data {
                        write_word(&mut writer, b)?;
                    }
                }
            }
        }
        let anc_data = writer.finish();

        let mut buf = BytesMut::with_capacity(self.anc_data_offset + anc_data.len());
        buf.put_u16(self.extended_sequence_number);
        buf.put_u16((self.anc_data_offset - 2 + anc_data.len()).min(u16::MAX as usize) as u16);
        buf.put_u8(self.units.len() as u8);
        buf.put_u8((self.field as u8) << 6);
        buf.resize(self.anc_data_offset, 0);
        buf.put_slice(&anc_data);
        Ok(buf.freeze())
    }
}

impl Default for AncPayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
