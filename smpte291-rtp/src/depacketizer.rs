//! Frame reassembly across RTP packets.
//!
//! Packets of one video frame share an RTP timestamp and the last one
//! carries the marker bit. The depacketizer collects the caption bytes of
//! every packet of a frame and hands them over as one buffer:
//!
//! - `Idle`: no frame open. The next packet opens one for its timestamp.
//! - `Accumulating`: a frame is open for timestamp `T`. Packets with `T`
//!   append to it; a packet with another timestamp means the marker of `T`
//!   was lost, so `T` is flushed and a new frame is opened.
//!
//! The timestamp and marker are honored for every packet, decodable or not.
//! A unit that cannot be decoded ends decoding of its packet; the units
//! before it still count.

use bytes::Bytes;
use log::{debug, trace, warn};
use smpte291_protocol::{AncPayload, ProtocolError};

use crate::accumulator::FrameAccumulator;
use crate::config::DepayConfig;
use crate::error::{ConfigError, DepayError, Result, SdpError};
use crate::sdp::{self, FormatParameters, SdpLine};
use crate::stats::DepayStats;

/// Reassembly state.
#[derive(Debug)]
enum State {
    /// No frame open.
    Idle,
    /// Collecting the frame of the accumulator's timestamp.
    Accumulating(FrameAccumulator),
}

/// What became of the frame the packet belonged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// No marker yet; more packets expected.
    Pending,
    /// Marker seen, but the frame carried no caption bytes.
    Empty,
    /// Marker seen; the frame's caption bytes.
    Complete(Bytes),
}

/// Result of processing one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOutcome {
    /// Previous frame, finalized because this packet started a new one
    /// before its marker arrived. Only set when it held caption bytes.
    pub flushed: Option<Bytes>,
    /// Status of the frame this packet belongs to.
    pub status: FrameStatus,
}

impl PacketOutcome {
    /// Frame completed by this packet's marker, if any.
    pub fn complete(&self) -> Option<&Bytes> {
        match &self.status {
            FrameStatus::Complete(frame) => Some(frame),
            _ => None,
        }
    }

    /// Whether the packet's frame is still open.
    pub fn is_pending(&self) -> bool {
        self.status == FrameStatus::Pending
    }

    /// All frames produced by the packet, oldest first.
    pub fn into_frames(self) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(2);
        frames.extend(self.flushed);
        if let FrameStatus::Complete(frame) = self.status {
            frames.push(frame);
        }
        frames
    }
}

/// Caption bytes decoded from one packet.
struct DecodedPacket {
    captions: Vec<u8>,
    units_decoded: u64,
    units_skipped: u64,
    /// Set when a unit could not be decoded; later units were not read.
    error: Option<ProtocolError>,
}

/// Reassembles the caption bytes of one ST 291 RTP stream.
///
/// One instance per stream; it is not shared between streams or threads.
///
/// # Example
///
/// ```
/// use smpte291_protocol::AncPayloadBuilder;
/// use smpte291_rtp::{Depacketizer, FrameStatus};
///
/// let mut depay = Depacketizer::new();
/// let first = AncPayloadBuilder::new().caption_unit(&[0x80, 0x94, 0x2C]).build().unwrap();
/// let last = AncPayloadBuilder::new().caption_unit(&[0x80, 0x94, 0x25]).build().unwrap();
///
/// assert!(depay.process_packet(100, false, &first).unwrap().is_pending());
/// let outcome = depay.process_packet(100, true, &last).unwrap();
/// assert_eq!(
///     outcome.status,
///     FrameStatus::Complete(vec![0x80, 0x94, 0x2C, 0x80, 0x94, 0x25].into())
/// );
/// ```
#[derive(Debug)]
pub struct Depacketizer {
    config: DepayConfig,
    state: State,
    stats: DepayStats,
    format: Option<FormatParameters>,
}

impl Depacketizer {
    /// Create a depacketizer with the default configuration.
    pub fn new() -> Self {
        Self {
            config: DepayConfig::default(),
            state: State::Idle,
            stats: DepayStats::default(),
            format: None,
        }
    }

    /// Create a depacketizer with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails
    /// [`DepayConfig::validate`].
    pub fn with_config(config: DepayConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &DepayConfig {
        &self.config
    }

    pub fn stats(&self) -> &DepayStats {
        &self.stats
    }

    /// Parameters from the last `fmtp:` line, if any.
    pub fn format(&self) -> Option<&FormatParameters> {
        self.format.as_ref()
    }

    /// Whether no frame is open.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Timestamp of the open frame.
    pub fn current_timestamp(&self) -> Option<u32> {
        match &self.state {
            State::Accumulating(acc) => Some(acc.timestamp()),
            State::Idle => None,
        }
    }

    /// Caption bytes collected for the open frame.
    pub fn buffered_len(&self) -> usize {
        match &self.state {
            State::Accumulating(acc) => acc.len(),
            State::Idle => 0,
        }
    }

    /// Process one RTP packet.
    ///
    /// # Arguments
    ///
    /// * `timestamp` - RTP timestamp of the packet
    /// * `marker` - RTP marker bit (last packet of the frame)
    /// * `payload` - RTP payload, starting at the extended sequence number
    ///
    /// # Errors
    ///
    /// Every error carries the frames finalized on the way, see
    /// [`DepayError::into_frames`].
    ///
    /// - [`DepayError::Protocol`] if a unit is malformed. Caption bytes of
    ///   the units before it are kept and the marker still closes the frame.
    /// - [`DepayError::FrameBufferOverflow`] if the frame would exceed
    ///   `max_frame_bytes`; the packet is dropped, the open frame is returned
    ///   in `partial` and the depacketizer becomes idle.
    /// - [`DepayError::AllocationFailure`] if a new frame buffer cannot be
    ///   allocated; the packet is dropped and the depacketizer becomes idle.
    pub fn process_packet(
        &mut self,
        timestamp: u32,
        marker: bool,
        payload: &[u8],
    ) -> Result<PacketOutcome> {
        self.stats.packets += 1;

        let decoded = self.decode_packet(marker, payload);
        self.stats.units_decoded += decoded.units_decoded;
        self.stats.units_skipped += decoded.units_skipped;
        if let Some(e) = &decoded.error {
            self.stats.malformed_packets += 1;
            warn!(
                "Malformed ANC packet at timestamp {}: {}; keeping {} caption bytes",
                timestamp,
                e,
                decoded.captions.len()
            );
        }

        let flushed = self.close_stale_frame(timestamp);

        let capacity = self.config.max_frame_bytes;
        let attempted = self.buffered_len() + decoded.captions.len();
        if attempted > capacity {
            self.stats.overflows += 1;
            let partial = match flushed {
                Some(frame) => Some(frame),
                None => self.flush(),
            };
            warn!(
                "Dropping ANC packet at timestamp {}: {} caption bytes exceed frame capacity {}",
                timestamp, attempted, capacity
            );
            return Err(DepayError::FrameBufferOverflow {
                attempted,
                capacity,
                partial,
            });
        }

        if self.is_idle() {
            match FrameAccumulator::try_new(timestamp, capacity) {
                Ok(acc) => self.state = State::Accumulating(acc),
                Err(e) => {
                    self.stats.allocation_failures += 1;
                    warn!("Out of memory opening frame at timestamp {}: {}", timestamp, e);
                    return Err(DepayError::AllocationFailure {
                        requested: capacity,
                        flushed,
                    });
                }
            }
        }

        if let State::Accumulating(acc) = &mut self.state {
            acc.append(&decoded.captions)?;
            self.stats.caption_bytes += decoded.captions.len() as u64;
        }

        let status = if marker {
            match self.take_frame() {
                Some(frame) => {
                    self.stats.frames_completed += 1;
                    debug!("Frame at timestamp {} complete: {} bytes", timestamp, frame.len());
                    FrameStatus::Complete(frame)
                }
                None => {
                    self.stats.empty_frames += 1;
                    FrameStatus::Empty
                }
            }
        } else {
            FrameStatus::Pending
        };

        let outcome = PacketOutcome { flushed, status };
        match decoded.error {
            Some(source) => Err(DepayError::Protocol { source, outcome }),
            None => Ok(outcome),
        }
    }

    /// Finalize the open frame without waiting for its marker.
    ///
    /// For callers enforcing their own staleness timeout. Returns `None` if
    /// no frame is open or it holds no caption bytes.
    pub fn flush(&mut self) -> Option<Bytes> {
        let frame = self.take_frame();
        if frame.is_some() {
            self.stats.frames_flushed += 1;
        }
        frame
    }

    /// Drop the open frame, if any.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Handle an SDP attribute line for this stream.
    ///
    /// `stream` is `None` for session-level lines.
    pub fn handle_sdp_line(
        &mut self,
        stream: Option<usize>,
        line: &str,
    ) -> std::result::Result<SdpLine, SdpError> {
        let handled = sdp::handle_sdp_line(stream, line)?;
        if let SdpLine::Format(params) = &handled {
            self.format = Some(params.clone());
        }
        Ok(handled)
    }

    /// Flush the open frame if `timestamp` belongs to another one.
    fn close_stale_frame(&mut self, timestamp: u32) -> Option<Bytes> {
        let open = self.current_timestamp()?;
        if open == timestamp {
            return None;
        }

        self.stats.missed_markers += 1;
        warn!(
            "Missed RTP marker for frame at timestamp {}; flushing {} bytes",
            open,
            self.buffered_len()
        );
        self.flush()
    }

    fn take_frame(&mut self) -> Option<Bytes> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Accumulating(acc) => acc.finish(),
            State::Idle => None,
        }
    }

    fn decode_packet(&self, marker: bool, payload: &[u8]) -> DecodedPacket {
        let mut decoded = DecodedPacket {
            captions: Vec::new(),
            units_decoded: 0,
            units_skipped: 0,
            error: None,
        };

        let payload = match AncPayload::parse(payload, self.config.anc_data_offset) {
            Ok(payload) => payload,
            Err(e) => {
                decoded.error = Some(e);
                return decoded;
            }
        };
        trace!(
            "Anc: ext_seq={} length={},{} count={}, marker={}",
            payload.header.extended_sequence_number,
            payload.header.length,
            payload.anc_data.len(),
            payload.header.anc_count,
            marker
        );

        for unit in payload.units() {
            let unit = match unit {
                Ok(unit) => unit,
                Err(e) => {
                    decoded.error = Some(e);
                    break;
                }
            };
            trace!(
                "     did,sdid={:X},{:X} data_count={}",
                unit.header.did,
                unit.header.sdid,
                unit.header.data_count
            );
            match unit.cdp {
                Some(cdp) => {
                    if !cdp.is_well_formed() {
                        trace!(
                            "     unexpected CDP ids: identifier={:04X} ccdata_id={:02X}",
                            cdp.identifier,
                            cdp.ccdata_id
                        );
                    }
                    decoded.captions.extend_from_slice(&unit.captions);
                    decoded.units_decoded += 1;
                }
                None => decoded.units_skipped += 1,
            }
        }
        decoded
    }
}

impl Default for Depacketizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smpte291_protocol::AncPayloadBuilder;

    fn caption_packet(cc_data: &[u8]) -> Bytes {
        AncPayloadBuilder::new().caption_unit(cc_data).build().unwrap()
    }

    fn empty_packet() -> Bytes {
        AncPayloadBuilder::new().build().unwrap()
    }

    /// Caption packet cut inside its only unit.
    fn truncated_packet(cc_data: &[u8]) -> Vec<u8> {
        let mut packet = caption_packet(cc_data).to_vec();
        packet.truncate(20);
        packet
    }

    fn bounded(max_frame_bytes: usize) -> Depacketizer {
        Depacketizer::with_config(DepayConfig::with_max_frame_bytes(max_frame_bytes)).unwrap()
    }

    #[test]
    fn test_single_packet_frame() {
        let mut depay = Depacketizer::new();
        let outcome = depay
            .process_packet(100, true, &caption_packet(&[0x80, 0x94, 0x2C]))
            .unwrap();

        assert!(outcome.flushed.is_none());
        assert_eq!(outcome.complete().unwrap().as_ref(), &[0x80, 0x94, 0x2C]);
        assert!(depay.is_idle());
        assert_eq!(depay.stats().frames_completed, 1);
    }

    #[test]
    fn test_pending_until_marker() {
        let mut depay = Depacketizer::new();
        let outcome = depay.process_packet(7, false, &caption_packet(&[1, 2, 3])).unwrap();

        assert!(outcome.is_pending());
        assert_eq!(depay.current_timestamp(), Some(7));
        assert_eq!(depay.buffered_len(), 3);
    }

    #[test]
    fn test_marker_without_captions_is_empty() {
        let mut depay = Depacketizer::new();
        let outcome = depay.process_packet(1, true, &empty_packet()).unwrap();

        assert_eq!(outcome.status, FrameStatus::Empty);
        assert!(outcome.into_frames().is_empty());
        assert!(depay.is_idle());
        assert_eq!(depay.stats().empty_frames, 1);
    }

    #[test]
    fn test_non_caption_units_only() {
        let mut depay = Depacketizer::new();
        let payload = AncPayloadBuilder::new()
            .raw_unit(0x41, 0x05, &[9, 9, 9])
            .raw_unit(0x61, 0x02, &[1, 2, 3])
            .build()
            .unwrap();

        let outcome = depay.process_packet(1, true, &payload).unwrap();
        assert_eq!(outcome.status, FrameStatus::Empty);
        assert_eq!(depay.stats().units_skipped, 2);
        assert_eq!(depay.stats().units_decoded, 0);
    }

    #[test]
    fn test_missed_marker_flushes_previous() {
        let mut depay = Depacketizer::new();
        depay.process_packet(100, false, &caption_packet(&[1, 2, 3])).unwrap();

        let outcome = depay.process_packet(200, false, &caption_packet(&[4, 5, 6])).unwrap();
        assert_eq!(outcome.flushed.as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(outcome.is_pending());
        assert_eq!(depay.current_timestamp(), Some(200));
        assert_eq!(depay.stats().missed_markers, 1);
        assert_eq!(depay.stats().frames_flushed, 1);
    }

    #[test]
    fn test_missed_marker_on_empty_frame_emits_nothing() {
        let mut depay = Depacketizer::new();
        depay.process_packet(100, false, &empty_packet()).unwrap();

        let outcome = depay.process_packet(200, true, &caption_packet(&[4, 5, 6])).unwrap();
        assert!(outcome.flushed.is_none());
        assert_eq!(outcome.complete().unwrap().as_ref(), &[4, 5, 6]);
        assert_eq!(depay.stats().missed_markers, 1);
        assert_eq!(depay.stats().frames_flushed, 0);
    }

    #[test]
    fn test_missed_marker_then_marker_yields_two_frames() {
        let mut depay = Depacketizer::new();
        depay.process_packet(100, false, &caption_packet(&[1, 2, 3])).unwrap();

        let frames = depay
            .process_packet(200, true, &caption_packet(&[4, 5, 6]))
            .unwrap()
            .into_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), &[1, 2, 3]);
        assert_eq!(frames[1].as_ref(), &[4, 5, 6]);
    }

    #[test]
    fn test_same_timestamp_after_marker_opens_new_frame() {
        let mut depay = Depacketizer::new();
        depay.process_packet(5, true, &caption_packet(&[1, 2, 3])).unwrap();

        let outcome = depay.process_packet(5, true, &caption_packet(&[4, 5, 6])).unwrap();
        assert!(outcome.flushed.is_none());
        assert_eq!(outcome.complete().unwrap().as_ref(), &[4, 5, 6]);
    }

    #[test]
    fn test_malformed_packet_without_marker_keeps_frame_open() {
        let mut depay = Depacketizer::new();
        depay.process_packet(100, false, &caption_packet(&[1, 2, 3])).unwrap();

        let err = depay
            .process_packet(100, false, &truncated_packet(&[4, 5, 6]))
            .unwrap_err();
        match err {
            DepayError::Protocol { source, outcome } => {
                assert!(matches!(source, ProtocolError::MalformedAncillaryUnit { .. }));
                assert!(outcome.flushed.is_none());
                assert!(outcome.is_pending());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(depay.current_timestamp(), Some(100));
        assert_eq!(depay.buffered_len(), 3);
        assert_eq!(depay.stats().malformed_packets, 1);
    }

    #[test]
    fn test_malformed_packet_at_new_timestamp_flushes_previous() {
        let mut depay = Depacketizer::new();
        depay.process_packet(100, false, &caption_packet(&[1, 2, 3])).unwrap();

        let err = depay
            .process_packet(200, false, &truncated_packet(&[4, 5, 6]))
            .unwrap_err();
        match err {
            DepayError::Protocol { outcome, .. } => {
                assert_eq!(outcome.flushed.as_deref(), Some(&[1u8, 2, 3][..]));
                assert!(outcome.is_pending());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(depay.current_timestamp(), Some(200));
        assert_eq!(depay.buffered_len(), 0);
        assert_eq!(depay.stats().missed_markers, 1);
        assert_eq!(depay.stats().frames_flushed, 1);
    }

    #[test]
    fn test_malformed_marker_packet_closes_frame() {
        let mut depay = Depacketizer::new();
        depay.process_packet(100, false, &caption_packet(&[1, 2, 3])).unwrap();

        // Second unit cut short; the first one still counts
        let mut packet = AncPayloadBuilder::new()
            .caption_unit(&[4, 5, 6])
            .caption_unit(&[7, 8, 9])
            .build()
            .unwrap()
            .to_vec();
        packet.truncate(42);

        let err = depay.process_packet(100, true, &packet).unwrap_err();
        match err {
            DepayError::Protocol { source, outcome } => {
                assert!(matches!(
                    source,
                    ProtocolError::MalformedAncillaryUnit { unit: 1, .. }
                ));
                assert_eq!(outcome.complete().unwrap().as_ref(), &[1, 2, 3, 4, 5, 6]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(depay.is_idle());
        assert_eq!(depay.stats().frames_completed, 1);
        assert_eq!(depay.stats().units_decoded, 2);
    }

    #[test]
    fn test_short_payload_still_honors_marker() {
        let mut depay = Depacketizer::new();
        depay.process_packet(1, false, &caption_packet(&[1, 2, 3])).unwrap();

        let err = depay.process_packet(1, true, &[0u8; 4]).unwrap_err();
        assert_eq!(
            err,
            DepayError::Protocol {
                source: ProtocolError::PayloadTooShort {
                    expected: 12,
                    actual: 4
                },
                outcome: PacketOutcome {
                    flushed: None,
                    status: FrameStatus::Complete(Bytes::from_static(&[1, 2, 3])),
                },
            }
        );
        assert!(depay.is_idle());
    }

    #[test]
    fn test_overflow_finalizes_open_frame() {
        let mut depay = bounded(6);
        depay.process_packet(1, false, &caption_packet(&[1, 2, 3])).unwrap();
        depay.process_packet(1, false, &caption_packet(&[4, 5, 6])).unwrap();

        let err = depay.process_packet(1, true, &caption_packet(&[7, 8, 9])).unwrap_err();
        match err {
            DepayError::FrameBufferOverflow {
                attempted,
                capacity,
                partial,
            } => {
                assert_eq!(attempted, 9);
                assert_eq!(capacity, 6);
                assert_eq!(partial.unwrap().as_ref(), &[1, 2, 3, 4, 5, 6]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(depay.is_idle());
        assert_eq!(depay.stats().overflows, 1);
        assert_eq!(depay.stats().frames_flushed, 1);
    }

    #[test]
    fn test_overflow_on_new_timestamp_returns_previous_frame() {
        let mut depay = bounded(3);
        depay.process_packet(1, false, &caption_packet(&[1, 2, 3])).unwrap();

        let big = AncPayloadBuilder::new()
            .caption_unit(&[4, 5, 6])
            .caption_unit(&[7, 8, 9])
            .build()
            .unwrap();
        let err = depay.process_packet(2, false, &big).unwrap_err();
        match err {
            DepayError::FrameBufferOverflow { attempted, partial, .. } => {
                assert_eq!(attempted, 6);
                assert_eq!(partial.unwrap().as_ref(), &[1, 2, 3]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(depay.is_idle());
        assert_eq!(depay.stats().missed_markers, 1);
        assert_eq!(depay.stats().frames_flushed, 1);
        assert_eq!(depay.stats().frames_emitted(), 1);
    }

    #[test]
    fn test_allocation_failure_leaves_idle() {
        let mut depay = bounded(usize::MAX);

        let err = depay.process_packet(1, false, &caption_packet(&[1, 2, 3])).unwrap_err();
        assert_eq!(
            err,
            DepayError::AllocationFailure {
                requested: usize::MAX,
                flushed: None
            }
        );
        assert!(depay.is_idle());
        assert_eq!(depay.stats().allocation_failures, 1);
        assert_eq!(depay.stats().caption_bytes, 0);
    }

    #[test]
    fn test_allocation_failure_flushes_previous_frame() {
        let mut depay = Depacketizer::new();
        depay.process_packet(1, false, &caption_packet(&[1, 2, 3])).unwrap();

        // Make the next frame buffer impossible to allocate
        depay.config.max_frame_bytes = usize::MAX;
        let err = depay.process_packet(2, false, &caption_packet(&[4, 5, 6])).unwrap_err();
        assert_eq!(err.into_frames(), vec![Bytes::from_static(&[1, 2, 3])]);
        assert!(depay.is_idle());
        assert_eq!(depay.stats().missed_markers, 1);
        assert_eq!(depay.stats().frames_flushed, 1);
    }

    #[test]
    fn test_with_config_validates() {
        assert!(matches!(
            Depacketizer::with_config(DepayConfig::with_max_frame_bytes(0)),
            Err(ConfigError::Invalid(_))
        ));

        let short_offset = DepayConfig {
            anc_data_offset: 4,
            ..DepayConfig::default()
        };
        assert!(Depacketizer::with_config(short_offset).is_err());

        let depay = bounded(1024);
        assert_eq!(depay.config().max_frame_bytes, 1024);
        assert!(depay.is_idle());
    }

    #[test]
    fn test_flush_and_reset() {
        let mut depay = Depacketizer::new();
        depay.process_packet(1, false, &caption_packet(&[1, 2, 3])).unwrap();
        assert_eq!(depay.flush().unwrap().as_ref(), &[1, 2, 3]);
        assert!(depay.is_idle());
        assert!(depay.flush().is_none());

        depay.process_packet(2, false, &caption_packet(&[4, 5, 6])).unwrap();
        depay.reset();
        assert!(depay.is_idle());
        assert_eq!(depay.stats().frames_flushed, 1);
    }

    #[test]
    fn test_sdp_fmtp_is_recorded() {
        let mut depay = Depacketizer::new();
        assert_eq!(
            depay.handle_sdp_line(None, "fmtp:112 x=1").unwrap(),
            SdpLine::NotForStream
        );
        assert!(depay.format().is_none());

        depay.handle_sdp_line(Some(0), "fmtp:112 x=1").unwrap();
        assert_eq!(depay.format().unwrap().payload_type, 112);
    }
}
