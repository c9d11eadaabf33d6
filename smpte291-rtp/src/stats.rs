//! Depacketizer counters.

use serde::Serialize;

/// Running counters for one depacketizer.
///
/// Serializable so the owner can export them alongside its own metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DepayStats {
    /// RTP packets handed to the depacketizer.
    pub packets: u64,
    /// Frames closed by a marker with caption bytes.
    pub frames_completed: u64,
    /// Frames finalized before their marker arrived: timestamp change,
    /// overflow, or explicit flush.
    pub frames_flushed: u64,
    /// Timestamp changes seen while a frame was still open.
    pub missed_markers: u64,
    /// Marker packets that closed a frame without caption bytes.
    pub empty_frames: u64,
    /// Caption bytes accepted into frames.
    pub caption_bytes: u64,
    /// Caption distribution units decoded.
    pub units_decoded: u64,
    /// Units skipped because they were not caption units.
    pub units_skipped: u64,
    pub malformed_packets: u64,
    pub overflows: u64,
    pub allocation_failures: u64,
}

impl DepayStats {
    /// Frames handed to the caller, by marker or by flush.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_completed + self.frames_flushed
    }

    /// Errors of any kind.
    pub fn error_count(&self) -> u64 {
        self.malformed_packets + self.overflows + self.allocation_failures
    }
}
