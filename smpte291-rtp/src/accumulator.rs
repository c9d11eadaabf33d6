//! Bounded buffer collecting the caption bytes of one frame.

use bytes::Bytes;

use crate::error::{DepayError, Result};

/// Caption bytes gathered for the frame identified by `timestamp`.
///
/// The buffer never grows past `capacity`; writes that would are rejected
/// whole.
#[derive(Debug)]
pub struct FrameAccumulator {
    timestamp: u32,
    buffer: Vec<u8>,
    capacity: usize,
}

impl FrameAccumulator {
    /// Allocate an accumulator for `timestamp` holding up to `capacity` bytes.
    pub fn try_new(timestamp: u32, capacity: usize) -> Result<Self> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| DepayError::AllocationFailure {
                requested: capacity,
                flushed: None,
            })?;

        Ok(Self {
            timestamp,
            buffer,
            capacity,
        })
    }

    /// RTP timestamp of the frame.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Space left before the capacity bound.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    /// Whether `len` more bytes would fit.
    pub fn fits(&self, len: usize) -> bool {
        len <= self.remaining()
    }

    /// Append `data`, or reject it without writing anything.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if !self.fits(data.len()) {
            return Err(DepayError::FrameBufferOverflow {
                attempted: self.buffer.len() + data.len(),
                capacity: self.capacity,
                partial: None,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Hand the collected bytes over; `None` when nothing was collected.
    pub fn finish(self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(Bytes::from(self.buffer))
        }
    }
}
