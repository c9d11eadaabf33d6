//! RTP depacketizer for SMPTE ST 291 closed captions.
//!
//! Turns a stream of RTP packets carrying ST 291 ancillary data into one
//! buffer of CEA-708 `cc_data` triplets per video frame. Bitstream decoding
//! is done by [`smpte291_protocol`]; this crate adds frame reassembly,
//! configuration and the glue a streaming session needs.
//!
//! # Usage
//!
//! The session owns one [`Depacketizer`] per stream and hands it every packet
//! with the RTP timestamp and marker bit:
//!
//! ```rust
//! use smpte291_protocol::AncPayloadBuilder;
//! use smpte291_rtp::{Depacketizer, DepayConfig};
//!
//! let config = DepayConfig::from_toml_str("max_frame_bytes = 1024").unwrap();
//! let mut depay = Depacketizer::with_config(config).unwrap();
//!
//! let payload = AncPayloadBuilder::new()
//!     .caption_unit(&[0xFC, 0x94, 0x2C])
//!     .build()
//!     .unwrap();
//!
//! for frame in depay.process_packet(3000, true, &payload).unwrap().into_frames() {
//!     assert_eq!(&frame[..], &[0xFC, 0x94, 0x2C]);
//! }
//! ```
//!
//! Diagnostics go through the `log` facade: per-packet and per-unit detail
//! at `trace`, completed frames at `debug`, dropped data at `warn`.

pub mod accumulator;
pub mod config;
pub mod depacketizer;
pub mod error;
pub mod sdp;
pub mod stats;

pub use config::{DepayConfig, DEFAULT_MAX_FRAME_BYTES};
pub use depacketizer::{Depacketizer, FrameStatus, PacketOutcome};
pub use error::{ConfigError, DepayError, Result, SdpError};
pub use sdp::{FormatParameters, HandlerInfo, SdpLine, HANDLER};
pub use stats::DepayStats;
