//! SDP attribute handling and payload handler registration.
//!
//! Only `fmtp:` lines are looked at. Their parameters are kept verbatim;
//! the format check accepts every combination.

use crate::error::SdpError;

/// Encoding name in `a=rtpmap:<pt> smpte291/90000`.
pub const ENCODING_NAME: &str = "smpte291";

/// Media type of the produced stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Subtitle,
}

/// Codec of the produced frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    /// CEA-608/708 caption triplets.
    Eia608,
}

/// What a session needs to register this depacketizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerInfo {
    pub encoding_name: &'static str,
    pub media_kind: MediaKind,
    pub codec_id: CodecId,
}

/// Registration entry for the ST 291 caption depacketizer.
pub const HANDLER: HandlerInfo = HandlerInfo {
    encoding_name: ENCODING_NAME,
    media_kind: MediaKind::Subtitle,
    codec_id: CodecId::Eia608,
};

impl HandlerInfo {
    /// Whether an rtpmap encoding (e.g. `SMPTE291/90000`) selects this handler.
    pub fn matches(&self, rtpmap_encoding: &str) -> bool {
        let name = rtpmap_encoding.split('/').next().unwrap_or("").trim();
        name.eq_ignore_ascii_case(self.encoding_name)
    }
}

/// Parameters of an `fmtp:` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatParameters {
    pub payload_type: u8,
    /// `key=value` pairs in order of appearance.
    pub params: Vec<(String, String)>,
}

impl FormatParameters {
    /// Value of the first parameter named `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Result of handing one SDP attribute line to the depacketizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdpLine {
    /// Session-level line; retry once the stream is known.
    NotForStream,
    /// Attribute the depacketizer does not use.
    Ignored,
    /// `fmtp:` attribute, parsed and accepted.
    Format(FormatParameters),
}

/// Handle one attribute line (with or without the `a=` prefix).
pub fn handle_sdp_line(stream: Option<usize>, line: &str) -> Result<SdpLine, SdpError> {
    if stream.is_none() {
        return Ok(SdpLine::NotForStream);
    }

    let line = line.trim();
    let line = line.strip_prefix("a=").unwrap_or(line);
    match line.strip_prefix("fmtp:") {
        Some(value) => {
            let params = parse_fmtp(value)?;
            check_format(&params)?;
            Ok(SdpLine::Format(params))
        }
        None => Ok(SdpLine::Ignored),
    }
}

/// Parse `<pt> key=value; key=value` into [`FormatParameters`].
///
/// Entries without `=` become keys with an empty value.
pub fn parse_fmtp(value: &str) -> Result<FormatParameters, SdpError> {
    let value = value.trim_start();
    let (pt, rest) = match value.find(char::is_whitespace) {
        Some(pos) => (&value[..pos], &value[pos..]),
        None => (value, ""),
    };

    if pt.is_empty() {
        return Err(SdpError::MissingPayloadType(value.to_string()));
    }
    let payload_type = pt
        .parse::<u8>()
        .ok()
        .filter(|pt| *pt <= 127)
        .ok_or_else(|| SdpError::InvalidPayloadType(pt.to_string()))?;

    let params = rest
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect();

    Ok(FormatParameters {
        payload_type,
        params,
    })
}

/// Format check run after every `fmtp:` line. Accepts everything.
pub fn check_format(_params: &FormatParameters) -> Result<(), SdpError> {
    Ok(())
}
