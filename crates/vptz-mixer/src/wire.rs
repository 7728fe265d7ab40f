//! Inbound frame decoding for the line-oriented mixer protocol.
//!
//! Responses are `\r\n` terminated lines. An `XML <n>` line announces that
//! exactly `n` bytes of XML follow; a `TALLY OK <digits>` line carries a
//! tally push. Everything else is an acknowledgement or error line.

use crate::error::{MixerError, MixerResult};

/// A complete inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Xml(String),
    Tally(String),
    /// Any other response line (`FUNCTION OK`, `SUBSCRIBE OK`, errors).
    Response(String),
}

/// Frame size limit used by [`FrameDecoder::new`].
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Incremental decoder fed with raw socket reads.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    pending_xml: Option<usize>,
    limit: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that rejects XML bodies and lines longer than `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            pending_xml: None,
            limit,
        }
    }

    /// Append bytes read from the socket.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drop any partial frame, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pending_xml = None;
    }

    /// Decode the next complete frame, if buffered.
    ///
    /// A malformed line is consumed and reported as an error; decoding can
    /// continue with the next call. [`MixerError::FrameTooLarge`] leaves the
    /// stream out of sync and the caller should drop the connection.
    pub fn next_frame(&mut self) -> MixerResult<Option<Frame>> {
        loop {
            if let Some(len) = self.pending_xml {
                if self.buf.len() < len {
                    return Ok(None);
                }
                let body: Vec<u8> = self.buf.drain(..len).collect();
                self.pending_xml = None;
                let doc = String::from_utf8_lossy(&body).trim().to_string();
                return Ok(Some(Frame::Xml(doc)));
            }

            let Some(end) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.buf.len() > self.limit {
                    return Err(MixerError::FrameTooLarge {
                        len: self.buf.len(),
                        limit: self.limit,
                    });
                }
                return Ok(None);
            };
            let raw: Vec<u8> = self.buf.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw).trim_end().to_string();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("XML ") {
                let len = rest
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| MixerError::MalformedFrame(line.clone()))?;
                if len > self.limit {
                    return Err(MixerError::FrameTooLarge {
                        len,
                        limit: self.limit,
                    });
                }
                self.pending_xml = Some(len);
                continue;
            }
            if let Some(rest) = line.strip_prefix("TALLY OK ") {
                return Ok(Some(Frame::Tally(rest.trim().to_string())));
            }
            return Ok(Some(Frame::Response(line)));
        }
    }
}
