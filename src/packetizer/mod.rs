//! The packetizer capability: two concrete implementors (Opus, H.264)
//! sharing one small state type and one trait, instead of a class
//! hierarchy over a "base packetizer".

pub mod h264;
pub mod opus;

use crate::error::Result;
use crate::rtp;

/// The capability a transport exposes to packetizers: send a finished
/// packet, and encrypt a header+payload pair under the session's mode.
///
/// Packetizers hold a non-owning reference to this rather than the
/// transport struct itself, breaking the transport/packetizer reference
/// cycle (transport owns packetizers; packetizers need transport's send
/// and encrypt behavior).
pub trait MediaSink: Send + Sync {
    fn send(&self, packet: &[u8]) -> Result<()>;
    fn encrypt(&self, header: &[u8; rtp::HEADER_LEN], plaintext: &[u8]) -> Vec<u8>;
}

/// Shared mutable state every packetizer owns: sequence number, timestamp,
/// payload type, SSRC, and whether it emits header extensions. Mutated
/// only by the owning packetizer, per the data model's invariant.
pub struct PacketizerState {
    pub payload_type: u8,
    pub extensions_enabled: bool,
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl PacketizerState {
    pub fn new(payload_type: u8, extensions_enabled: bool, ssrc: u32) -> Self {
        Self {
            payload_type,
            extensions_enabled,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Increment the sequence number before use; first emitted value is 1.
    pub fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

/// The capability both packetizers implement: take a fully-encoded frame
/// (or access unit) and drive it through the RTP header builder, the
/// encryptor, and the transport's send path.
pub trait Packetizer {
    /// The unit a caller hands to this packetizer: a raw Opus frame for
    /// audio, or an ordered access unit (NAL units) for video.
    type Frame;

    fn send_frame(&mut self, frame: &Self::Frame, sink: &dyn MediaSink) -> Result<()>;
}
