//! Opus audio packetizer: one RTP packet per already-encoded Opus frame.

use super::{MediaSink, Packetizer, PacketizerState};
use crate::error::Result;
use crate::rtp;

/// 48 kHz * 20ms = 960 samples per frame, fixed (see design notes on the
/// frame_size open question).
pub const FRAME_SIZE: u32 = 960;

pub struct OpusPacketizer {
    state: PacketizerState,
}

impl OpusPacketizer {
    pub fn new(ssrc: u32) -> Self {
        Self {
            state: PacketizerState::new(rtp::PT_OPUS, false, ssrc),
        }
    }
}

impl Packetizer for OpusPacketizer {
    type Frame = [u8];

    fn send_frame(&mut self, frame: &[u8], sink: &dyn MediaSink) -> Result<()> {
        let sequence = self.state.next_sequence();
        let header = rtp::build_header(
            self.state.payload_type,
            self.state.extensions_enabled,
            true,
            sequence,
            self.state.timestamp(),
            self.state.ssrc,
        );

        let packet = sink.encrypt(&header, frame);
        sink.send(&packet)?;

        self.state.advance_timestamp(FRAME_SIZE);
        Ok(())
    }
}
