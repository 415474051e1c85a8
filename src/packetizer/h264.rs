//! H.264 RTP packetizer: single-NAL packets below the MTU, FU-A
//! fragmentation (RFC 6184 ยง5.8) above it.

use super::{MediaSink, Packetizer, PacketizerState};
use crate::error::Result;
use crate::rtp;

/// Maximum single-NAL packet size before fragmentation kicks in.
pub const MTU: usize = 1200;

/// FU-A chunk size: MTU minus room for the extension block and FU headers.
pub const FU_CHUNK_SIZE: usize = MTU - 12;

const FU_A_INDICATOR_BASE: u8 = 0x1C;
const FU_START_BIT: u8 = 0x80;
const FU_END_BIT: u8 = 0x40;

pub struct H264Packetizer {
    state: PacketizerState,
    pub fps: u32,
}

impl H264Packetizer {
    pub fn new(ssrc: u32) -> Self {
        Self {
            state: PacketizerState::new(rtp::PT_H264, true, ssrc),
            fps: 30,
        }
    }

    fn send_single_nal(&mut self, nalu: &[u8], is_last_nalu: bool, sink: &dyn MediaSink) -> Result<()> {
        let sequence = self.state.next_sequence();
        let header = rtp::build_header(
            self.state.payload_type,
            self.state.extensions_enabled,
            is_last_nalu,
            sequence,
            self.state.timestamp(),
            self.state.ssrc,
        );

        let mut payload = rtp::default_extension_block();
        payload.extend_from_slice(nalu);

        let packet = sink.encrypt(&header, &payload);
        sink.send(&packet)
    }

    fn send_fragmented(&mut self, nalu: &[u8], is_last_nalu: bool, sink: &dyn MediaSink) -> Result<()> {
        let nal_header = nalu[0];
        let nal_type = nal_header & 0x1F;
        let f_nri = nal_header & 0xE0;
        let fu_indicator = FU_A_INDICATOR_BASE | f_nri;

        let chunks: Vec<&[u8]> = nalu[1..].chunks(FU_CHUNK_SIZE).collect();
        let chunk_count = chunks.len();

        for (j, chunk) in chunks.into_iter().enumerate() {
            let is_first = j == 0;
            let is_final_chunk = j == chunk_count - 1;

            let fu_header = if is_first {
                FU_START_BIT | nal_type
            } else if is_final_chunk {
                FU_END_BIT | nal_type
            } else {
                nal_type
            };

            let marker = is_final_chunk && is_last_nalu;

            let sequence = self.state.next_sequence();
            let header = rtp::build_header(
                self.state.payload_type,
                self.state.extensions_enabled,
                marker,
                sequence,
                self.state.timestamp(),
                self.state.ssrc,
            );

            let mut payload = rtp::default_extension_block();
            payload.push(fu_indicator);
            payload.push(fu_header);
            payload.extend_from_slice(chunk);

            let packet = sink.encrypt(&header, &payload);
            sink.send(&packet)?;
        }

        Ok(())
    }
}

impl Packetizer for H264Packetizer {
    type Frame = [Vec<u8>];

    fn send_frame(&mut self, access_unit: &[Vec<u8>], sink: &dyn MediaSink) -> Result<()> {
        let n = access_unit.len();

        for (i, nalu) in access_unit.iter().enumerate() {
            let is_last_nalu = i == n - 1;

            if nalu.len() <= MTU {
                self.send_single_nal(nalu, is_last_nalu, sink)?;
            } else {
                self.send_fragmented(nalu, is_last_nalu, sink)?;
            }
        }

        let advance = (90_000f64 / self.fps as f64).round() as u32;
        self.state.advance_timestamp(advance);
        Ok(())
    }
}
