//! Media source adapters (C13): turn a byte stream into the frame/access-unit
//! shapes the packetizers expect. This module only parses containers — it
//! never spawns an external transcoder; callers feed it whatever bytes an
//! external encoder process produces, over whatever channel they choose.

use crate::error::Result;
use crate::nal::NalParser;

/// Something that turns a raw byte stream into complete frames for a
/// packetizer, one `push` at a time. Restartable by construction — one
/// instance per media source.
pub trait FrameSource {
    type Frame;

    /// Feed the next chunk of bytes, returning any frames it completes.
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<Self::Frame>>;
}

/// Incremental Ogg page demuxer, producing complete Opus packets.
///
/// Ogg page layout: 4-byte capture pattern `OggS`, then a 23-byte header
/// (version, flags, granule position, serial, page number, CRC, segment
/// count), a segment table, then the page's data. A segment value of `0xFF`
/// means "more data for this packet follows in the next segment"; any other
/// value ends a packet.
#[derive(Default)]
pub struct OggDemuxer {
    buffer: Vec<u8>,
    carry: Vec<u8>,
}

const OGG_PAGE_HEADER_LEN: usize = 27;

impl OggDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_parse_page(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        if self.buffer.len() < OGG_PAGE_HEADER_LEN {
            return Ok(None);
        }
        if &self.buffer[0..4] != b"OggS" {
            return Err(crate::error::VoiceError::Source(
                "Ogg stream missing capture pattern".to_string(),
            ));
        }

        let segnum = self.buffer[26] as usize;
        let header_len = OGG_PAGE_HEADER_LEN + segnum;
        if self.buffer.len() < header_len {
            return Ok(None);
        }

        let segtable = self.buffer[OGG_PAGE_HEADER_LEN..header_len].to_vec();
        let data_len: usize = segtable.iter().map(|&b| b as usize).sum();
        let page_len = header_len + data_len;
        if self.buffer.len() < page_len {
            return Ok(None);
        }

        let data: Vec<u8> = self.buffer[header_len..page_len].to_vec();
        self.buffer.drain(..page_len);

        let mut packets = Vec::new();
        let mut offset = 0usize;
        let mut packet_len = 0usize;
        let mut partial = true;

        for seg in segtable {
            if seg == 0xFF {
                packet_len += 0xFF;
                partial = true;
            } else {
                packet_len += seg as usize;
                self.carry.extend_from_slice(&data[offset..offset + packet_len]);
                packets.push(std::mem::take(&mut self.carry));
                offset += packet_len;
                packet_len = 0;
                partial = false;
            }
        }

        if partial {
            self.carry.extend_from_slice(&data[offset..]);
        }

        Ok(Some(packets))
    }
}

impl FrameSource for OggDemuxer {
    type Frame = Vec<u8>;

    fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.buffer.extend_from_slice(chunk);
        let mut packets = Vec::new();

        while let Some(completed) = self.try_parse_page()? {
            packets.extend(completed);
        }

        Ok(packets)
    }
}

/// Thin `FrameSource` wrapper over `NalParser`, producing complete access
/// units from raw Annex-B bytes.
#[derive(Default)]
pub struct H264Source {
    parser: NalParser,
}

impl H264Source {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for H264Source {
    type Frame = Vec<Vec<u8>>;

    fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<Vec<u8>>>> {
        Ok(self.parser.push(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ogg_page(segtable: &[u8], data: &[u8]) -> Vec<u8> {
        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0); // version
        page.push(0); // flag
        page.extend_from_slice(&0u64.to_le_bytes()); // granule position
        page.extend_from_slice(&1u32.to_le_bytes()); // serial
        page.extend_from_slice(&0u32.to_le_bytes()); // page number
        page.extend_from_slice(&0u32.to_le_bytes()); // crc
        page.push(segtable.len() as u8);
        page.extend_from_slice(segtable);
        page.extend_from_slice(data);
        page
    }

    #[test]
    fn test_single_segment_page_yields_one_packet() {
        let page = ogg_page(&[5], b"hello");
        let mut demux = OggDemuxer::new();
        let packets = demux.push(&page).unwrap();
        assert_eq!(packets, vec![b"hello".to_vec()]);
    }

    #[test]
    fn test_two_packets_in_one_page() {
        let mut data = Vec::new();
        data.extend_from_slice(b"ab");
        data.extend_from_slice(b"cde");
        let page = ogg_page(&[2, 3], &data);

        let mut demux = OggDemuxer::new();
        let packets = demux.push(&page).unwrap();
        assert_eq!(packets, vec![b"ab".to_vec(), b"cde".to_vec()]);
    }

    #[test]
    fn test_packet_continues_across_0xff_segment() {
        // A 0xFF segment lacing value means the packet isn't done yet; a
        // following non-0xFF segment (here 10 bytes) completes it.
        let mut data = vec![0xAAu8; 0xFF];
        data.extend_from_slice(&[0xBBu8; 10]);
        let page = ogg_page(&[0xFF, 10], &data);

        let mut demux = OggDemuxer::new();
        let packets = demux.push(&page).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 0xFF + 10);
    }

    #[test]
    fn test_page_split_across_two_pushes() {
        let page = ogg_page(&[4], b"data");
        let (first, second) = page.split_at(20);

        let mut demux = OggDemuxer::new();
        assert!(demux.push(first).unwrap().is_empty());
        let packets = demux.push(second).unwrap();
        assert_eq!(packets, vec![b"data".to_vec()]);
    }

    #[test]
    fn test_wrong_capture_pattern_is_source_error() {
        let mut demux = OggDemuxer::new();
        let mut junk = vec![0u8; 30];
        junk[0..4].copy_from_slice(b"JUNK");
        assert!(demux.push(&junk).is_err());
    }

    #[test]
    fn test_h264_source_wraps_nal_parser() {
        let mut source = H264Source::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0, 0, 0, 1, 0x09, 0xF0]);
        stream.extend_from_slice(&[0, 0, 0, 1, 0x65, 0xAA]);
        stream.extend_from_slice(&[0, 0, 0, 1, 0x09, 0xF0]);

        let flushed = source.push(&stream).unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].len(), 1);
    }
}
