//! H.264 Annex-B byte-stream parsing: start-code scanning, access-unit
//! grouping, and RBSP extraction for SPS/SEI units.

/// NAL unit type, decoded from the low 5 bits of the NAL header byte.
pub mod nal_type {
    pub const CODED_SLICE_NON_IDR: u8 = 1;
    pub const CODED_SLICE_IDR: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const ACCESS_UNIT_DELIMITER: u8 = 9;
}

const EPB_PREFIX: [u8; 3] = [0x00, 0x00, 0x03];
const START_CODE_3: [u8; 3] = [0x00, 0x00, 0x01];

/// Remove emulation-prevention bytes from a NAL unit, producing its RBSP.
///
/// Scans for `00 00 03`; when found, keeps the `03` only if the following
/// byte is greater than `0x03` (i.e. the `03` really was inserted to break
/// up a start-code-like run, not a legitimate `00 00 03 0{0,1,2,3}` pattern
/// that still needs the escape removed).
pub fn extract_rbsp(nalu: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nalu.len());
    let mut rest = nalu;

    while let Some(pos) = find(rest, &EPB_PREFIX) {
        let next = rest.get(pos + 3).copied();
        let keep_to = match next {
            Some(b) if b <= 0x03 => pos + 2,
            _ => pos + 3,
        };
        out.extend_from_slice(&rest[..keep_to]);
        rest = &rest[pos + 3..];
    }

    out.extend_from_slice(rest);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Locate the next Annex-B start code in `buf`, returning its byte offset
/// and length (3 for `00 00 01`, 4 for `00 00 00 01`).
fn find_start_code(buf: &[u8]) -> Option<(usize, usize)> {
    let pos = find(buf, &START_CODE_3)?;
    if pos > 0 && buf[pos - 1] == 0 {
        Some((pos - 1, 4))
    } else {
        Some((pos, 3))
    }
}

/// Stateful Annex-B parser: accumulates bytes across chunks and emits
/// complete access units, flushed at each Access Unit Delimiter.
///
/// Restartable by construction — create a fresh parser per video source.
#[derive(Default)]
pub struct NalParser {
    buffer: Vec<u8>,
    access_unit: Vec<Vec<u8>>,
}

impl NalParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of raw Annex-B bytes, returning any access units
    /// completed as a result (normally zero or one, but a chunk spanning
    /// multiple AUDs can flush more than one).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<Vec<u8>>> {
        self.buffer.extend_from_slice(chunk);
        let mut flushed = Vec::new();

        loop {
            let Some((pos, code_len)) = find_start_code(&self.buffer) else {
                break;
            };

            let frame: Vec<u8> = self.buffer[..pos].to_vec();
            self.buffer.drain(..pos + code_len);

            if frame.is_empty() {
                continue;
            }

            let header = frame[0];
            let unit_type = header & 0x1F;

            if unit_type == nal_type::ACCESS_UNIT_DELIMITER {
                if !self.access_unit.is_empty() {
                    flushed.push(std::mem::take(&mut self.access_unit));
                }
            } else if unit_type == nal_type::SPS || unit_type == nal_type::SEI {
                self.access_unit.push(extract_rbsp(&frame));
            } else {
                self.access_unit.push(frame);
            }
        }

        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sc(bytes: &[u8]) -> Vec<u8> {
        let mut v = vec![0, 0, 0, 1];
        v.extend_from_slice(bytes);
        v
    }

    #[test]
    fn test_rbsp_extraction_strips_low_escape_byte() {
        // 00 00 03 00 -> the 03 is an escape, next byte (0x00) <= 0x03, drop it.
        let input = [0x00, 0x00, 0x03, 0x00, 0xFF];
        let out = extract_rbsp(&input);
        assert_eq!(out, vec![0x00, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn test_rbsp_extraction_keeps_non_escape_03() {
        // 00 00 03 FF -> next byte > 0x03, keep all three bytes of the prefix.
        let input = [0x00, 0x00, 0x03, 0xFF];
        let out = extract_rbsp(&input);
        assert_eq!(out, input);
    }

    #[test]
    fn test_rbsp_extraction_handles_multiple_escapes() {
        let input = [0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x02, 0xAB];
        let out = extract_rbsp(&input);
        assert_eq!(out, vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x02, 0xAB]);
    }

    #[test]
    fn test_single_access_unit_flushed_on_next_aud() {
        let mut parser = NalParser::new();
        let mut stream = Vec::new();
        stream.extend(sc(&[0x09, 0xF0])); // AUD
        stream.extend(sc(&[0x67, 0x42, 0x00, 0x1F])); // SPS-ish
        stream.extend(sc(&[0x65, 0xAA, 0xBB])); // IDR slice
        stream.extend(sc(&[0x09, 0xF0])); // next AUD -> flush

        let flushed = parser.push(&stream);
        assert_eq!(flushed.len(), 1);
        let au = &flushed[0];
        assert_eq!(au.len(), 2);
        assert_eq!(au[0][0] & 0x1F, nal_type::SPS);
        assert_eq!(au[1][0] & 0x1F, nal_type::CODED_SLICE_IDR);
    }

    #[test]
    fn test_split_mid_nal_across_two_chunks() {
        let mut parser = NalParser::new();
        let mut stream = Vec::new();
        stream.extend(sc(&[0x09, 0xF0]));
        stream.extend(sc(&[0x67, 0x42, 0x00, 0x1F, 0x00, 0x00, 0x03, 0x00]));
        stream.extend(sc(&[0x65, 0xAA]));
        stream.extend(sc(&[0x09, 0xF0]));

        let mid = stream.len() / 2;
        let (first, second) = stream.split_at(mid);

        let mut flushed = parser.push(first);
        flushed.extend(parser.push(second));

        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].len(), 2);
    }

    #[test]
    fn test_empty_candidate_between_adjacent_start_codes_is_discarded() {
        let mut parser = NalParser::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1]); // adjacent start codes, empty frame in between
        stream.extend(sc(&[0x65, 0x01]));
        stream.extend(sc(&[0x09, 0xF0]));

        let flushed = parser.push(&stream);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].len(), 1);
    }
}
