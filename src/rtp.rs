//! RTP header construction (RFC 3550) and the one-byte-header extension
//! profile the platform uses for its media packets.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

/// Fixed 12-byte RTP header, no CSRC list.
pub const HEADER_LEN: usize = 12;

/// One-byte-header extension magic (RFC 8285 ยง4.2).
pub const EXTENSION_PROFILE: [u8; 2] = [0xBE, 0xDE];

/// Audio payload type (Opus).
pub const PT_OPUS: u8 = 0x78;

/// Video payload type (H.264).
pub const PT_H264: u8 = 0x65;

/// A single one-byte-header extension entry.
pub struct Extension {
    pub id: u8,
    pub len: u8,
    pub value: u16,
}

/// The default extension the platform always sends when extensions are enabled.
pub const DEFAULT_EXTENSION: Extension = Extension {
    id: 5,
    len: 2,
    value: 0,
};

/// Build a 12-byte RTP header.
///
/// `sequence` and `timestamp` are the values to embed verbatim; the caller
/// (the owning packetizer) is responsible for incrementing sequence before
/// calling this, per the RTP packetizer state invariant.
pub fn build_header(payload_type: u8, extensions_enabled: bool, marker: bool, sequence: u16, timestamp: u32, ssrc: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];

    header[0] = 0x80 | ((extensions_enabled as u8) << 4);
    header[1] = payload_type & 0x7F;
    if marker {
        header[1] |= 0x80;
    }

    header[2..4].copy_from_slice(&sequence.to_be_bytes());
    header[4..8].copy_from_slice(&timestamp.to_be_bytes());
    header[8..12].copy_from_slice(&ssrc.to_be_bytes());

    header
}

/// Build the inline header-extension block emitted in the packet payload
/// (not the RTP header's own X bit, which only announces that one follows).
///
/// Entries use the one-byte header form: 4 bits id, 4 bits len-1, then
/// `len` bytes of value (padded/truncated to the declared value width).
pub fn build_extension_block(extensions: &[Extension]) -> Vec<u8> {
    let mut block = Vec::with_capacity(4 + extensions.len() * 4);
    block.extend_from_slice(&EXTENSION_PROFILE);
    block.extend_from_slice(&(extensions.len() as u16).to_be_bytes());

    for ext in extensions {
        let mut entry = [0u8; 4];
        entry[0] = ((ext.id & 0x0F) << 4) | ((ext.len.wrapping_sub(1)) & 0x0F);
        entry[1..3].copy_from_slice(&ext.value.to_be_bytes());
        block.extend_from_slice(&entry);
    }

    block
}

/// The extension block the platform sends by default: one entry, id=5 len=2 value=0.
pub fn default_extension_block() -> Vec<u8> {
    build_extension_block(&[DEFAULT_EXTENSION])
}
