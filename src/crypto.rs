//! Packet encryption: XSalsa20-Poly1305 authenticated encryption under one
//! of three nonce disciplines, selected once per session.
//!
//! All three modes share the same AEAD; they differ only in how the
//! 24-byte nonce is constructed and how (or whether) it travels with the
//! packet. The RTP header is always sent in the clear, prefixed to the
//! ciphertext — it is not authenticated-additional-data.

use std::sync::atomic::{AtomicU32, Ordering};

use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

use crate::error::VoiceError;

/// Nonce discipline for a session's packet encryptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    /// Nonce = RTP header || 12 zero bytes. No suffix.
    Full,
    /// Nonce = 24 random bytes, appended after the ciphertext.
    Suffix,
    /// Nonce = big-endian u32 counter || 20 zero bytes; the 4-byte counter
    /// is appended after the ciphertext.
    Lite,
}

impl EncryptionMode {
    /// Parse the wire name used in `SELECT_PROTOCOL`'s `data.mode` field.
    pub fn parse(name: &str) -> Result<Self, VoiceError> {
        match name {
            "xsalsa20_poly1305" => Ok(Self::Full),
            "xsalsa20_poly1305_suffix" => Ok(Self::Suffix),
            "xsalsa20_poly1305_lite" => Ok(Self::Lite),
            other => Err(VoiceError::Config(format!("unsupported encryption mode: {other}"))),
        }
    }

    /// The wire name sent back in `SELECT_PROTOCOL`'s `data.mode` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Full => "xsalsa20_poly1305",
            Self::Suffix => "xsalsa20_poly1305_suffix",
            Self::Lite => "xsalsa20_poly1305_lite",
        }
    }
}

/// Holds the installed session key and the lite-mode nonce counter.
///
/// The nonce counter is an `AtomicU32` because pacer tasks for audio and
/// video share one encryptor and must increment it atomically; ordering
/// between the two sources is not guaranteed, only uniqueness of each
/// counter value.
pub struct Encryptor {
    key: [u8; 32],
    mode: EncryptionMode,
    nonce_counter: AtomicU32,
}

impl Encryptor {
    pub fn new(key: [u8; 32], mode: EncryptionMode) -> Self {
        Self {
            key,
            mode,
            nonce_counter: AtomicU32::new(0),
        }
    }

    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Encrypt `plaintext` under the session's mode, returning
    /// `header || ciphertext_with_tag || nonce_suffix?`.
    pub fn encrypt(&self, header: &[u8; crate::rtp::HEADER_LEN], plaintext: &[u8]) -> Vec<u8> {
        match self.mode {
            EncryptionMode::Full => self.encrypt_full(header, plaintext),
            EncryptionMode::Suffix => self.encrypt_suffix(header, plaintext),
            EncryptionMode::Lite => self.encrypt_lite(header, plaintext),
        }
    }

    fn cipher(&self) -> XSalsa20Poly1305 {
        XSalsa20Poly1305::new(Key::from_slice(&self.key))
    }

    fn encrypt_full(&self, header: &[u8; crate::rtp::HEADER_LEN], plaintext: &[u8]) -> Vec<u8> {
        let mut nonce_bytes = [0u8; 24];
        nonce_bytes[..12].copy_from_slice(header);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .expect("xsalsa20poly1305 encryption is infallible for well-formed input");

        let mut out = Vec::with_capacity(header.len() + ciphertext.len());
        out.extend_from_slice(header);
        out.extend_from_slice(&ciphertext);
        out
    }

    fn encrypt_suffix(&self, header: &[u8; crate::rtp::HEADER_LEN], plaintext: &[u8]) -> Vec<u8> {
        let mut nonce_bytes = [0u8; 24];
        getrandom::getrandom(&mut nonce_bytes).expect("system RNG unavailable");
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .expect("xsalsa20poly1305 encryption is infallible for well-formed input");

        let mut out = Vec::with_capacity(header.len() + ciphertext.len() + nonce_bytes.len());
        out.extend_from_slice(header);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&nonce_bytes);
        out
    }

    fn encrypt_lite(&self, header: &[u8; crate::rtp::HEADER_LEN], plaintext: &[u8]) -> Vec<u8> {
        let counter = self.nonce_counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

        let mut nonce_bytes = [0u8; 24];
        nonce_bytes[0..4].copy_from_slice(&counter.to_be_bytes());
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .expect("xsalsa20poly1305 encryption is infallible for well-formed input");

        let mut out = Vec::with_capacity(header.len() + ciphertext.len() + 4);
        out.extend_from_slice(header);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&counter.to_be_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_header() -> [u8; crate::rtp::HEADER_LEN] {
        [0u8; crate::rtp::HEADER_LEN]
    }

    #[test]
    fn test_parse_mode_roundtrip() {
        for mode in [EncryptionMode::Full, EncryptionMode::Suffix, EncryptionMode::Lite] {
            assert_eq!(EncryptionMode::parse(mode.wire_name()).unwrap(), mode);
        }
    }

    #[test]
    fn test_parse_unknown_mode_is_config_error() {
        assert!(matches!(EncryptionMode::parse("rot13"), Err(VoiceError::Config(_))));
    }

    #[test]
    fn test_full_mode_output_length() {
        let enc = Encryptor::new([0u8; 32], EncryptionMode::Full);
        let packet = enc.encrypt(&zero_header(), b"hello world");
        // header + ciphertext + 16-byte tag, no suffix
        assert_eq!(packet.len(), 12 + 11 + 16);
        assert_eq!(&packet[..12], &zero_header()[..]);
    }

    #[test]
    fn test_suffix_mode_appends_24_byte_nonce() {
        let enc = Encryptor::new([1u8; 32], EncryptionMode::Suffix);
        let packet = enc.encrypt(&zero_header(), b"frame");
        assert_eq!(packet.len(), 12 + 5 + 16 + 24);
    }

    #[test]
    fn test_lite_mode_nonce_suffix_after_three_sends() {
        let enc = Encryptor::new([0u8; 32], EncryptionMode::Lite);
        let mut last = Vec::new();
        for _ in 0..3 {
            last = enc.encrypt(&zero_header(), b"x");
        }
        let suffix = &last[last.len() - 4..];
        assert_eq!(suffix, &[0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_lite_mode_counter_wraps_mod_2_32() {
        let enc = Encryptor::new([0u8; 32], EncryptionMode::Lite);
        enc.nonce_counter.store(u32::MAX, Ordering::SeqCst);
        let packet = enc.encrypt(&zero_header(), b"x");
        let suffix = &packet[packet.len() - 4..];
        assert_eq!(suffix, &0u32.to_be_bytes());
    }

    #[test]
    fn test_modes_produce_different_ciphertext_for_same_plaintext() {
        let full = Encryptor::new([2u8; 32], EncryptionMode::Full);
        let suffix = Encryptor::new([2u8; 32], EncryptionMode::Suffix);
        let a = full.encrypt(&zero_header(), b"payload");
        let b = suffix.encrypt(&zero_header(), b"payload");
        assert_ne!(a, b);
    }
}
