//! Media transport client for a voice/video channel: the signalling FSM,
//! RTP packetization, encrypted UDP transport, and the media source
//! adapters that feed it.
//!
//! `config` and `main` are the only pieces that touch the filesystem or a
//! terminal; everything else here is pure logic and network I/O, usable
//! standalone from tests or another front end.

pub mod config;
pub mod crypto;
pub mod error;
pub mod nal;
pub mod pacer;
pub mod packetizer;
pub mod rtp;
pub mod source;
pub mod transport;
pub mod voice;

pub use error::{Result, VoiceError};
