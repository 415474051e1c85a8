//! Voice/stream session: the websocket signalling FSM (C7), its stream
//! specialization (C8), and the wire format they speak.

pub mod fsm;
pub mod stream;
pub mod wire;

pub use fsm::VoiceSession;
pub use stream::StreamSession;

use crate::crypto::EncryptionMode;

/// Identity fields a session is constructed from: known up front, never
/// renegotiated for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub user_id: String,
    pub session_id: String,
    /// `guild_id` when this is a guild voice channel, `channel_id` for a DM
    /// call; `server_id` in the IDENTIFY frame is whichever is set.
    pub server_id: String,
    pub endpoint: String,
    pub token: String,
}

/// State negotiated over the signalling websocket after connection.
#[derive(Debug, Default, Clone)]
pub struct NegotiatedState {
    pub server_addr: Option<(String, u16)>,
    pub reflexive_addr: Option<(String, u16)>,
    pub audio_ssrc: Option<u32>,
    pub video_ssrc: Option<u32>,
    pub rtx_ssrc: Option<u32>,
    pub key: Option<[u8; 32]>,
    pub mode: Option<EncryptionMode>,
}

impl NegotiatedState {
    /// A session is ready iff endpoint/token (carried in `SessionIdentity`,
    /// always known) plus server address and audio SSRC are known and the
    /// key has been installed.
    pub fn is_ready(&self) -> bool {
        self.server_addr.is_some() && self.audio_ssrc.is_some() && self.key.is_some()
    }

    /// Install SSRCs from a READY event: `video = audio+1`, `rtx = audio+2`.
    pub fn set_audio_ssrc(&mut self, audio_ssrc: u32) {
        self.audio_ssrc = Some(audio_ssrc);
        self.video_ssrc = Some(audio_ssrc.wrapping_add(1));
        self.rtx_ssrc = Some(audio_ssrc.wrapping_add(2));
    }
}
