//! Stream (screenshare/"Go Live") session: a `VoiceSession` plus the two
//! things specific to stream mode — `speaking` encodes as `2`/`0` instead of
//! `1`/`0`, and the stream carries a preview thumbnail uploaded over HTTP
//! rather than over the signalling socket.

use std::sync::Arc;

use base64::Engine;

use super::fsm::VoiceSession;
use super::SessionIdentity;
use crate::crypto::EncryptionMode;
use crate::error::{Result, VoiceError};

/// Wraps a `VoiceSession` negotiated for a stream (screenshare) rather than
/// a voice channel. Holds nothing the FSM doesn't already track; it exists
/// to carry the stream-specific wire encoding and the preview upload.
pub struct StreamSession {
    inner: Arc<VoiceSession>,
    stream_key: String,
}

impl StreamSession {
    pub async fn start(
        identity: SessionIdentity,
        mode: EncryptionMode,
        stream_key: String,
    ) -> Result<Self> {
        let inner = VoiceSession::start(identity, mode).await?;
        Ok(Self { inner, stream_key })
    }

    pub fn session(&self) -> &Arc<VoiceSession> {
        &self.inner
    }

    /// Stream sessions signal presence with wire value `2` (the platform's
    /// "soundshare" flag), not the `1` a voice session uses.
    pub async fn set_speaking(&self, speaking: bool) -> Result<()> {
        let ssrc = {
            let state = self.inner.snapshot();
            if !state.is_ready() {
                return Err(VoiceError::NotReady);
            }
            state.audio_ssrc.unwrap()
        };
        self.inner
            .send_stream_speaking_frame(if speaking { 2 } else { 0 }, ssrc)
            .await
    }

    /// Upload a preview thumbnail for the stream. Success is an HTTP 204;
    /// anything else is reported as a protocol error since this crate
    /// doesn't model the platform's HTTP error body shapes.
    pub async fn set_preview(&self, http: &reqwest::Client, token: &str, image: &[u8], mime: &str) -> Result<()> {
        if !self.inner.is_ready() {
            return Err(VoiceError::NotReady);
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let data_url = format!("data:{mime};base64,{encoded}");
        let url = format!("https://discord.com/api/v9/streams/{}/preview", self.stream_key);

        tracing::debug!(stream_key = %self.stream_key, bytes = image.len(), "uploading stream preview");

        let response = http
            .post(&url)
            .header("Authorization", token)
            .json(&serde_json::json!({ "thumbnail": data_url }))
            .send()
            .await
            .map_err(|err| VoiceError::Protocol(format!("preview upload failed: {err}")))?;

        if response.status().as_u16() != 204 {
            return Err(VoiceError::Protocol(format!(
                "preview upload returned unexpected status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_data_url_shape() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG");
        let data_url = format!("data:image/png;base64,{encoded}");
        assert!(data_url.starts_with("data:image/png;base64,"));
    }
}
