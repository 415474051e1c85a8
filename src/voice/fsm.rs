//! The voice/stream signalling FSM: one websocket connection driving the
//! client through `connecting -> identifying -> discovering -> selecting ->
//! ready`, after which it idles reading heartbeat acks and carrying
//! `set_speaking`/`set_video_state` requests out.
//!
//! A single task owns the websocket stream (mirroring the teacher's
//! `TrouterSocket`, which never splits its stream either); other tasks and
//! callers reach it through an unbounded command channel instead of sharing
//! the socket directly.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{wire, NegotiatedState, SessionIdentity};
use crate::crypto::{EncryptionMode, Encryptor};
use crate::error::{Result, VoiceError};
use crate::transport::Transport;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// The voice/stream session: connects the signalling websocket, negotiates
/// SSRCs, the UDP transport, and the session key, then stays alive as the
/// handle callers drive `set_speaking`/`set_video_state` through.
pub struct VoiceSession {
    identity: SessionIdentity,
    cmd_tx: mpsc::UnboundedSender<Message>,
    state: Mutex<NegotiatedState>,
    ready_rx: watch::Receiver<bool>,
    transport: OnceLock<Transport>,
    mode: EncryptionMode,
    last_heartbeat_sent: Mutex<Option<Instant>>,
}

impl VoiceSession {
    /// Connect, run the handshake to completion, and return once the
    /// session is ready to send media. Fails with whatever step of the
    /// handshake errored first; never blocks forever on a well-behaved
    /// server.
    pub async fn start(identity: SessionIdentity, mode: EncryptionMode) -> Result<Arc<Self>> {
        let url = format!("wss://{}/?v=7", identity.endpoint);
        tracing::info!(endpoint = %identity.endpoint, "connecting voice signalling socket");
        let (stream, _response) = tokio_tungstenite::connect_async(&url).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);

        let session = Arc::new(Self {
            identity: identity.clone(),
            cmd_tx,
            state: Mutex::new(NegotiatedState::default()),
            ready_rx,
            transport: OnceLock::new(),
            mode,
            last_heartbeat_sent: Mutex::new(None),
        });

        session.send_frame(&wire::identify(
            &identity.server_id,
            &identity.user_id,
            &identity.session_id,
            &identity.token,
        ))?;

        let worker = session.clone();
        tokio::spawn(async move { worker.run(stream, cmd_rx, ready_tx).await });

        session.wait_ready().await;
        Ok(session)
    }

    /// A read-only copy of the state negotiated so far.
    pub fn snapshot(&self) -> NegotiatedState {
        self.state.lock().unwrap().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().unwrap().is_ready()
    }

    /// Access the installed UDP transport, for packetizers to send through.
    /// `NotReady` until `SELECT_PROTOCOL_ACK` has been handled.
    pub fn transport(&self) -> Result<&Transport> {
        self.transport.get().ok_or(VoiceError::NotReady)
    }

    /// Send a `SPEAKING` update. `speaking` is the voice-session wire value
    /// (`1`/`0`); stream sessions encode their own `2`/`0` through
    /// `StreamSession`.
    pub async fn set_speaking(&self, speaking: bool) -> Result<()> {
        let ssrc = {
            let state = self.state.lock().unwrap();
            if !state.is_ready() {
                return Err(VoiceError::NotReady);
            }
            state.audio_ssrc.unwrap()
        };
        self.send_frame(&wire::speaking(u8::from(speaking), ssrc))
    }

    /// Send a `SPEAKING` frame with a raw wire value. `StreamSession` uses
    /// this to encode `2`/`0` instead of the `1`/`0` a voice session sends.
    pub(super) async fn send_stream_speaking_frame(&self, value: u8, ssrc: u32) -> Result<()> {
        self.send_frame(&wire::speaking(value, ssrc))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_video_state(
        &self,
        active: bool,
        width: u32,
        height: u32,
        framerate: u32,
        bitrate: u32,
    ) -> Result<()> {
        let (audio_ssrc, video_ssrc, rtx_ssrc) = {
            let state = self.state.lock().unwrap();
            if !state.is_ready() {
                return Err(VoiceError::NotReady);
            }
            (
                state.audio_ssrc.unwrap(),
                state.video_ssrc.unwrap(),
                state.rtx_ssrc.unwrap(),
            )
        };
        self.send_frame(&wire::video(
            active, audio_ssrc, video_ssrc, rtx_ssrc, width, height, framerate, bitrate,
        ))
    }

    async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    fn send_frame(&self, frame: &wire::Frame) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        self.cmd_tx
            .send(Message::Text(text))
            .map_err(|_| VoiceError::Protocol("signalling channel closed".to_string()))
    }

    async fn run(
        self: Arc<Self>,
        mut stream: WsStream,
        mut cmd_rx: mpsc::UnboundedReceiver<Message>,
        ready_tx: watch::Sender<bool>,
    ) {
        loop {
            tokio::select! {
                outbound = cmd_rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            if let Err(err) = stream.send(msg).await {
                                tracing::warn!(error = %err, "signalling send failed");
                                break;
                            }
                        }
                        None => break,
                    }
                }
                inbound = stream.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(err) = self.handle_text(&text, &ready_tx).await {
                                tracing::warn!(error = %err, "failed handling signalling frame");
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "signalling socket closed");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "signalling socket error");
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_text(self: &Arc<Self>, text: &str, ready_tx: &watch::Sender<bool>) -> Result<()> {
        let frame: wire::Frame = serde_json::from_str(text)?;
        let Some(event) = wire::parse_event(&frame) else {
            return Ok(());
        };

        match event {
            wire::Event::Hello { heartbeat_interval_ms } => {
                self.spawn_heartbeat(heartbeat_interval_ms);
            }
            wire::Event::Ready { ssrc, ip, port } => {
                self.on_ready(ssrc, ip, port).await?;
            }
            wire::Event::SelectProtocolAck { secret_key } => {
                self.on_select_protocol_ack(secret_key, ready_tx)?;
            }
            wire::Event::HeartbeatAck => {
                let sent_at = self.last_heartbeat_sent.lock().unwrap().take();
                if let Some(sent_at) = sent_at {
                    tracing::debug!(rtt_ms = sent_at.elapsed().as_secs_f64() * 1000.0, "heartbeat ack");
                } else {
                    tracing::debug!("heartbeat ack received with no matching send");
                }
            }
            wire::Event::Speaking => {}
            wire::Event::Other { op } => tracing::debug!(op, "unhandled signalling opcode"),
        }
        Ok(())
    }

    fn spawn_heartbeat(self: &Arc<Self>, interval_ms: u64) {
        let session = self.clone();
        let interval = Duration::from_millis(interval_ms);
        tokio::spawn(async move {
            // A plain sleep loop rather than `tokio::time::interval`, whose
            // first `tick()` resolves immediately instead of after one
            // `interval` — that would fire a heartbeat right at HELLO.
            loop {
                tokio::time::sleep(interval).await;
                *session.last_heartbeat_sent.lock().unwrap() = Some(Instant::now());
                tracing::debug!("sending heartbeat");
                if session.send_frame(&wire::heartbeat()).is_err() {
                    break;
                }
            }
        });
    }

    async fn on_ready(self: &Arc<Self>, ssrc: u32, ip: String, port: u16) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.set_audio_ssrc(ssrc);
            state.server_addr = Some((ip.clone(), port));
        }

        let remote: SocketAddr = format!("{ip}:{port}")
            .parse()
            .map_err(|_| VoiceError::Protocol(format!("invalid media server address {ip}:{port}")))?;
        let transport = Transport::connect(remote).await?;
        let reflexive = transport.discover(ssrc).await?;

        {
            let mut state = self.state.lock().unwrap();
            state.reflexive_addr = Some((reflexive.ip.clone(), reflexive.port));
        }

        self.transport
            .set(transport)
            .map_err(|_| VoiceError::Protocol("transport already installed".to_string()))?;

        self.send_frame(&wire::select_protocol(
            &reflexive.ip,
            reflexive.port,
            self.mode.wire_name(),
        ))?;

        // Video starts off by default; sent directly rather than through
        // `set_video_state` since this establishes the state rather than
        // reacting to a caller request, and runs before the session reaches
        // its public "ready" gate.
        let (video_ssrc, rtx_ssrc) = {
            let state = self.state.lock().unwrap();
            (state.video_ssrc.unwrap(), state.rtx_ssrc.unwrap())
        };
        self.send_frame(&wire::video(false, ssrc, video_ssrc, rtx_ssrc, 1280, 720, 30, 25 * 1024))
    }

    fn on_select_protocol_ack(&self, key: [u8; 32], ready_tx: &watch::Sender<bool>) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.key = Some(key);
            state.mode = Some(self.mode);
        }

        let transport = self
            .transport
            .get()
            .ok_or_else(|| VoiceError::Protocol("SELECT_PROTOCOL_ACK arrived before transport was ready".to_string()))?;
        transport.install_encryptor(Encryptor::new(key, self.mode));

        let _ = ready_tx.send(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harness() -> Arc<VoiceSession> {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (_ready_tx, ready_rx) = watch::channel(false);

        let session = Arc::new(VoiceSession {
            identity: SessionIdentity {
                user_id: "user-1".into(),
                session_id: "session-1".into(),
                server_id: "guild-1".into(),
                endpoint: "example.invalid".into(),
                token: "tok".into(),
            },
            cmd_tx,
            state: Mutex::new(NegotiatedState::default()),
            ready_rx,
            transport: OnceLock::new(),
            mode: EncryptionMode::Lite,
            last_heartbeat_sent: Mutex::new(None),
        });

        // Drain the command channel so sends from the operations under test
        // don't fail once the sender side is the only thing alive.
        tokio::spawn(async move { while cmd_rx.recv().await.is_some() {} });

        session
    }

    #[tokio::test]
    async fn test_operations_fail_before_ready() {
        let session = harness();
        assert!(matches!(session.set_speaking(true).await, Err(VoiceError::NotReady)));
        assert!(matches!(
            session.set_video_state(false, 0, 0, 0, 0).await,
            Err(VoiceError::NotReady)
        ));
        assert!(matches!(session.transport(), Err(VoiceError::NotReady)));
    }

    #[tokio::test]
    async fn test_set_speaking_succeeds_once_ready() {
        let session = harness();
        {
            let mut state = session.state.lock().unwrap();
            state.set_audio_ssrc(42);
            state.server_addr = Some(("1.2.3.4".into(), 1000));
            state.key = Some([0u8; 32]);
        }
        assert!(session.is_ready());
        assert!(session.set_speaking(true).await.is_ok());
        assert!(session.set_video_state(true, 1280, 720, 30, 2_000_000).await.is_ok());
    }

    #[test]
    fn test_identity_server_id_carries_through() {
        let identity = SessionIdentity {
            user_id: "u".into(),
            session_id: "s".into(),
            server_id: "g".into(),
            endpoint: "e".into(),
            token: "t".into(),
        };
        assert_eq!(identity.server_id, "g");
    }

    #[tokio::test]
    async fn test_heartbeat_ack_without_send_does_not_panic() {
        let session = harness();
        let (ready_tx, _ready_rx) = watch::channel(false);
        let frame = serde_json::to_string(&wire::Frame { op: wire::op::HEARTBEAT_ACK, d: serde_json::json!(null) }).unwrap();
        assert!(session.handle_text(&frame, &ready_tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_heartbeat_ack_after_send_clears_pending() {
        let session = harness();
        *session.last_heartbeat_sent.lock().unwrap() = Some(Instant::now());
        let (ready_tx, _ready_rx) = watch::channel(false);
        let frame = serde_json::to_string(&wire::Frame { op: wire::op::HEARTBEAT_ACK, d: serde_json::json!(null) }).unwrap();
        session.handle_text(&frame, &ready_tx).await.unwrap();
        assert!(session.last_heartbeat_sent.lock().unwrap().is_none());
    }
}
