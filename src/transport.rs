//! UDP transport: socket lifecycle, the platform's IP discovery handshake,
//! and the `MediaSink` capability packetizers send through.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use tokio::net::UdpSocket;

use crate::crypto::Encryptor;
use crate::error::{Result, VoiceError};
use crate::packetizer::MediaSink;
use crate::rtp;

const DISCOVERY_PACKET_LEN: usize = 74;
const DISCOVERY_REQUEST_TYPE: [u8; 2] = [0x00, 0x01];
const DISCOVERY_REQUEST_LEN_FIELD: [u8; 2] = [0x00, 0x46];
const DISCOVERY_RESPONSE_TYPE: [u8; 2] = [0x00, 0x02];

/// The caller's reflexive address, as observed by the media server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflexiveAddress {
    pub ip: String,
    pub port: u16,
}

/// Owns the UDP socket and the session's encryptor. Packetizers hold a
/// `&dyn MediaSink` into this rather than the struct itself, per the
/// transport/packetizer cycle resolution.
///
/// The encryptor is installed once, after `SELECT_PROTOCOL_ACK` delivers the
/// session key, and never replaced — `OnceLock` enforces that directly
/// rather than through caller discipline.
pub struct Transport {
    socket: Arc<UdpSocket>,
    encryptor: OnceLock<Encryptor>,
}

impl Transport {
    /// Bind an ephemeral local socket and connect it to the media server.
    /// The encryptor isn't known yet at this point in the FSM; install it
    /// with `install_encryptor` once `SELECT_PROTOCOL_ACK` arrives.
    pub async fn connect(remote_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(remote_addr).await?;
        tracing::info!(local = %socket.local_addr()?, remote = %remote_addr, "UDP transport connected");

        Ok(Self {
            socket: Arc::new(socket),
            encryptor: OnceLock::new(),
        })
    }

    /// Install the session's encryptor. Called once, after the secret key
    /// arrives over the signalling socket.
    pub fn install_encryptor(&self, encryptor: Encryptor) {
        if self.encryptor.set(encryptor).is_err() {
            tracing::warn!("encryptor already installed; ignoring duplicate install");
        }
    }

    /// Run the platform's IP discovery handshake (ยง4.6) and return the
    /// client's reflexive address as the server observed it.
    pub async fn discover(&self, audio_ssrc: u32) -> Result<ReflexiveAddress> {
        let mut request = [0u8; DISCOVERY_PACKET_LEN];
        request[0..2].copy_from_slice(&DISCOVERY_REQUEST_TYPE);
        request[2..4].copy_from_slice(&DISCOVERY_REQUEST_LEN_FIELD);
        request[4..8].copy_from_slice(&audio_ssrc.to_be_bytes());

        self.socket.send(&request).await?;
        tracing::debug!(ssrc = audio_ssrc, "sent IP discovery request");

        let mut response = [0u8; DISCOVERY_PACKET_LEN];
        let n = self.socket.recv(&mut response).await?;
        if n != DISCOVERY_PACKET_LEN {
            return Err(VoiceError::Protocol(format!(
                "IP discovery response had unexpected length {n}"
            )));
        }

        parse_discovery_response(&response)
    }

    /// Close the underlying socket by dropping it (tokio sockets have no
    /// explicit close; this exists so callers have a named teardown step).
    pub fn close(self) {
        drop(self);
    }
}

/// Parse a 74-byte IP discovery response per ยง4.6/ยง8 scenario 1.
fn parse_discovery_response(response: &[u8; DISCOVERY_PACKET_LEN]) -> Result<ReflexiveAddress> {
    if response[0..2] != DISCOVERY_RESPONSE_TYPE {
        return Err(VoiceError::Protocol(
            "IP discovery handshake type mismatch".to_string(),
        ));
    }

    let ip_region = &response[8..response.len() - 2];
    let ip_end = ip_region.iter().position(|&b| b == 0).unwrap_or(ip_region.len());
    let ip = String::from_utf8_lossy(&ip_region[..ip_end]).into_owned();

    let port_bytes = &response[response.len() - 2..];
    let port = u16::from_be_bytes([port_bytes[0], port_bytes[1]]);

    Ok(ReflexiveAddress { ip, port })
}

impl MediaSink for Transport {
    fn send(&self, packet: &[u8]) -> Result<()> {
        self.socket.try_send(packet)?;
        Ok(())
    }

    fn encrypt(&self, header: &[u8; rtp::HEADER_LEN], plaintext: &[u8]) -> Vec<u8> {
        self.encryptor
            .get()
            .expect("encrypt called before the session key was installed")
            .encrypt(header, plaintext)
    }
}
