//! Signalling wire format: opcodes and the JSON payload shapes for each.
//!
//! Kept free of any websocket or session-state concerns so the byte-level
//! contract can be tested in isolation.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod op {
    pub const IDENTIFY: u8 = 0;
    pub const SELECT_PROTOCOL: u8 = 1;
    pub const READY: u8 = 2;
    pub const HEARTBEAT: u8 = 3;
    pub const SELECT_PROTOCOL_ACK: u8 = 4;
    pub const SPEAKING: u8 = 5;
    pub const HEARTBEAT_ACK: u8 = 6;
    pub const HELLO: u8 = 8;
    pub const VIDEO: u8 = 12;
}

/// An outbound or inbound `{op, d}` signalling frame.
#[derive(Debug, Serialize, Deserialize)]
pub struct Frame {
    pub op: u8,
    pub d: Value,
}

pub fn identify(server_id: &str, user_id: &str, session_id: &str, token: &str) -> Frame {
    Frame {
        op: op::IDENTIFY,
        d: json!({
            "server_id": server_id,
            "user_id": user_id,
            "session_id": session_id,
            "token": token,
            "video": true,
            "streams": [{"type": "screen", "rid": "100", "quality": 100}],
        }),
    }
}

pub fn select_protocol(address: &str, port: u16, mode: &str) -> Frame {
    Frame {
        op: op::SELECT_PROTOCOL,
        d: json!({
            "protocol": "udp",
            "codecs": [
                {"name": "opus", "type": "audio", "priority": 1000, "payload_type": 120},
                {
                    "name": "H264", "type": "video", "priority": 1000,
                    "payload_type": 101, "rtx_payload_type": 102,
                    "encode": true, "decode": true,
                },
            ],
            "data": {"address": address, "port": port, "mode": mode},
        }),
    }
}

pub fn heartbeat() -> Frame {
    Frame {
        op: op::HEARTBEAT,
        d: json!(1337),
    }
}

/// `speaking` is the raw wire value: `1`/`0` for voice sessions, `2`/`0` for
/// stream sessions (the platform's "soundshare" flag).
pub fn speaking(speaking: u8, ssrc: u32) -> Frame {
    Frame {
        op: op::SPEAKING,
        d: json!({"speaking": speaking, "delay": 0, "ssrc": ssrc}),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn video(
    active: bool,
    audio_ssrc: u32,
    video_ssrc: u32,
    rtx_ssrc: u32,
    width: u32,
    height: u32,
    framerate: u32,
    bitrate: u32,
) -> Frame {
    Frame {
        op: op::VIDEO,
        d: json!({
            "audio_ssrc": audio_ssrc,
            "video_ssrc": video_ssrc,
            "rtx_ssrc": rtx_ssrc,
            "streams": [{
                "type": "video",
                "rid": "100",
                "ssrc": video_ssrc,
                "active": active,
                "quality": 100,
                "rtx_ssrc": rtx_ssrc,
                "max_bitrate": bitrate,
                "max_framerate": framerate,
                "max_resolution": {"type": "fixed", "width": width, "height": height},
            }],
        }),
    }
}

/// A typed view of an inbound frame, produced by the reader loop's
/// demultiplexer in place of the predicate-interceptor pattern.
#[derive(Debug, Clone)]
pub enum Event {
    Hello { heartbeat_interval_ms: u64 },
    Ready { ssrc: u32, ip: String, port: u16 },
    SelectProtocolAck { secret_key: [u8; 32] },
    HeartbeatAck,
    Speaking,
    Other { op: u8 },
}

pub fn parse_event(frame: &Frame) -> Option<Event> {
    match frame.op {
        op::HELLO => Some(Event::Hello {
            heartbeat_interval_ms: frame.d.get("heartbeat_interval")?.as_u64()?,
        }),
        op::READY => Some(Event::Ready {
            ssrc: frame.d.get("ssrc")?.as_u64()? as u32,
            ip: frame.d.get("ip")?.as_str()?.to_string(),
            port: frame.d.get("port")?.as_u64()? as u16,
        }),
        op::SELECT_PROTOCOL_ACK => {
            let bytes: Vec<u8> = serde_json::from_value(frame.d.get("secret_key")?.clone()).ok()?;
            let key: [u8; 32] = bytes.try_into().ok()?;
            Some(Event::SelectProtocolAck { secret_key: key })
        }
        op::HEARTBEAT_ACK => Some(Event::HeartbeatAck),
        op::SPEAKING => Some(Event::Speaking),
        other => Some(Event::Other { op: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_payload_shape() {
        let frame = identify("guild-1", "user-1", "session-1", "tok");
        assert_eq!(frame.op, op::IDENTIFY);
        assert_eq!(frame.d["server_id"], "guild-1");
        assert_eq!(frame.d["video"], true);
        assert_eq!(frame.d["streams"][0]["type"], "screen");
    }

    #[test]
    fn test_select_protocol_payload_shape() {
        let frame = select_protocol("1.2.3.4", 8080, "xsalsa20_poly1305_lite");
        assert_eq!(frame.d["data"]["port"], 8080);
        assert_eq!(frame.d["codecs"][0]["name"], "opus");
        assert_eq!(frame.d["codecs"][1]["rtx_payload_type"], 102);
    }

    #[test]
    fn test_speaking_voice_vs_stream_values() {
        assert_eq!(speaking(1, 5).d["speaking"], 1);
        assert_eq!(speaking(2, 5).d["speaking"], 2);
    }

    #[test]
    fn test_parse_ready_event() {
        let frame = Frame {
            op: op::READY,
            d: json!({"ssrc": 1000, "ip": "10.0.0.1", "port": 5555}),
        };
        match parse_event(&frame).unwrap() {
            Event::Ready { ssrc, ip, port } => {
                assert_eq!(ssrc, 1000);
                assert_eq!(ip, "10.0.0.1");
                assert_eq!(port, 5555);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_select_protocol_ack_key() {
        let key = vec![7u8; 32];
        let frame = Frame {
            op: op::SELECT_PROTOCOL_ACK,
            d: json!({"secret_key": key}),
        };
        match parse_event(&frame).unwrap() {
            Event::SelectProtocolAck { secret_key } => assert_eq!(secret_key, [7u8; 32]),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_op_is_other() {
        let frame = Frame { op: 19, d: json!(null) };
        assert!(matches!(parse_event(&frame), Some(Event::Other { op: 19 })));
    }
}
