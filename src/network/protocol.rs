//! Protocol Packets
//!
//! Wire format for peer-to-peer communication. Every packet is one leading
//! tag byte followed by the fixed-size little-endian fields of its kind:
//!
//! ```text
//! Ping   = 0  [id: u64]
//! Pong   = 1  [id: u64]
//! Commit = 2  [commitment: 32 bytes]
//! Reveal = 3  [nonce: 16 bytes]
//! Intent = 4  [for_tick: u32][intent: u16]
//! ```

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::input::Intent;

/// Size of a nonce commitment.
pub const COMMITMENT_SIZE: usize = 32;

/// Size of a negotiation nonce.
pub const NONCE_SIZE: usize = 16;

/// Largest encoded packet (tag + commitment).
pub const MAX_PACKET_SIZE: usize = 1 + COMMITMENT_SIZE;

/// Packet decoding errors. All of them are fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Zero-length buffer
    #[error("empty packet")]
    Empty,

    /// Tag byte outside the known set
    #[error("unknown packet tag {0:#04x}")]
    UnknownPacket(u8),

    /// Fewer bytes than the kind's fixed layout
    #[error("truncated {kind:?} packet: expected {expected} body bytes, got {actual}")]
    Truncated {
        /// Packet kind
        kind: PacketKind,
        /// Body bytes the layout requires
        expected: usize,
        /// Body bytes present
        actual: usize,
    },

    /// More bytes than the kind's fixed layout
    #[error("oversized {kind:?} packet: expected {expected} body bytes, got {actual}")]
    Oversized {
        /// Packet kind
        kind: PacketKind,
        /// Body bytes the layout requires
        expected: usize,
        /// Body bytes present
        actual: usize,
    },
}

// =============================================================================
// PACKET KINDS
// =============================================================================

/// Tag byte of each packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketKind {
    /// Keep-alive request
    Ping = 0,
    /// Keep-alive reply
    Pong = 1,
    /// Nonce commitment
    Commit = 2,
    /// Nonce reveal
    Reveal = 3,
    /// Per-tick intent
    Intent = 4,
}

impl PacketKind {
    /// Parse a tag byte.
    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(PacketKind::Ping),
            1 => Ok(PacketKind::Pong),
            2 => Ok(PacketKind::Commit),
            3 => Ok(PacketKind::Reveal),
            4 => Ok(PacketKind::Intent),
            other => Err(CodecError::UnknownPacket(other)),
        }
    }

    /// Tag byte.
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Fixed body length following the tag.
    pub fn body_len(self) -> usize {
        match self {
            PacketKind::Ping | PacketKind::Pong => 8,
            PacketKind::Commit => COMMITMENT_SIZE,
            PacketKind::Reveal => NONCE_SIZE,
            PacketKind::Intent => 4 + Intent::SIZE,
        }
    }
}

// =============================================================================
// PACKETS
// =============================================================================

/// A decoded wire packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    /// Keep-alive request
    Ping {
        /// Echoed back in the pong
        id: u64,
    },
    /// Keep-alive reply
    Pong {
        /// Id of the ping being answered
        id: u64,
    },
    /// Hash of the sender's nonce
    Commit {
        /// `SHA-256(domain ‖ nonce)`
        commitment: [u8; COMMITMENT_SIZE],
    },
    /// The sender's raw nonce
    Reveal {
        /// Nonce matching the earlier commitment
        nonce: [u8; NONCE_SIZE],
    },
    /// The sender's intent for one tick
    Intent {
        /// Tick the intent applies to
        for_tick: u32,
        /// Held buttons
        intent: Intent,
    },
}

impl Packet {
    /// Kind of this packet.
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Ping { .. } => PacketKind::Ping,
            Packet::Pong { .. } => PacketKind::Pong,
            Packet::Commit { .. } => PacketKind::Commit,
            Packet::Reveal { .. } => PacketKind::Reveal,
            Packet::Intent { .. } => PacketKind::Intent,
        }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        1 + self.kind().body_len()
    }

    /// Append the encoding to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.kind().tag());
        match self {
            Packet::Ping { id } | Packet::Pong { id } => buf.extend_from_slice(&id.to_le_bytes()),
            Packet::Commit { commitment } => buf.extend_from_slice(commitment),
            Packet::Reveal { nonce } => buf.extend_from_slice(nonce),
            Packet::Intent { for_tick, intent } => {
                buf.extend_from_slice(&for_tick.to_le_bytes());
                buf.extend_from_slice(&intent.bits().to_le_bytes());
            }
        }
    }

    /// Encode to a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode exactly one packet.
    ///
    /// The buffer must hold the tag and the kind's body, nothing more.
    /// Undefined intent bits are dropped.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (&tag, body) = bytes.split_first().ok_or(CodecError::Empty)?;
        let kind = PacketKind::from_tag(tag)?;
        Self::decode_body(kind, body)
    }

    /// Decode a body whose tag was already read.
    pub fn decode_body(kind: PacketKind, body: &[u8]) -> Result<Self, CodecError> {
        let expected = kind.body_len();
        if body.len() < expected {
            return Err(CodecError::Truncated {
                kind,
                expected,
                actual: body.len(),
            });
        }
        if body.len() > expected {
            return Err(CodecError::Oversized {
                kind,
                expected,
                actual: body.len(),
            });
        }

        let packet = match kind {
            PacketKind::Ping => Packet::Ping { id: read_u64(body) },
            PacketKind::Pong => Packet::Pong { id: read_u64(body) },
            PacketKind::Commit => {
                let mut commitment = [0u8; COMMITMENT_SIZE];
                commitment.copy_from_slice(body);
                Packet::Commit { commitment }
            }
            PacketKind::Reveal => {
                let mut nonce = [0u8; NONCE_SIZE];
                nonce.copy_from_slice(body);
                Packet::Reveal { nonce }
            }
            PacketKind::Intent => {
                let for_tick = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                let bits = u16::from_le_bytes([body[4], body[5]]);
                Packet::Intent {
                    for_tick,
                    intent: Intent::from_bits(bits),
                }
            }
        };
        Ok(packet)
    }

    /// Render as JSON for debug logs.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn read_u64(body: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&body[..8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ping_layout() {
        let bytes = Packet::Ping { id: 0x0102030405060708 }.encode();
        assert_eq!(bytes, vec![0, 8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_intent_layout() {
        let packet = Packet::Intent {
            for_tick: 0x0000_0102,
            intent: Intent(Intent::UP | Intent::CHARGE),
        };
        assert_eq!(packet.encode(), vec![4, 0x02, 0x01, 0, 0, 0x01, 0x01]);
    }

    #[test]
    fn test_commit_and_reveal_sizes() {
        assert_eq!(Packet::Commit { commitment: [7; 32] }.encode().len(), 33);
        assert_eq!(Packet::Reveal { nonce: [9; 16] }.encode().len(), 17);
        assert_eq!(MAX_PACKET_SIZE, 33);
    }

    #[test]
    fn test_decode_examples() {
        let packets = [
            Packet::Pong { id: 42 },
            Packet::Commit { commitment: [0xab; 32] },
            Packet::Reveal { nonce: [0x11; 16] },
            Packet::Intent { for_tick: 99, intent: Intent(Intent::LEFT) },
        ];
        for packet in packets {
            assert_eq!(Packet::decode(&packet.encode()), Ok(packet));
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(Packet::decode(&[5, 0, 0]), Err(CodecError::UnknownPacket(5)));
        assert_eq!(Packet::decode(&[0xff]), Err(CodecError::UnknownPacket(0xff)));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(Packet::decode(&[]), Err(CodecError::Empty));
    }

    #[test]
    fn test_truncated_rejected() {
        let mut bytes = Packet::Ping { id: 1 }.encode();
        bytes.pop();
        assert_eq!(
            Packet::decode(&bytes),
            Err(CodecError::Truncated { kind: PacketKind::Ping, expected: 8, actual: 7 })
        );
    }

    #[test]
    fn test_oversized_rejected() {
        let mut bytes = Packet::Reveal { nonce: [0; 16] }.encode();
        bytes.push(0);
        assert!(matches!(Packet::decode(&bytes), Err(CodecError::Oversized { .. })));
    }

    #[test]
    fn test_undefined_intent_bits_dropped() {
        let decoded = Packet::decode(&[4, 1, 0, 0, 0, 0xff, 0xff]).unwrap();
        assert_eq!(
            decoded,
            Packet::Intent { for_tick: 1, intent: Intent(Intent::ALL_BITS) }
        );
    }

    #[test]
    fn test_packet_json_for_logs() {
        let json = Packet::Ping { id: 3 }.to_json().unwrap();
        assert!(json.contains("Ping"));
    }

    proptest! {
        #[test]
        fn test_arbitrary_bytes_dont_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = Packet::decode(&bytes);
        }

        #[test]
        fn test_intent_packets_roundtrip(for_tick in any::<u32>(), bits in 0u16..=Intent::ALL_BITS) {
            let packet = Packet::Intent { for_tick, intent: Intent(bits) };
            let bytes = packet.encode();
            prop_assert_eq!(bytes.len(), packet.encoded_len());
            prop_assert_eq!(Packet::decode(&bytes), Ok(packet));
        }

        #[test]
        fn test_decoded_packets_reencode_identically(bytes in prop::collection::vec(any::<u8>(), 0..40)) {
            if let Ok(packet) = Packet::decode(&bytes) {
                if let Packet::Intent { .. } = packet {
                    // Undefined intent bits do not survive
                    prop_assert_eq!(packet.encoded_len(), bytes.len());
                } else {
                    prop_assert_eq!(packet.encode(), bytes);
                }
            }
        }
    }
}
