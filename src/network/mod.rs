//! Network Layer
//!
//! Peer-to-peer plumbing around the simulation: packet codec, transports,
//! seed negotiation and the lockstep session.
//! This layer is **non-deterministic** - all battle logic runs through `game/`.

pub mod protocol;
pub mod transport;
pub mod negotiation;
pub mod session;

pub use protocol::{Packet, PacketKind, CodecError};
pub use transport::{
    PacketSink, PacketSource, TransportError,
    stream_transport, websocket_transport,
};
pub use negotiation::{NegotiatedSeed, NegotiationError, Negotiator, negotiate};
pub use session::{PeerSession, SessionConfig, SessionError, SessionId};
