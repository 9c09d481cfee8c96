//! Seed Negotiation
//!
//! Commit-reveal agreement on the battle seed:
//!
//! 1. each peer draws a 16-byte nonce and sends `SHA-256(domain ‖ nonce)`
//! 2. each peer waits for the other's commitment before revealing anything
//! 3. each peer sends its raw nonce
//! 4. each peer checks the received nonce against the received commitment
//! 5. the seed is derived from both nonces, offerer first
//!
//! `Negotiator` is the I/O-free state machine; `negotiate` drives it over a
//! transport. The channel is assumed reliable and ordered.

use rand::RngCore;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::core::hash::hash_with_domain;
use crate::core::rng::{derive_session_digest, derive_session_seed};
use crate::game::field::Side;
use crate::network::protocol::{Packet, PacketKind, COMMITMENT_SIZE, NONCE_SIZE};
use crate::network::transport::{PacketSink, PacketSource, TransportError};

/// Domain separator of nonce commitments.
pub const COMMIT_DOMAIN: &[u8] = b"DUEL_NONCE_COMMIT_V1";

/// Negotiation failures. All of them end the session.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Revealed nonce does not hash to the commitment
    #[error("peer nonce does not match its commitment {}", hex::encode(.commitment))]
    CommitmentMismatch {
        /// Commitment the peer sent
        commitment: [u8; COMMITMENT_SIZE],
    },

    /// A packet arrived out of order
    #[error("expected {expected:?} packet, got {got:?}")]
    UnexpectedPacket {
        /// Kind the protocol needed next
        expected: PacketKind,
        /// Kind that arrived
        got: PacketKind,
    },

    /// The protocol already produced a seed
    #[error("negotiation already complete")]
    AlreadyComplete,

    /// Peer closed the channel mid-protocol
    #[error("peer disconnected during negotiation")]
    Disconnected,

    /// Transport failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Commitment to a nonce.
pub fn commit(nonce: &[u8; NONCE_SIZE]) -> [u8; COMMITMENT_SIZE] {
    hash_with_domain(COMMIT_DOMAIN, nonce)
}

/// Whether `nonce` opens `commitment`.
pub fn verify_commitment(commitment: &[u8; COMMITMENT_SIZE], nonce: &[u8; NONCE_SIZE]) -> bool {
    commit(nonce) == *commitment
}

/// Result of a completed negotiation. Identical on both peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedSeed {
    /// Seed for the synchronized random source
    pub seed: u64,
    /// Full digest the seed was cut from
    pub digest: [u8; 32],
    /// Offerer's revealed nonce
    pub offerer_nonce: [u8; NONCE_SIZE],
    /// Answerer's revealed nonce
    pub answerer_nonce: [u8; NONCE_SIZE],
}

impl NegotiatedSeed {
    fn from_nonces(offerer_nonce: [u8; NONCE_SIZE], answerer_nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            seed: derive_session_seed(&offerer_nonce, &answerer_nonce),
            digest: derive_session_digest(&offerer_nonce, &answerer_nonce),
            offerer_nonce,
            answerer_nonce,
        }
    }
}

/// Where a negotiation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    /// Our commitment is out; waiting for the peer's
    AwaitingCommit,
    /// Our nonce is out; waiting for the peer's
    AwaitingReveal,
    /// Seed established
    Complete,
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// I/O-free commit-reveal state machine for one peer.
#[derive(Debug, Clone)]
pub struct Negotiator {
    side: Side,
    nonce: [u8; NONCE_SIZE],
    phase: NegotiationPhase,
    remote_commitment: Option<[u8; COMMITMENT_SIZE]>,
    result: Option<NegotiatedSeed>,
}

impl Negotiator {
    /// Start a negotiation with a fresh random nonce.
    pub fn new(side: Side) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self::with_nonce(side, nonce)
    }

    /// Start a negotiation with a chosen nonce.
    pub fn with_nonce(side: Side, nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            side,
            nonce,
            phase: NegotiationPhase::AwaitingCommit,
            remote_commitment: None,
            result: None,
        }
    }

    /// Our side.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Current phase.
    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    /// Seed, once complete.
    pub fn result(&self) -> Option<NegotiatedSeed> {
        self.result
    }

    /// First packet to send.
    pub fn commit_packet(&self) -> Packet {
        Packet::Commit {
            commitment: commit(&self.nonce),
        }
    }

    /// Take in the peer's commitment and return our reveal.
    pub fn receive_commit(&mut self, packet: Packet) -> Result<Packet, NegotiationError> {
        match (self.phase, packet) {
            (NegotiationPhase::AwaitingCommit, Packet::Commit { commitment }) => {
                self.remote_commitment = Some(commitment);
                self.phase = NegotiationPhase::AwaitingReveal;
                Ok(Packet::Reveal { nonce: self.nonce })
            }
            (NegotiationPhase::Complete, _) => Err(NegotiationError::AlreadyComplete),
            (phase, other) => Err(NegotiationError::UnexpectedPacket {
                expected: expected_kind(phase),
                got: other.kind(),
            }),
        }
    }

    /// Take in the peer's reveal, verify it and derive the seed.
    pub fn receive_reveal(&mut self, packet: Packet) -> Result<NegotiatedSeed, NegotiationError> {
        let (phase, remote_commitment) = (self.phase, self.remote_commitment);
        match (phase, remote_commitment, packet) {
            (NegotiationPhase::AwaitingReveal, Some(commitment), Packet::Reveal { nonce }) => {
                if !verify_commitment(&commitment, &nonce) {
                    return Err(NegotiationError::CommitmentMismatch { commitment });
                }

                let result = match self.side {
                    Side::Offerer => NegotiatedSeed::from_nonces(self.nonce, nonce),
                    Side::Answerer => NegotiatedSeed::from_nonces(nonce, self.nonce),
                };
                self.phase = NegotiationPhase::Complete;
                self.result = Some(result);
                Ok(result)
            }
            (NegotiationPhase::Complete, _, _) => Err(NegotiationError::AlreadyComplete),
            (phase, _, other) => Err(NegotiationError::UnexpectedPacket {
                expected: expected_kind(phase),
                got: other.kind(),
            }),
        }
    }
}

fn expected_kind(phase: NegotiationPhase) -> PacketKind {
    match phase {
        NegotiationPhase::AwaitingCommit => PacketKind::Commit,
        NegotiationPhase::AwaitingReveal | NegotiationPhase::Complete => PacketKind::Reveal,
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Run the protocol over a transport with a fresh nonce.
pub async fn negotiate<Src, Snk>(
    side: Side,
    source: &mut Src,
    sink: &mut Snk,
) -> Result<NegotiatedSeed, NegotiationError>
where
    Src: PacketSource,
    Snk: PacketSink,
{
    negotiate_with(Negotiator::new(side), source, sink).await
}

/// Run the protocol over a transport with a prepared negotiator.
///
/// Keep-alive pings from an eager peer are answered; pongs are ignored.
#[instrument(skip_all, fields(side = ?negotiator.side()))]
pub async fn negotiate_with<Src, Snk>(
    mut negotiator: Negotiator,
    source: &mut Src,
    sink: &mut Snk,
) -> Result<NegotiatedSeed, NegotiationError>
where
    Src: PacketSource,
    Snk: PacketSink,
{
    if negotiator.phase() == NegotiationPhase::Complete {
        return Err(NegotiationError::AlreadyComplete);
    }

    let commit_packet = negotiator.commit_packet();
    sink.send(commit_packet).await?;
    debug!("Commitment sent");

    let remote_commit = next_protocol_packet(source, sink).await?;
    let reveal = negotiator.receive_commit(remote_commit)?;
    sink.send(reveal).await?;
    debug!("Nonce revealed");

    let remote_reveal = next_protocol_packet(source, sink).await?;
    let result = negotiator.receive_reveal(remote_reveal)?;

    info!(seed_digest = %hex::encode(&result.digest[..8]), "Seed negotiated");
    Ok(result)
}

async fn next_protocol_packet<Src, Snk>(source: &mut Src, sink: &mut Snk) -> Result<Packet, NegotiationError>
where
    Src: PacketSource,
    Snk: PacketSink,
{
    loop {
        match source.recv().await? {
            Some(Packet::Ping { id }) => sink.send(Packet::Pong { id }).await?,
            Some(Packet::Pong { .. }) => {}
            Some(packet) => return Ok(packet),
            None => return Err(NegotiationError::Disconnected),
        }
    }
}
