//! Lockstep Peer Session
//!
//! Owns one side of a battle from seed negotiation to termination. After
//! negotiation three background tasks talk to the transport:
//!
//! - writer: drains the outgoing packet queue into the sink
//! - receive loop: answers pings, times pongs, forwards intents
//! - ping loop: sends a keep-alive ping every interval
//!
//! The simulation itself is only ever touched by `step`, which sends the
//! local intent for the next frame, waits for the remote intent for the same
//! frame and then ticks. A shared shutdown broadcast stops all three tasks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::game::events::BattleEvent;
use crate::game::field::Side;
use crate::game::input::{Intent, IntentLog};
use crate::game::state::SimState;
use crate::game::tick::{tick, SimConfig, TickResult};
use crate::network::negotiation::{NegotiatedSeed, NegotiationError, Negotiator, negotiate_with};
use crate::network::protocol::{Packet, PacketKind};
use crate::network::transport::{PacketSink, PacketSource, TransportError};

/// Unique session identifier.
pub type SessionId = Uuid;

/// Configuration for a peer session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Keep-alive ping period.
    pub ping_interval: Duration,
    /// Capacity of the outgoing and inbound queues.
    pub channel_capacity: usize,
    /// How long `step` waits for the remote intent.
    pub intent_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(1),
            channel_capacity: 64,
            intent_timeout: Duration::from_secs(10),
        }
    }
}

/// Session errors. All of them end the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Seed negotiation failed
    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    /// Transport failed after negotiation
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Negotiation packet after negotiation
    #[error("unexpected {0:?} packet")]
    UnexpectedPacket(PacketKind),

    /// Remote intent out of lockstep
    #[error("intent for tick {got}, expected {expected}")]
    IntentForWrongTick {
        /// Frame being stepped
        expected: u32,
        /// Frame the intent claimed
        got: u32,
    },

    /// Remote intent never arrived
    #[error("timed out waiting for intent for tick {for_tick}")]
    Timeout {
        /// Frame being stepped
        for_tick: u32,
    },

    /// Peer closed the channel
    #[error("peer disconnected")]
    Disconnected,
}

type Inbound = Result<(u32, Intent), SessionError>;

// =============================================================================
// PING TRACKING
// =============================================================================

/// Outstanding pings and the latest round-trip time.
#[derive(Debug, Default)]
struct PingTracker {
    next_id: u64,
    in_flight: BTreeMap<u64, Instant>,
    last_rtt: Option<Duration>,
}

impl PingTracker {
    /// Outstanding pings kept before the oldest is forgotten.
    const MAX_IN_FLIGHT: usize = 16;

    fn start(&mut self, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.insert(id, now);
        while self.in_flight.len() > Self::MAX_IN_FLIGHT {
            self.in_flight.pop_first();
        }
        id
    }

    fn complete(&mut self, id: u64, now: Instant) -> Option<Duration> {
        let sent = self.in_flight.remove(&id)?;
        let rtt = now.duration_since(sent);
        self.last_rtt = Some(rtt);
        Some(rtt)
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One peer's side of a lockstep battle.
pub struct PeerSession {
    id: SessionId,
    side: Side,
    seed: NegotiatedSeed,
    config: SessionConfig,
    sim_config: SimConfig,
    state: SimState,
    local_log: IntentLog,
    remote_log: IntentLog,
    outgoing: mpsc::Sender<Packet>,
    inbound: mpsc::Receiver<Inbound>,
    pings: Arc<Mutex<PingTracker>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    span: Span,
}

impl PeerSession {
    /// Negotiate a seed with a fresh nonce and start the session.
    pub async fn establish<Src, Snk>(
        side: Side,
        source: Src,
        sink: Snk,
        sim_config: SimConfig,
        config: SessionConfig,
    ) -> Result<Self, SessionError>
    where
        Src: PacketSource,
        Snk: PacketSink,
    {
        Self::establish_with(Negotiator::new(side), source, sink, sim_config, config).await
    }

    /// Negotiate with a prepared negotiator and start the session.
    ///
    /// No simulation state exists unless negotiation succeeds.
    pub async fn establish_with<Src, Snk>(
        negotiator: Negotiator,
        mut source: Src,
        mut sink: Snk,
        sim_config: SimConfig,
        config: SessionConfig,
    ) -> Result<Self, SessionError>
    where
        Src: PacketSource,
        Snk: PacketSink,
    {
        let id = Uuid::new_v4();
        let side = negotiator.side();
        let span = info_span!("session", %id, ?side);

        let seed = negotiate_with(negotiator, &mut source, &mut sink)
            .instrument(span.clone())
            .await?;

        let (outgoing, outgoing_rx) = mpsc::channel(config.channel_capacity);
        let (inbound_tx, inbound) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);
        let pings = Arc::new(Mutex::new(PingTracker::default()));

        let tasks = vec![
            tokio::spawn(
                writer_loop(sink, outgoing_rx, inbound_tx.clone(), shutdown_tx.subscribe())
                    .instrument(span.clone()),
            ),
            tokio::spawn(
                receive_loop(
                    source,
                    inbound_tx,
                    outgoing.clone(),
                    pings.clone(),
                    shutdown_tx.subscribe(),
                )
                .instrument(span.clone()),
            ),
            tokio::spawn(
                ping_loop(
                    outgoing.clone(),
                    pings.clone(),
                    config.ping_interval,
                    shutdown_tx.subscribe(),
                )
                .instrument(span.clone()),
            ),
        ];

        let state = SimState::new(seed.seed, &sim_config);
        span.in_scope(|| info!(seed = seed.seed, "Session started"));

        Ok(Self {
            id,
            side,
            seed,
            config,
            sim_config,
            state,
            local_log: IntentLog::new(side),
            remote_log: IntentLog::new(side.opponent()),
            outgoing,
            inbound,
            pings,
            shutdown_tx,
            tasks,
            span,
        })
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Our side.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Negotiated seed.
    pub fn seed(&self) -> &NegotiatedSeed {
        &self.seed
    }

    /// Live simulation state.
    pub fn state(&self) -> &SimState {
        &self.state
    }

    /// Independent copy of the simulation state for renderers and debuggers.
    pub fn snapshot(&self) -> SimState {
        self.state.clone()
    }

    /// Recorded intents as (local, remote).
    pub fn intent_logs(&self) -> (&IntentLog, &IntentLog) {
        (&self.local_log, &self.remote_log)
    }

    /// Latest measured round-trip time.
    pub async fn rtt(&self) -> Option<Duration> {
        self.pings.lock().await.last_rtt
    }

    /// Step one frame in lockstep with the peer.
    ///
    /// Once the battle is over no more intents are exchanged.
    pub async fn step(&mut self, local: Intent) -> Result<TickResult, SessionError> {
        if self.state.is_ended() {
            return Ok(tick(&mut self.state, [Intent::NONE; 2], &self.sim_config));
        }

        // The peer only ever sees defined bits
        let local = Intent::from_bits(local.bits());
        let for_tick = self.state.frame + 1;

        self.outgoing
            .send(Packet::Intent { for_tick, intent: local })
            .await
            .map_err(|_| SessionError::Disconnected)?;
        let remote = self.recv_intent(for_tick).await?;

        self.local_log.record(for_tick, local);
        self.remote_log.record(for_tick, remote);

        let mut intents = [Intent::NONE; 2];
        intents[self.side.index()] = local;
        intents[self.side.opponent().index()] = remote;

        let result = tick(&mut self.state, intents, &self.sim_config);

        if result.match_ended {
            self.span
                .in_scope(|| info!(frame = for_tick, winner = ?result.winner, "Battle ended"));
        }
        Ok(result)
    }

    /// Step `frames` frames, asking `script` for the local intent of each.
    pub async fn run_for<F>(&mut self, frames: u32, mut script: F) -> Result<Vec<BattleEvent>, SessionError>
    where
        F: FnMut(u32) -> Intent,
    {
        let mut events = Vec::new();
        for _ in 0..frames {
            let frame = self.state.frame + 1;
            let result = self.step(script(frame)).await?;
            events.extend(result.events);
            if result.match_ended {
                break;
            }
        }
        Ok(events)
    }

    async fn recv_intent(&mut self, for_tick: u32) -> Result<Intent, SessionError> {
        let received = tokio::time::timeout(self.config.intent_timeout, self.inbound.recv())
            .await
            .map_err(|_| SessionError::Timeout { for_tick })?;

        match received {
            Some(Ok((tick, intent))) if tick == for_tick => Ok(intent),
            Some(Ok((got, _))) => Err(SessionError::IntentForWrongTick {
                expected: for_tick,
                got,
            }),
            Some(Err(e)) => Err(e),
            None => Err(SessionError::Disconnected),
        }
    }

    /// Stop the background tasks, flushing queued packets first.
    pub async fn close(mut self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Session task failed: {}", e);
            }
        }
        self.span.in_scope(|| debug!("Session closed"));
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

// =============================================================================
// BACKGROUND TASKS
// =============================================================================

async fn writer_loop<Snk: PacketSink>(
    mut sink: Snk,
    mut outgoing: mpsc::Receiver<Packet>,
    inbound: mpsc::Sender<Inbound>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            packet = outgoing.recv() => {
                let Some(packet) = packet else { break };
                if let Err(e) = sink.send(packet).await {
                    error!("Send failed: {}", e);
                    let _ = inbound.send(Err(e.into())).await;
                    break;
                }
            }
            _ = shutdown.recv() => {
                outgoing.close();
                while let Some(packet) = outgoing.recv().await {
                    if sink.send(packet).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
}

async fn receive_loop<Src: PacketSource>(
    mut source: Src,
    inbound: mpsc::Sender<Inbound>,
    outgoing: mpsc::Sender<Packet>,
    pings: Arc<Mutex<PingTracker>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let received = tokio::select! {
            received = source.recv() => received,
            _ = shutdown.recv() => break,
        };

        let forwarded = match received {
            Ok(Some(Packet::Intent { for_tick, intent })) => inbound.send(Ok((for_tick, intent))).await,
            Ok(Some(Packet::Ping { id })) => {
                let _ = outgoing.send(Packet::Pong { id }).await;
                Ok(())
            }
            Ok(Some(Packet::Pong { id })) => {
                if let Some(rtt) = pings.lock().await.complete(id, Instant::now()) {
                    debug!(rtt_ms = rtt.as_millis() as u64, "Pong received");
                }
                Ok(())
            }
            Ok(Some(other)) => {
                warn!("Unexpected {:?} packet after negotiation", other.kind());
                let _ = inbound.send(Err(SessionError::UnexpectedPacket(other.kind()))).await;
                break;
            }
            Ok(None) => {
                debug!("Peer closed the channel");
                let _ = inbound.send(Err(SessionError::Disconnected)).await;
                break;
            }
            Err(e) => {
                error!("Receive failed: {}", e);
                let _ = inbound.send(Err(e.into())).await;
                break;
            }
        };

        if forwarded.is_err() {
            break;
        }
    }
}

async fn ping_loop(
    outgoing: mpsc::Sender<Packet>,
    pings: Arc<Mutex<PingTracker>>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let id = pings.lock().await.start(Instant::now());
                if outgoing.send(Packet::Ping { id }).await.is_err() {
                    break;
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
