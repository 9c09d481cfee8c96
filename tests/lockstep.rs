//! End-to-end lockstep tests
//!
//! Two peers negotiate a seed, step 100 frames with the same intents and
//! must end with byte-identical serialized state.

use duel_core::game::field::Side;
use duel_core::game::input::Intent;
use duel_core::game::state::SimState;
use duel_core::game::tick::{tick, SimConfig};
use duel_core::network::{stream_transport, websocket_transport, PeerSession, SessionConfig};

const FRAMES: u32 = 100;

fn sim_config() -> SimConfig {
    SimConfig {
        countdown_ticks: 10,
        ..SimConfig::default()
    }
}

fn offerer_script(frame: u32) -> Intent {
    match frame % 25 {
        0 => Intent(Intent::USE_CHIP),
        5..=15 => Intent(Intent::CHARGE),
        20 => Intent(Intent::UP),
        _ => Intent::NONE,
    }
}

fn answerer_script(frame: u32) -> Intent {
    match frame % 30 {
        3 => Intent(Intent::USE_CHIP),
        10 => Intent(Intent::DOWN),
        12..=20 => Intent(Intent::CHARGE),
        _ => Intent::NONE,
    }
}

async fn run_pair<S1, K1, S2, K2>(
    offerer_halves: (S1, K1),
    answerer_halves: (S2, K2),
) -> (PeerSession, PeerSession)
where
    S1: duel_core::network::PacketSource,
    K1: duel_core::network::PacketSink,
    S2: duel_core::network::PacketSource,
    K2: duel_core::network::PacketSink,
{
    let (b_source, b_sink) = answerer_halves;
    let answerer = tokio::spawn(async move {
        let mut session = PeerSession::establish(
            Side::Answerer,
            b_source,
            b_sink,
            sim_config(),
            SessionConfig::default(),
        )
        .await
        .unwrap();
        session.run_for(FRAMES, answerer_script).await.unwrap();
        session
    });

    let (a_source, a_sink) = offerer_halves;
    let mut offerer = PeerSession::establish(
        Side::Offerer,
        a_source,
        a_sink,
        sim_config(),
        SessionConfig::default(),
    )
    .await
    .unwrap();
    offerer.run_for(FRAMES, offerer_script).await.unwrap();

    (offerer, answerer.await.unwrap())
}

#[tokio::test]
async fn test_two_peers_stay_in_lockstep_over_stream() {
    let (a, b) = tokio::io::duplex(4096);
    let (offerer, answerer) = run_pair(stream_transport(a), stream_transport(b)).await;

    assert_eq!(offerer.seed(), answerer.seed());
    assert_eq!(offerer.state().frame, FRAMES);
    assert_eq!(
        offerer.state().snapshot_bytes().unwrap(),
        answerer.state().snapshot_bytes().unwrap()
    );
    assert_eq!(offerer.state().compute_hash(), answerer.state().compute_hash());

    offerer.close().await;
    answerer.close().await;
}

#[tokio::test]
async fn test_two_peers_stay_in_lockstep_over_websocket() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let server = tokio::spawn(async move { tokio_tungstenite::accept_async(server_io).await.unwrap() });
    let (client_ws, _) = tokio_tungstenite::client_async("ws://localhost/", client_io)
        .await
        .unwrap();
    let server_ws = server.await.unwrap();

    let (offerer, answerer) =
        run_pair(websocket_transport(client_ws), websocket_transport(server_ws)).await;

    assert_eq!(
        offerer.state().snapshot_bytes().unwrap(),
        answerer.state().snapshot_bytes().unwrap()
    );

    offerer.close().await;
    answerer.close().await;
}

#[tokio::test]
async fn test_session_matches_offline_simulation() {
    let (a, b) = tokio::io::duplex(4096);
    let (offerer, answerer) = run_pair(stream_transport(a), stream_transport(b)).await;

    // Re-run the same battle locally from the negotiated seed
    let config = sim_config();
    let mut offline = SimState::new(offerer.seed().seed, &config);
    for frame in 1..=FRAMES {
        tick(&mut offline, [offerer_script(frame), answerer_script(frame)], &config);
    }

    assert_eq!(
        offline.snapshot_bytes().unwrap(),
        offerer.state().snapshot_bytes().unwrap()
    );

    // Intent logs replay to the same state too
    let (offerer_log, answerer_log) = offerer.intent_logs();
    let (replayed, _) = duel_core::game::tick::replay(
        SimState::new(offerer.seed().seed, &config),
        offerer_log,
        answerer_log,
        FRAMES,
        &config,
    );
    assert_eq!(replayed.compute_hash(), offline.compute_hash());

    offerer.close().await;
    answerer.close().await;
}
