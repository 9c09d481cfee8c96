//! Duel Core Demo
//!
//! Negotiates a seed between two in-process peers over a duplex pipe, runs a
//! scripted battle in lockstep and checks both peers end in the same state.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use duel_core::{
    TICK_RATE, VERSION,
    game::{field::Side, input::Intent, tick::SimConfig},
    network::{stream_transport, PeerSession, SessionConfig},
};

/// Frames to simulate (including the countdown).
const DEMO_FRAMES: u32 = 1200;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Duel Core v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    demo_battle().await
}

/// Offerer fires chips and charge shots; answerer walks and charges.
fn offerer_script(frame: u32) -> Intent {
    match frame % 90 {
        0..=2 => Intent(Intent::USE_CHIP),
        10..=70 => Intent(Intent::CHARGE),
        75 => Intent(Intent::UP),
        85 => Intent(Intent::DOWN),
        _ => Intent::NONE,
    }
}

fn answerer_script(frame: u32) -> Intent {
    match frame % 120 {
        0 => Intent(Intent::LEFT),
        20..=22 => Intent(Intent::USE_CHIP),
        30..=95 => Intent(Intent::CHARGE),
        100 => Intent(Intent::CUT_IN),
        110 => Intent(Intent::END_TURN),
        _ => Intent::NONE,
    }
}

async fn demo_battle() -> Result<()> {
    info!("=== Starting Demo Battle ===");

    let (a, b) = tokio::io::duplex(4096);
    let (a_source, a_sink) = stream_transport(a);
    let (b_source, b_sink) = stream_transport(b);

    let answerer = tokio::spawn(async move {
        let mut session = PeerSession::establish(
            Side::Answerer,
            b_source,
            b_sink,
            SimConfig::default(),
            SessionConfig::default(),
        )
        .await?;
        session.run_for(DEMO_FRAMES, answerer_script).await?;
        Ok::<_, anyhow::Error>(session)
    });

    let mut offerer = PeerSession::establish(
        Side::Offerer,
        a_source,
        a_sink,
        SimConfig::default(),
        SessionConfig::default(),
    )
    .await
    .context("offerer failed to establish session")?;

    info!("Seed: {}", offerer.seed().seed);
    info!("Seed digest: {}", hex::encode(offerer.seed().digest));

    let events = offerer.run_for(DEMO_FRAMES, offerer_script).await?;
    let answerer = answerer.await.context("answerer task panicked")??;

    let state = offerer.state();
    info!("=== Battle Complete ===");
    info!("Frames: {}, gameplay ticks: {}", state.frame, state.tick);
    info!("Events: {}", events.len());
    for side in Side::ALL {
        info!("{:?} HP: {}", side, state.player_entity(side).hp);
    }
    if let Some(winner) = state.winner() {
        info!("Winner: {:?}", winner);
    }

    let offerer_hash = offerer.state().compute_hash();
    let answerer_hash = answerer.state().compute_hash();
    info!("Offerer hash:  {}", hex::encode(offerer_hash));
    info!("Answerer hash: {}", hex::encode(answerer_hash));

    if offerer_hash != answerer_hash {
        bail!("peers desynced");
    }
    info!("Peers in sync");

    offerer.close().await;
    answerer.close().await;
    Ok(())
}
