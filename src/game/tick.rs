//! Authoritative Simulation Tick
//!
//! The step scheduler. Must be 100% deterministic: the only randomness is
//! the synchronized source in the state, drawn in a fixed order.

use crate::game::behavior::step_entity;
use crate::game::chip::ChipCatalog;
use crate::game::context::StepContext;
use crate::game::entity::EntityId;
use crate::game::events::{BattleEvent, SoundKind};
use crate::game::field::Side;
use crate::game::hit::resolve;
use crate::game::input::{Intent, IntentLog};
use crate::game::state::{MatchPhase, SimState};
use crate::game::timestop::{Timestop, TimestopProgress};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<BattleEvent>,
    /// Whether the battle is over
    pub match_ended: bool,
    /// Winner (if it ended with one)
    pub winner: Option<Side>,
}

/// Configuration for the simulation.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Chip catalog
    pub catalog: ChipCatalog,
    /// Starting HP of each player
    pub player_hp: i32,
    /// Chip indices each player's folder starts with
    pub folder: Vec<u16>,
    /// Chips drawn per hand
    pub hand_size: usize,
    /// Ticks for the custom gauge to fill
    pub custom_gauge_ticks: u32,
    /// Ticks of countdown before gameplay
    pub countdown_ticks: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        let catalog = ChipCatalog::builtin().unwrap_or_else(|err| {
            tracing::error!(%err, "builtin chip catalog failed to load");
            ChipCatalog::default()
        });

        Self {
            catalog,
            player_hp: 500,
            folder: vec![0, 0, 1, 2, 2, 3, 3, 4, 5, 6, 6, 7, 8, 9, 10, 10, 0, 2, 4, 6],
            hand_size: 5,
            custom_gauge_ticks: 600, // 10 seconds
            countdown_ticks: 60,
        }
    }
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `state` - The simulation state (will be mutated)
/// * `intents` - Both sides' intents, indexed by `Side::index`
/// * `config` - Simulation configuration
///
/// # Determinism
///
/// Entities step in id order shuffled by the synchronized source, and
/// every other loop walks BTreeMaps or Vecs in a fixed order.
pub fn tick(state: &mut SimState, intents: [Intent; 2], config: &SimConfig) -> TickResult {
    let mut result = TickResult::default();

    match state.phase {
        MatchPhase::Countdown { ticks_remaining } => {
            state.frame += 1;
            state.phase = if ticks_remaining <= 1 {
                MatchPhase::Playing
            } else {
                MatchPhase::Countdown {
                    ticks_remaining: ticks_remaining - 1,
                }
            };
            return result;
        }
        MatchPhase::Ended { winner } => {
            result.match_ended = true;
            result.winner = winner;
            return result;
        }
        MatchPhase::Playing => {}
    }

    // 0. Advance counters
    state.frame += 1;
    state.tick += 1;

    // 1. Apply intents, custom gauge, cut-ins
    apply_intents(state, intents, config);

    // 2-4. Step pending entities until none are left
    mark_pending(state);
    step_pending_entities(state, config);

    // 5. Step the top timestop
    step_timestop(state, config);

    // 6. Resolve accumulated hits
    for entity in state.entities.values_mut() {
        resolve(entity);
    }

    // 7. Purge destroyed entities
    state.entities.retain(|_, e| !e.pending_destruction);

    // 8. Field and presentation
    state.field.step();
    state.presentation.step();

    // 9. Check end conditions
    check_end(state, &mut result);

    result.events = state.take_events();
    result
}

fn apply_intents(state: &mut SimState, intents: [Intent; 2], config: &SimConfig) {
    let timestop_active = state.timestop_active();

    for side in Side::ALL {
        let slot = &mut state.players[side.index()];
        let Some(entity) = state.entities.get_mut(&slot.entity) else {
            continue;
        };

        let intent = intents[side.index()];
        entity.last_intent = entity.intent;
        entity.intent = intent;
        let last = entity.last_intent;

        if !timestop_active && slot.custom_gauge < config.custom_gauge_ticks {
            slot.custom_gauge += 1;
        }

        if intent.pressed_since(last, Intent::END_TURN) && slot.custom_gauge >= config.custom_gauge_ticks {
            slot.refill_hand(config.hand_size);
            slot.custom_gauge = 0;
            state.pending_events.push(BattleEvent::HandRefilled {
                side,
                hand_size: slot.hand.len(),
            });
        }

        if intent.pressed_since(last, Intent::CUT_IN) {
            try_cut_in(state, side, config);
        }
    }
}

/// Counter the opponent's timestop with a timestop chip from the front of
/// the hand. Only possible during the counter window.
fn try_cut_in(state: &mut SimState, side: Side, config: &SimConfig) {
    let Some(top) = state.timestops.last() else {
        return;
    };
    if top.side == side || !top.counterable() {
        return;
    }

    let slot = &mut state.players[side.index()];
    let Some(chip) = slot.hand.first().and_then(|index| config.catalog.get(*index)) else {
        return;
    };
    let Some(behavior) = chip.timestop_behavior() else {
        return;
    };

    let chip_index = slot.hand.remove(0);
    let owner = slot.entity;
    state.timestops.push(Timestop::new(owner, side, behavior));
    state.presentation.add_sound(SoundKind::Timestop, 0);
    state.pending_events.push(BattleEvent::ChipUsed { side, chip: chip_index });
    state.pending_events.push(BattleEvent::TimestopStarted {
        side,
        depth: state.timestops.len(),
    });
}

/// Mark every entity that should step this tick.
fn mark_pending(state: &mut SimState) {
    let timestop_active = state.timestop_active();
    for entity in state.entities.values_mut() {
        entity.pending_step = !timestop_active || entity.runs_in_timestop;
    }
}

fn step_pending_entities(state: &mut SimState, config: &SimConfig) {
    loop {
        // BTreeMap iterates in sorted key order, so the shuffle input is fixed
        let mut order: Vec<EntityId> = state
            .entities
            .values()
            .filter(|e| e.pending_step)
            .map(|e| e.id)
            .collect();
        if order.is_empty() {
            break;
        }
        state.rng.shuffle(&mut order);

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(tick = state.tick, ?order, "entity step order");

        for id in order {
            let mut entity = state
                .entities
                .remove(&id)
                .unwrap_or_else(|| panic!("stepping unknown entity {id}"));
            entity.pending_step = false;

            // A timestop pushed earlier this tick freezes everyone not exempt
            let frozen = state.timestop_active() && !entity.runs_in_timestop;
            if !frozen && !entity.pending_destruction {
                let mut ctx = StepContext::new(state, config);
                step_entity(&mut entity, &mut ctx);
            }

            state.entities.insert(id, entity);
        }
    }
}

fn step_timestop(state: &mut SimState, config: &SimConfig) {
    let Some(mut timestop) = state.timestops.pop() else {
        return;
    };
    let index = state.timestops.len();

    let progress = {
        let mut ctx = StepContext::new(state, config);
        timestop.step(&mut ctx)
    };

    if progress == TimestopProgress::Running {
        state.timestops.insert(index, timestop);
    }
}

fn check_end(state: &mut SimState, result: &mut TickResult) {
    if state.phase != MatchPhase::Playing {
        return;
    }

    let offerer_down = state.player_entity(Side::Offerer).hp <= 0;
    let answerer_down = state.player_entity(Side::Answerer).hp <= 0;
    if !offerer_down && !answerer_down {
        return;
    }

    let winner = match (offerer_down, answerer_down) {
        (true, false) => Some(Side::Answerer),
        (false, true) => Some(Side::Offerer),
        _ => None,
    };

    state.phase = MatchPhase::Ended { winner };
    state.pending_events.push(BattleEvent::MatchEnded {
        winner,
        tick: state.tick,
    });
    result.match_ended = true;
    result.winner = winner;
}

/// Replay a battle from recorded intents.
///
/// Frame `f` (1-based, counting countdown frames) uses each log's intent at `f`.
pub fn replay(
    initial_state: SimState,
    offerer: &IntentLog,
    answerer: &IntentLog,
    frames: u32,
    config: &SimConfig,
) -> (SimState, Vec<BattleEvent>) {
    let mut state = initial_state;
    let mut all_events = Vec::new();

    for frame in 1..=frames {
        let intents = [offerer.intent_at(frame), answerer.intent_at(frame)];
        let result = tick(&mut state, intents, config);
        all_events.extend(result.events);

        if result.match_ended {
            break;
        }
    }

    (state, all_events)
}

// =============================================================================
// TESTS
// =============================================================================
