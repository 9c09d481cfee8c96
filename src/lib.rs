//! # Duel Core
//!
//! Deterministic lockstep simulation core for a two-player tactical tile battler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DUEL CORE                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ source, seed derivation      │
//! │  └── hash.rs     - State hashing for desync detection        │
//! │                                                              │
//! │  game/           - Battle logic (deterministic)              │
//! │  ├── field.rs    - Tile grid and column ownership            │
//! │  ├── entity.rs   - Entities, traits, status timers           │
//! │  ├── behavior/   - Behavior state machine                    │
//! │  ├── hit.rs      - Hit and status resolution                 │
//! │  ├── timestop.rs - Timestop stack                            │
//! │  ├── chip.rs     - Chip catalog                              │
//! │  └── tick.rs     - Step scheduler                            │
//! │                                                              │
//! │  network/        - Peer networking (non-deterministic)       │
//! │  ├── protocol.rs - Fixed-layout packet codec                 │
//! │  ├── transport.rs- Byte stream and WebSocket transports      │
//! │  ├── negotiation.rs - Commit-reveal seed agreement           │
//! │  └── session.rs  - Lockstep session                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No floating-point arithmetic in battle logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from the negotiated Xorshift128+ source
//!
//! ```
//! use duel_core::core::rng::{DeterministicRng, derive_session_seed};
//!
//! let seed = derive_session_seed(&[1; 16], &[2; 16]);
//! let mut a = DeterministicRng::new(seed);
//! let mut b = DeterministicRng::new(seed);
//! assert_eq!(a.next_u64(), b.next_u64());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::input::{Intent, IntentLog};
pub use game::state::SimState;
pub use game::tick::{SimConfig, TickResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
