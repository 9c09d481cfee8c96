//! Core deterministic primitives.
//!
//! Everything in this module must behave identically on both peers.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, derive_session_seed};
pub use hash::{StateHash, StateHasher, compute_state_hash};
