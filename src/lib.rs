//! Descent Engine — adaptive-difficulty core for a turn-based descent game.
//!
//! Remembers how the player fights across runs, encodes the current run as
//! a fixed feature vector, generates enemies, rooms, traps, shops and lore
//! biased against the player's habits, and resolves combat as a timed,
//! turn-based state machine whose outcomes flow back into memory.

pub mod core;
pub mod schema;
