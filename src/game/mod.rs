//! Game rules: the per-room round machine and the question deck.

pub mod questions;
pub mod room;
