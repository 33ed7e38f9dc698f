//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the lobby lock and all room-wide delivery so the
//! websocket handler can stay focused on protocol translation.

pub mod game;
pub mod player;
pub mod room;
