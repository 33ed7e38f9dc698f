//! Multiplayer party game server: players join rooms by code, write
//! answers to a prompt, and vote for the best one.

pub mod config;
pub mod game;
pub mod model;
pub mod protocol;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;
