//! Scoreboard relay — connection registry, event publisher, live broadcast.

pub mod api;
pub mod config;
pub mod publisher;
pub mod registry;
pub mod relay;
