//! Scoreboard operator CLI — live feed, publish trigger, CMS reader.

pub mod cli;
pub mod cms;
pub mod relay_client;
