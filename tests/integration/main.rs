//! End-to-end tests through the public facade.

#[path = "../common/mod.rs"]
mod common;

mod config;
mod projection;
mod streams;
