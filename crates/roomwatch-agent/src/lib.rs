//! # roomwatch-agent
//!
//! Device agent library for roomwatch.
//!
//! Provides the adapters that connect the core to real hardware, the tick
//! loop, logging setup and the read-only status API.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod adapters;
pub mod agent;
pub mod api;
pub mod logging;
pub mod runner;
pub mod state;
