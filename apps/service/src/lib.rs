//! uppe-watch - local endpoint health monitor
//!
//! Keeps a small file-backed registry of URIs, probes each of them over HTTP
//! on a fixed interval and writes every cycle's outcomes to a dated snapshot,
//! while operator commands edit the registry concurrently.

pub mod app;
pub mod command;
pub mod config;
pub mod monitoring;
pub mod registry;

pub use config::Config;
