//! Campus Gate Server - runtime for the access control services
//!
//! Loads [`GateConfig`], wires the in-memory stores and services into an
//! [`AppState`], serves the HTTP API and runs the periodic jobs.

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod jobs;
pub mod seed;
pub mod state;

pub use api::router;
pub use config::{ConfigError, GateConfig};
pub use jobs::{start_jobs, JobRegistry, JobSchedule};
pub use seed::SeedData;
pub use state::{AppState, Handlers};
