#![forbid(unsafe_code)]

pub mod config;
pub mod display;
pub mod errors;
pub mod health;
pub mod intent;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod slack;
pub mod state;
pub mod transport;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
