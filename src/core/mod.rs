//! Core engine types: configuration, errors, deterministic RNG.
//!
//! These are shared by every other module and carry no buff semantics
//! of their own.

pub mod config;
pub mod error;
pub mod rng;

pub use config::EngineConfig;
pub use error::BuffError;
pub use rng::{BuffRng, RngState};
