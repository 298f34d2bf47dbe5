//! Core domain types shared across the engine.

pub mod ids;

pub use ids::{InvalidSha, Sha};
