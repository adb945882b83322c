//! Acceptance scenarios for connection string resolution and reset policy

pub mod steps;
pub mod world;

pub use world::HarnessWorld;
