//! CLI Commands

pub mod config;
pub mod reset;
pub mod resolve;
pub mod up;
