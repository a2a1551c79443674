// src/handlers/mod.rs
pub mod dashboard;
pub mod error;
pub mod execution;
pub mod overrides;
pub mod refresh;
