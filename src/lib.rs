// src/lib.rs
pub mod app;
pub mod baseline;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod routes;
pub mod services;
pub mod store;
