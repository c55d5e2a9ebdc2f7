// Library root — exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod api;
pub mod db;
pub mod error;
pub mod metrics;
pub mod repository;
pub mod scheduling;
pub mod store;

// Binary-only plumbing, public so `main.rs` can reach it through the lib.
pub mod cli;
pub mod config;
pub mod logging;
