// tests/integration/main.rs

mod config_loading;
mod error_handling;
mod graph;
mod registry;
