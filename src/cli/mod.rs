//! CLI layer: argument parsing and the runtime application

pub mod app;
pub mod commands;

pub use app::BargainApp;
pub use commands::{Cli, Commands};
