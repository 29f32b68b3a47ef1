pub mod config;
pub mod errors;
pub mod layout;
pub mod orchestrator;
pub mod stage;
pub mod ui;
