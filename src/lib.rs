// Public API for integration tests and potential library usage

pub mod api;
pub mod assets;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod generate;
pub mod protocol;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
