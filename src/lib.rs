pub mod backend;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod doctor;
pub mod driver;
pub mod error;
pub mod handoff;
pub mod profiles;
pub mod provider;
pub mod segment;
pub mod selector;
pub mod session;
pub mod telemetry;
