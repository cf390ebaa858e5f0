pub mod backend;
pub mod budget;
pub mod config;
pub mod error;
pub mod planning;
pub mod telemetry;
