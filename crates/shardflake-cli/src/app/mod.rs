pub mod config;
pub mod decode;
pub mod generate;
pub mod telemetry;
