pub mod config;
pub mod sink;
