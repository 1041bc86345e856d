pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod market;
pub mod types;
