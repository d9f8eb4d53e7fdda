//! Process-wide configuration for the mnemo ingestion/retrieval core.

pub mod config;

pub use config::Config;
