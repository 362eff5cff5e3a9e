//! MTA coin
//!
//! A minimal proof-of-work chain with one coordinator and several miners
//! talking over named byte channels:
//! - CRC-32 checksum with a leading-zero-bits difficulty rule
//! - First valid submission per height wins
//! - Miners abandon stale targets between attempts
//! - Named pipes on Unix, in-process channels for tests and embedding

#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod miner;
pub mod protocol;
pub mod utils;

pub use config::Config;
pub use coordinator::{Coordinator, Outcome, Rejection};
pub use error::{Error, Result};
pub use miner::{Miner, MinerStats};

/// Application information
pub const APP_NAME: &str = "mtacoin";
/// Crate version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
