//! Island Core Service Library
//!
//! Backend for the island onboarding game: signed-login identity checks,
//! mission verification against on-chain evidence, at-most-once reward
//! settlement, and a weekly points leaderboard, exposed over JSON-RPC.

pub mod config;
pub mod error;
pub mod json_rpc;
pub mod server;
pub mod service;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use service::IslandService;
