//! HTTP service that runs Screaming Frog SEO Spider crawls as background
//! subprocesses, tracks them in memory and serves their exports.

pub mod api;
pub mod config;
pub mod config_store;
pub mod license;
pub mod locator;
pub mod metrics;
pub mod process;
pub mod registry;
pub mod runner;
pub mod state;

pub use config::Config;
pub use state::AppState;
