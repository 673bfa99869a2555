//! irflux: parallel page decoding and caching for four-byte IR log streams.
//!
//! This crate provides:
//! - The IR wire format: preamble, record decoder and encoder (`ir`).
//! - Page decoding and stream pagination (`page`).
//! - A bounded worker pool that decodes pages off the caller's thread (`core`).
//! - Decoded-page stores: in-memory, LMDB and an LRU wrapper (`storage`).
//! - Ordered export of a fully decoded file (`export`).
//! - Global configuration loading (`load_config`, `CONF`) and startup (`initialize`).
pub mod buffer;
pub mod core;
pub mod error;
pub mod export;
pub mod ir;
pub mod logs;
pub mod page;
pub mod storage;

use std::sync::OnceLock;

use tracing::{info, warn};

use crate::{core::config::Config, logs::init_logging};

/// Global, singleton configuration instance.
///
/// Initialized by `load_config` and reused thereafter.
pub static CONF: OnceLock<Config> = OnceLock::new();

/// Load or retrieve the global configuration.
///
/// Reads the file named by `IRFLUX_CONFIG`, or `irflux.toml` in the working
/// directory. A missing or unparsable file falls back to the defaults.
pub fn load_config() -> &'static Config {
    CONF.get_or_init(|| {
        let path = std::env::var("IRFLUX_CONFIG").unwrap_or_else(|_| "irflux.toml".into());
        match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
                warn!("invalid config {path}: {e}; using defaults");
                Config::default()
            }),
            Err(e) => {
                warn!("cannot read config {path}: {e}; using defaults");
                Config::default()
            }
        }
    })
}

/// Loads configuration and sets up logging.
pub fn initialize() -> &'static Config {
    let config = load_config();
    init_logging(Some(config.logging.level.as_str()));
    info!("irflux initialized (max_workers={})", config.pool.max_workers);
    config
}
