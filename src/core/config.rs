use std::path::PathBuf;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub version: u64,
    pub description: String,
    pub pool: PoolConfig,
    pub decoder: DecoderConfig,
    pub store: StoreConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PoolConfig {
    pub max_workers: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DecoderConfig {
    pub render_timestamps: bool,
    pub initial_buffer_capacity: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub cache_dir: PathBuf,
    pub map_size_bytes: usize,
    pub read_cache_pages: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub progress_poll_interval_ms: u64,
    pub page_size: usize,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; empty means the build default.
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "irflux".to_string(),
            version: 1,
            description: "IR log-stream page decoder and page cache".to_string(),
            pool: PoolConfig::default(),
            decoder: DecoderConfig::default(),
            store: StoreConfig::default(),
            export: ExportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_workers: 4 }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            render_timestamps: true,
            initial_buffer_capacity: 4096,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("irflux"),
            map_size_bytes: 1 << 30,
            read_cache_pages: 16,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            progress_poll_interval_ms: 100,
            page_size: 10_000,
        }
    }
}
