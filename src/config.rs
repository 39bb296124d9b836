//! Configuration management for the paginator

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::paging::{LayoutConfig, Margins, DEFAULT_MAX_WORKERS};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cache: CacheConfig,
    pub workers: WorkerConfig,
    /// Layout used when the caller does not pick one
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Root of the page-marks files
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub max_workers: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

const DEFAULT_CACHE_DIR: &str = "./.paginator-cache";
const DEFAULT_LAYOUT: LayoutConfig = LayoutConfig::new(800, 600, 20, Margins::uniform(10));

impl Default for Config {
    fn default() -> Self {
        Config {
            cache: CacheConfig {
                dir: PathBuf::from(DEFAULT_CACHE_DIR),
            },
            workers: WorkerConfig {
                max_workers: DEFAULT_MAX_WORKERS,
            },
            layout: DEFAULT_LAYOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            cache: CacheConfig {
                dir: env::var("PAGINATOR_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_DIR)),
            },
            workers: WorkerConfig {
                max_workers: parse_var("PAGINATOR_MAX_WORKERS", DEFAULT_MAX_WORKERS)?,
            },
            layout: LayoutConfig::new(
                parse_var("PAGINATOR_WIDTH", DEFAULT_LAYOUT.width)?,
                parse_var("PAGINATOR_HEIGHT", DEFAULT_LAYOUT.height)?,
                parse_var("PAGINATOR_FONT_SIZE", DEFAULT_LAYOUT.font_size)?,
                Margins::uniform(parse_var("PAGINATOR_MARGIN", DEFAULT_LAYOUT.margins.left)?),
            ),
        })
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
