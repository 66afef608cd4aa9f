use std::path::PathBuf;

use crate::types::EngineConfig;

/// Server-level settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    /// Where the ledger files live
    pub data_dir: PathBuf,
    /// Frontend assets served as fallback
    pub static_dir: PathBuf,
    /// Fixed shuffle seed (reproducible sessions)
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7373,
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("static"),
            seed: None,
        }
    }
}

fn trimmed_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = match trimmed_var("FRAMEQUIZ_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid FRAMEQUIZ_PORT '{}', using {}", raw, defaults.port);
                defaults.port
            }),
            None => defaults.port,
        };

        let seed = trimmed_var("FRAMEQUIZ_SEED").and_then(|raw| match raw.parse() {
            Ok(seed) => Some(seed),
            Err(_) => {
                tracing::warn!("Invalid FRAMEQUIZ_SEED '{}', ignoring", raw);
                None
            }
        });

        Self {
            port,
            data_dir: trimmed_var("FRAMEQUIZ_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            static_dir: trimmed_var("FRAMEQUIZ_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            seed,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            seed: self.seed,
            ..EngineConfig::default()
        }
    }
}
