//! Configuration loading and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use psytest_core::model::{Role, User};
use psytest_core::session::RunnerConfig;
use psytest_core::traits::DocumentStore;

use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::rest::{RestStore, DEFAULT_TIMEOUT_SECS};

/// Which document store backs the engine.
///
/// Note: Custom Debug impl masks the API key to keep it out of logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File {
        #[serde(default = "default_data_dir")]
        dir: PathBuf,
    },
    Rest {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.debug_struct("Memory").finish(),
            StoreConfig::File { dir } => f.debug_struct("File").field("dir", dir).finish(),
            StoreConfig::Rest {
                base_url,
                api_key,
                timeout_secs,
            } => f
                .debug_struct("Rest")
                .field("base_url", base_url)
                .field("api_key", &api_key.as_ref().map(|_| "***"))
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./psytest-data")
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// The local user identity, standing in for the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub role: Role,
}

fn default_user_id() -> String {
    "local".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
            plan: None,
            role: Role::Candidate,
        }
    }
}

impl UserConfig {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            plan: self.plan.clone(),
            role: self.role,
        }
    }
}

/// Top-level psytest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsytestConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub user: UserConfig,
    /// Countdown period in milliseconds; one period is one test second.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Fixed sampling seed, for reproducible attempts.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_tick_ms() -> u64 {
    1000
}

impl Default for PsytestConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            user: UserConfig::default(),
            tick_ms: default_tick_ms(),
            seed: None,
        }
    }
}

impl PsytestConfig {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            seed: self.seed,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory => StoreConfig::Memory,
        StoreConfig::File { dir } => StoreConfig::File {
            dir: PathBuf::from(resolve_env_vars(&dir.to_string_lossy())),
        },
        StoreConfig::Rest {
            base_url,
            api_key,
            timeout_secs,
        } => StoreConfig::Rest {
            base_url: resolve_env_vars(base_url),
            api_key: api_key.as_deref().map(resolve_env_vars),
            timeout_secs: *timeout_secs,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `psytest.toml` in the current directory
/// 2. `~/.config/psytest/config.toml`
///
/// `PSYTEST_API_KEY` overrides the REST store key.
pub fn load_config() -> Result<PsytestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<PsytestConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("psytest.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<PsytestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => PsytestConfig::default(),
    };

    config.store = resolve_store_config(&config.store);

    if let Ok(key) = std::env::var("PSYTEST_API_KEY") {
        if let StoreConfig::Rest { api_key, .. } = &mut config.store {
            *api_key = Some(key);
        }
    }

    tracing::debug!(store = ?config.store, user = %config.user.id, "configuration loaded");
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("psytest"))
}

/// Create a document store from its configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::File { dir } => Ok(Arc::new(FileStore::new(dir.clone()))),
        StoreConfig::Rest {
            base_url,
            api_key,
            timeout_secs,
        } => {
            let store = RestStore::new(base_url, api_key.clone(), *timeout_secs)
                .context("failed to create REST store")?;
            Ok(Arc::new(store))
        }
    }
}
