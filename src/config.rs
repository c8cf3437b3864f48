use crate::error::{MemoryError, Result};
use crate::scoring::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the store directory searched for upward from the working directory
pub const STORE_DIR: &str = ".avatar-memory";

/// Environment variable pointing at a store directory
pub const STORE_PATH_ENV: &str = "AVATAR_MEMORY_PATH";

const CONFIG_FILE: &str = "_config.yaml";

/// Keys accepted by `config`
pub const CONFIG_KEYS: &[&str] = &["embedder", "socket_path", "top_k", "confidence_threshold"];

/// Which embedder turns text into vectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Lite,
    Server,
}

/// Effective configuration of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub embedder: EmbedderKind,
    pub socket_path: PathBuf,
    pub top_k: usize,
    pub confidence_threshold: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            embedder: EmbedderKind::Lite,
            socket_path: PathBuf::from("/tmp/avatar-memory-embedder.sock"),
            top_k: DEFAULT_TOP_K,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

// -----------------------------------------------------------------------------
// Global config
// -----------------------------------------------------------------------------

fn global_config_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("avatar-memory")
        .join("config.yaml")
}

fn read_mapping(path: &Path) -> Result<Mapping> {
    if !path.exists() {
        return Ok(Mapping::new());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }

    match serde_yaml::from_str::<Value>(&content)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(MemoryError::Config(format!(
            "{} must contain a mapping",
            path.display()
        ))),
    }
}

/// Layer an effective config value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    Store,
    Global,
    Default,
}

impl std::fmt::Display for ValueOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValueOrigin::Store => "store",
            ValueOrigin::Global => "global",
            ValueOrigin::Default => "default",
        })
    }
}

// -----------------------------------------------------------------------------
// Per-store config
// -----------------------------------------------------------------------------

/// Configuration file of one store, layered over the global file
pub struct ConfigFile {
    path: PathBuf,
    global: Mapping,
    local: Mapping,
}

impl ConfigFile {
    /// Load the store's config and the global defaults beneath it
    pub fn load(store_path: &Path) -> Result<Self> {
        Self::load_layered(store_path, &global_config_file())
    }

    fn load_layered(store_path: &Path, global_path: &Path) -> Result<Self> {
        let path = store_path.join(CONFIG_FILE);
        Ok(Self {
            global: read_mapping(global_path)?,
            local: read_mapping(&path)?,
            path,
        })
    }

    /// Effective configuration: store keys override global keys override defaults
    pub fn resolve(&self) -> Result<StoreConfig> {
        let mut merged = self.global.clone();
        for (key, value) in &self.local {
            merged.insert(key.clone(), value.clone());
        }
        Ok(serde_yaml::from_value(Value::Mapping(merged))?)
    }

    /// Effective value of a key and the layer it comes from
    pub fn get(&self, key: &str) -> Result<Option<(String, ValueOrigin)>> {
        if !CONFIG_KEYS.contains(&key) {
            return Ok(None);
        }

        let origin = if self.local.contains_key(key) {
            ValueOrigin::Store
        } else if self.global.contains_key(key) {
            ValueOrigin::Global
        } else {
            ValueOrigin::Default
        };

        let value = match serde_yaml::to_value(self.resolve()?)? {
            Value::Mapping(resolved) => resolved.get(key).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }),
            _ => None,
        };

        Ok(value.map(|v| (v, origin)))
    }

    /// Set a key in this store's file after checking the result still resolves
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !CONFIG_KEYS.contains(&key) {
            return Err(MemoryError::Config(format!("Unknown config key: {}", key)));
        }

        let parsed: Value = serde_yaml::from_str(value)?;
        let previous = self.local.insert(Value::String(key.to_string()), parsed);

        if let Err(e) = self.resolve().and_then(|c| validate(&c)) {
            match previous {
                Some(old) => self.local.insert(Value::String(key.to_string()), old),
                None => self.local.remove(key),
            };
            return Err(MemoryError::Config(format!("Invalid value for {}: {}", key, e)));
        }

        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_yaml::to_string(&self.local)?)?;
        Ok(())
    }
}

fn validate(config: &StoreConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&config.confidence_threshold) {
        return Err(MemoryError::Config(
            "confidence_threshold must be between 0 and 1".to_string(),
        ));
    }
    Ok(())
}

/// Find the store directory, searching upward from current directory
pub fn find_store_path() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let store = current.join(STORE_DIR);
        if store.is_dir() {
            return Some(store);
        }

        if !current.pop() {
            break;
        }
    }

    if let Ok(path) = std::env::var(STORE_PATH_ENV) {
        let store = PathBuf::from(path);
        if store.is_dir() {
            return Some(store);
        }
    }

    None
}
