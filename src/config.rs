use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub allocation: AllocationPolicy,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// System-wide allocation policy consumed by the calculators and the
/// promotion coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Over-allocation threshold. May exceed 100 to permit overbooking
    /// per-allocation as well.
    #[serde(default = "default_max_utilization")]
    pub max_utilization_percentage: u32,
    /// When true, promotion skips the over-allocation check entirely.
    #[serde(default)]
    pub allow_overallocation: bool,
    /// Utilization applied to change payloads that omit one.
    #[serde(default = "default_allocation_percentage")]
    pub default_allocation_percentage: u32,
    /// Capacity assumed for resources without an explicit one.
    #[serde(default = "default_weekly_capacity_hours")]
    pub default_weekly_capacity_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub max_utilization_percentage: Option<u32>,
    pub allow_overallocation: Option<bool>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/staffplan/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(max) = overrides.max_utilization_percentage {
            self.allocation.max_utilization_percentage = max;
        }
        if let Some(allow) = overrides.allow_overallocation {
            self.allocation.allow_overallocation = allow;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn default_template() -> String {
        let template = r#"[allocation]
max_utilization_percentage = 100
allow_overallocation = false
default_allocation_percentage = 100
default_weekly_capacity_hours = 40.0

[storage]
db_path = "~/.local/share/staffplan/staffplan.db"

[server]
host = "127.0.0.1"
port = 3400
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allocation: AllocationPolicy::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            max_utilization_percentage: default_max_utilization(),
            allow_overallocation: false,
            default_allocation_percentage: default_allocation_percentage(),
            default_weekly_capacity_hours: default_weekly_capacity_hours(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_max_utilization() -> u32 {
    100
}

fn default_allocation_percentage() -> u32 {
    100
}

fn default_weekly_capacity_hours() -> f64 {
    40.0
}

fn default_db_path() -> String {
    "~/.local/share/staffplan/staffplan.db".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3400
}
