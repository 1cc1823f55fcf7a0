use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::stream::DEFAULT_INACTIVITY_TIMEOUT;
use crate::throttle::{
    ClockBudget, ThrottleSettings, WriteArbiter, WriteBudgetSource,
    DEFAULT_SPEED_REDUCTION_THRESHOLD,
};
use crate::upload::{UploadSettings, DEFAULT_LIST_PAGE_SIZE, DEFAULT_MAX_PART_SIZE};

pub const DEFAULT_READ_BUFFER_BYTES: usize = 256 * 1024;

/// Platform write quota to enforce when the host does not report its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBudgetConfig {
    pub bytes_per_interval: u64,
    pub interval_secs: u64,
}

/// Global configuration loaded from `~/.config/haul/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaulConfig {
    /// Upper bound on one upload part, unless the server dictates one.
    pub max_part_size_bytes: u64,
    /// Entries requested per page when listing accepted parts.
    pub list_page_size: u32,
    /// Base URL of the upload service; `haul upload --endpoint` overrides it.
    pub upload_endpoint: Option<String>,
    /// Disk write ceiling in bytes/sec; 0 = unlimited.
    pub target_write_bytes_per_sec: u64,
    /// Sub-chunk size for throttled writes; 0 = one chunk per write.
    pub write_chunk_bytes: u64,
    /// Budget usage fraction where write speed starts ramping down.
    pub speed_reduction_threshold: f64,
    pub stream_inactivity_timeout_secs: u64,
    /// Bytes pulled from the receive stream per throttled write.
    pub read_buffer_bytes: usize,
    pub write_budget: Option<WriteBudgetConfig>,
}

impl Default for HaulConfig {
    fn default() -> Self {
        Self {
            max_part_size_bytes: DEFAULT_MAX_PART_SIZE,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            upload_endpoint: None,
            target_write_bytes_per_sec: 0,
            write_chunk_bytes: 0,
            speed_reduction_threshold: DEFAULT_SPEED_REDUCTION_THRESHOLD,
            stream_inactivity_timeout_secs: DEFAULT_INACTIVITY_TIMEOUT.as_secs(),
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            write_budget: None,
        }
    }
}

impl HaulConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_part_size_bytes == 0 {
            bail!("max_part_size_bytes must be greater than 0");
        }
        if self.list_page_size == 0 {
            bail!("list_page_size must be greater than 0");
        }
        if self.stream_inactivity_timeout_secs == 0 {
            bail!("stream_inactivity_timeout_secs must be greater than 0");
        }
        if self.read_buffer_bytes == 0 {
            bail!("read_buffer_bytes must be greater than 0");
        }
        let t = self.speed_reduction_threshold;
        if !(t > 0.0 && t <= 1.0) {
            bail!("speed_reduction_threshold must be in (0, 1], got {}", t);
        }
        if let Some(b) = &self.write_budget {
            if b.bytes_per_interval == 0 || b.interval_secs == 0 {
                bail!("write_budget needs non-zero bytes_per_interval and interval_secs");
            }
        }
        Ok(())
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            max_part_size: self.max_part_size_bytes,
            list_page_size: self.list_page_size,
        }
    }

    pub fn throttle_settings(&self) -> ThrottleSettings {
        ThrottleSettings {
            target_bytes_per_sec: self.target_write_bytes_per_sec,
            chunk_bytes: self.write_chunk_bytes,
            speed_reduction_threshold: self.speed_reduction_threshold,
        }
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_inactivity_timeout_secs)
    }

    pub fn budget_source(&self) -> Option<Arc<dyn WriteBudgetSource>> {
        self.write_budget.as_ref().map(|b| {
            Arc::new(ClockBudget::new(
                b.bytes_per_interval,
                Duration::from_secs(b.interval_secs),
            )) as Arc<dyn WriteBudgetSource>
        })
    }

    /// Process-wide arbiter for every throttled writer this config drives.
    pub fn write_arbiter(&self) -> Arc<WriteArbiter> {
        WriteArbiter::shared(self.budget_source())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("haul")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HaulConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HaulConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<HaulConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: HaulConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
