//! Quota config loader (strict parsing) and reloadable config sources.

pub mod schema;

use std::fs;
use std::path::PathBuf;

use regioncap_core::error::{QuotaError, Result};

pub use schema::{
    AdminSection, AlertSection, KindLimits, KindSwitches, QuotaConfig, RealmLimits,
    StorageSection, USE_DEFAULT,
};

pub fn load_from_file(path: &str) -> Result<QuotaConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| QuotaError::PolicyUnavailable(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<QuotaConfig> {
    let cfg: QuotaConfig = serde_yaml::from_str(s)
        .map_err(|e| QuotaError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Where policy comes from at startup and on every reload request.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<QuotaConfig>;
    fn describe(&self) -> String;
}

/// YAML file re-read on each load.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<QuotaConfig> {
        load_from_file(&self.path.to_string_lossy())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Fixed YAML text, parsed on each load. Used by embedders and tests.
pub struct StaticSource {
    yaml: String,
}

impl StaticSource {
    pub fn new(yaml: impl Into<String>) -> Self {
        Self { yaml: yaml.into() }
    }
}

impl ConfigSource for StaticSource {
    fn load(&self) -> Result<QuotaConfig> {
        load_from_str(&self.yaml)
    }

    fn describe(&self) -> String {
        "static".into()
    }
}
