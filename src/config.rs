use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::manifest::{ArchiveLayout, DEFAULT_PREFIX};
use crate::record::TimestampZone;
use crate::symbol_resolver::{ARTIFACT_CURRENCIES, CollisionPolicy, MAJOR_CURRENCIES, SymbolResolver};

pub const CONFIG_ENV: &str = "ARCHIVE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "configs/archive.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory the archive-relative paths of the manifest are resolved against.
    pub root_dir: PathBuf,

    /// Listing of archive files, e.g. `find Bittrex -type f > index.csv`.
    pub manifest: PathBuf,

    /// First path segment and file name prefix of every archive file.
    pub prefix: String,

    pub major_currencies: Vec<String>,

    pub artifact_currencies: Vec<String>,

    pub collision_policy: CollisionPolicy,

    /// Zone trade timestamps are rendered in; unset means the local zone.
    pub utc_offset_secs: Option<i32>,

    /// Worker threads for parallel traversal; unset uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            manifest: PathBuf::from("index.csv"),
            prefix: DEFAULT_PREFIX.to_string(),
            major_currencies: MAJOR_CURRENCIES.iter().map(|s| s.to_string()).collect(),
            artifact_currencies: ARTIFACT_CURRENCIES.iter().map(|s| s.to_string()).collect(),
            collision_policy: CollisionPolicy::default(),
            utc_offset_secs: None,
            threads: None,
        }
    }
}

impl ArchiveConfig {
    pub fn layout(&self) -> crate::Result<ArchiveLayout> {
        ArchiveLayout::new(&self.prefix)
    }

    pub fn resolver(&self) -> SymbolResolver {
        SymbolResolver::new(
            self.major_currencies.as_slice(),
            self.artifact_currencies.as_slice(),
            self.collision_policy,
        )
    }

    pub fn timestamp_zone(&self) -> crate::Result<TimestampZone> {
        TimestampZone::from_offset_secs(self.utc_offset_secs).ok_or_else(|| {
            crate::ArchiveError::InvalidConfig(format!(
                "utc_offset_secs {:?} is out of range",
                self.utc_offset_secs
            ))
        })
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    pub fn validate(&self) -> Result<()> {
        self.layout()?;
        self.timestamp_zone()?;
        if self.major_currencies.is_empty() {
            anyhow::bail!("major_currencies must name at least one currency");
        }
        if self
            .major_currencies
            .iter()
            .chain(&self.artifact_currencies)
            .any(|c| c.is_empty())
        {
            anyhow::bail!("currency lists must not contain empty entries");
        }
        if self.threads == Some(0) {
            anyhow::bail!("threads must be a positive integer");
        }
        Ok(())
    }

    pub fn thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        self.threads.map(configure_thread_pool).transpose()
    }
}

pub fn load_config(path: &Path) -> Result<ArchiveConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: ArchiveConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse yaml config: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(config)
}

/// `$ARCHIVE_CONFIG` if set, else `configs/archive.yaml`.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn configure_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build thread pool: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let file = write_config("root_dir: /data/kaiko\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.root_dir, PathBuf::from("/data/kaiko"));
        assert_eq!(config.manifest, PathBuf::from("index.csv"));
        assert_eq!(config.prefix, "Bittrex");
        assert_eq!(config.major_currencies, vec!["BTC", "ETH"]);
        assert_eq!(config.artifact_currencies, vec!["DBTC"]);
        assert_eq!(config.collision_policy, CollisionPolicy::PreferMajorQuote);
        assert_eq!(config.timestamp_zone().unwrap(), TimestampZone::Local);
        assert!(config.thread_pool().unwrap().is_none());
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            "root_dir: archive\n\
             manifest: archive/index.csv\n\
             prefix: Bittrex\n\
             collision_policy: reject\n\
             utc_offset_secs: -14400\n\
             threads: 2\n",
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.manifest_path(), Path::new("archive/index.csv"));
        assert_eq!(config.collision_policy, CollisionPolicy::Reject);
        assert!(matches!(config.timestamp_zone().unwrap(), TimestampZone::Fixed(_)));
        let pool = config.thread_pool().unwrap().unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }

    #[test]
    fn test_invalid_config() {
        for contents in [
            "threads: 0\n",
            "utc_offset_secs: 100000\n",
            "prefix: \"\"\n",
            "major_currencies: []\n",
            "major_currencies: [BTC, \"\"]\n",
            "artifact_currencies: [\"\"]\n",
            "collision_policy: first_wins\n",
        ] {
            let file = write_config(contents);
            assert!(load_config(file.path()).is_err(), "{} should be rejected", contents);
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("does/not/exist.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
