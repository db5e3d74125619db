//! Guild configuration lookup and trigger tracking.
//!
//! The pipeline reads configuration through [`ConfigStore`]; persistence is
//! someone else's job. [`MemoryConfigStore`] keeps records in memory and can
//! be seeded from a directory of YAML documents.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use guildwatch_core::{Category, ConfigKey, GuildEventConfig, GuildId};

use crate::error::{LoadResult, LoadStatus, Result, StoreError};

/// Read access to per-guild configuration plus trigger bookkeeping.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, guild_id: GuildId, category: Category) -> Result<Option<GuildEventConfig>>;

    /// Bump the trigger counter and move `last_triggered_at` forward.
    async fn record_trigger(
        &self,
        guild_id: GuildId,
        category: Category,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// In-memory store, one lock per record.
///
/// The outer map lock is only taken to find or insert a record; trigger
/// updates lock the single record they touch.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    records: RwLock<HashMap<ConfigKey, Arc<Mutex<GuildEventConfig>>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn upsert(&self, config: GuildEventConfig) {
        let key = config.key();
        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.insert(key, Arc::new(Mutex::new(config)));
    }

    /// Copies of every record, ordered by guild then category.
    pub fn configs(&self) -> Vec<GuildEventConfig> {
        let records: Vec<_> = self.record_map().values().cloned().collect();
        let mut configs: Vec<GuildEventConfig> =
            records.iter().map(|record| lock(record).clone()).collect();
        configs.sort_by_key(|c| c.key());
        configs
    }

    pub fn len(&self) -> usize {
        self.record_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, key: &ConfigKey) -> Option<Arc<Mutex<GuildEventConfig>>> {
        self.record_map().get(key).cloned()
    }

    fn record_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ConfigKey, Arc<Mutex<GuildEventConfig>>>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Recursively load every YAML file under `dir`.
    ///
    /// Dotfiles and non-YAML files are skipped. Parse errors are reported
    /// per file but do not abort the scan.
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        self.scan_dir_recursive(dir, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read config directory");
                return Ok(());
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        // Later files win on duplicate keys, so make the order stable.
        paths.sort();

        for path in paths {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);

            if !is_yaml {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match load_file(&path) {
                Ok(configs) => {
                    let count = configs.len();
                    for config in configs {
                        info!(
                            guild_id = %config.guild_id,
                            category = %config.category,
                            enabled = config.enabled,
                            path = %path.display(),
                            "loaded guild config"
                        );
                        self.upsert(config);
                    }
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { configs: count },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }
}

/// Parse every YAML document in `path`. All-or-nothing per file.
pub fn load_file(path: &Path) -> Result<Vec<GuildEventConfig>> {
    let contents = fs::read_to_string(path)?;
    let mut configs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&contents) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        configs.push(serde_yaml::from_value(value)?);
    }
    Ok(configs)
}

fn lock(record: &Mutex<GuildEventConfig>) -> MutexGuard<'_, GuildEventConfig> {
    match record.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, guild_id: GuildId, category: Category) -> Result<Option<GuildEventConfig>> {
        let Some(record) = self.record(&(guild_id, category)) else {
            return Ok(None);
        };
        let config = lock(&record).clone();
        Ok(Some(config))
    }

    async fn record_trigger(
        &self,
        guild_id: GuildId,
        category: Category,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let record = self.record(&(guild_id, category)).ok_or_else(|| {
            StoreError::Backend(format!("no config for guild {guild_id} category {category}"))
        })?;
        lock(&record).record_trigger(at);
        Ok(())
    }
}
