// invokeai-bridge/src/model_manager/pickle_scan.rs
//! Malware (pickle) scanning of model files, keyed by pseudo-hash so that
//! unchanged files are only ever scanned once.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::app_config::AppConfig;
use crate::error::{Error, Result};
use crate::hashing::get_pseudo_hash;
use super::types::Model;

pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = Result<HashMap<String, bool>>> + Send + 'a>>;

/// Produces a safe/unsafe verdict per pseudo-hash for the given models.
pub trait ModelVerifier: Send + Sync {
    fn verify<'a>(&'a self, models: &'a [Model]) -> VerifyFuture<'a>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanVerdict {
    pub safe: bool,
    pub file_name: String,
    pub scanned_at: String, // RFC 3339
}

/// Runs an external scanner (picklescan by default) on uncached files.
pub struct PickleScanVerifier {
    cache_path: PathBuf,
    command: Vec<String>,
}

impl PickleScanVerifier {
    pub fn new(cache_path: PathBuf, command: Vec<String>) -> Self {
        PickleScanVerifier { cache_path, command }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.pickle_scan_cache_path(), config.pickle_scan_command.clone())
    }

    async fn load_cache(&self) -> Result<BTreeMap<String, ScanVerdict>> {
        if !self.cache_path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = tokio::fs::read_to_string(&self.cache_path).await?;
        match serde_json::from_str(&text) {
            Ok(cache) => Ok(cache),
            Err(e) => {
                warn!("[PICKLE_SCAN] Cache {} is unreadable ({}), starting fresh", self.cache_path.display(), e);
                Ok(BTreeMap::new())
            }
        }
    }

    async fn save_cache(&self, cache: &BTreeMap<String, ScanVerdict>) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(cache)?;
        tokio::fs::write(&self.cache_path, text).await?;
        debug!("[PICKLE_SCAN] Saved {} verdict(s) to {}", cache.len(), self.cache_path.display());
        Ok(())
    }

    /// Exit 0 is safe and exit 1 is flagged. Anything else (scan error,
    /// crash, signal) is a scanner failure and must not become a verdict.
    async fn scan_file(&self, path: &Path) -> Result<bool> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::ScannerFailed("no scanner command configured".to_string()))?;

        info!("[PICKLE_SCAN] Scanning {}", path.display());
        let output = Command::new(program)
            .args(args)
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                let err_msg = format!("Failed to run '{}': {}", program, e);
                error!("[PICKLE_SCAN] {}", err_msg);
                Error::ScannerFailed(err_msg)
            })?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => {
                warn!(
                    "[PICKLE_SCAN] {} flagged: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stdout).trim()
                );
                Ok(false)
            }
            code => {
                let err_msg = format!(
                    "'{}' could not scan {} (exit {:?}): {}",
                    program,
                    path.display(),
                    code,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                error!("[PICKLE_SCAN] {}", err_msg);
                Err(Error::ScannerFailed(err_msg))
            }
        }
    }
}

impl ModelVerifier for PickleScanVerifier {
    fn verify<'a>(&'a self, models: &'a [Model]) -> VerifyFuture<'a> {
        Box::pin(async move {
            let mut cache = self.load_cache().await?;
            let mut verdicts = HashMap::new();
            let mut cache_dirty = false;

            for model in models {
                let hash = match pseudo_hash(model.path()).await {
                    Ok(hash) => hash,
                    Err(e) => {
                        warn!("[PICKLE_SCAN] Cannot fingerprint {}: {}", model.full_path.display(), e);
                        continue;
                    }
                };

                if let Some(verdict) = cache.get(&hash) {
                    debug!("[PICKLE_SCAN] Cached verdict for {}: safe={}", model.name, verdict.safe);
                    verdicts.insert(hash, verdict.safe);
                    continue;
                }

                let safe = match self.scan_file(model.path()).await {
                    Ok(safe) => safe,
                    Err(e) => {
                        // Keep the verdicts gathered so far, drop the failed one.
                        if cache_dirty {
                            self.save_cache(&cache).await?;
                        }
                        return Err(e);
                    }
                };
                cache.insert(
                    hash.clone(),
                    ScanVerdict {
                        safe,
                        file_name: model.name.clone(),
                        scanned_at: chrono::Utc::now().to_rfc3339(),
                    },
                );
                cache_dirty = true;
                verdicts.insert(hash, safe);
            }

            if cache_dirty {
                self.save_cache(&cache).await?;
            }
            Ok(verdicts)
        })
    }
}

async fn pseudo_hash(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || get_pseudo_hash(&path))
        .await
        .map_err(|e| Error::ScannerFailed(format!("hash task failed: {}", e)))?
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPartition {
    pub safe: Vec<Model>,
    pub unsafe_models: Vec<Model>,
}

/// Splits models by verdict. A model without a verdict counts as unsafe.
pub async fn verify_models_with_pseudo_hash(
    verifier: &dyn ModelVerifier,
    models: &[Model],
) -> Result<ScanPartition> {
    let verdicts = verifier.verify(models).await?;
    let mut partition = ScanPartition::default();

    for model in models {
        let safe = match pseudo_hash(model.path()).await {
            Ok(hash) => verdicts.get(&hash).copied().unwrap_or(false),
            Err(_) => false,
        };
        if safe {
            partition.safe.push(model.clone());
        } else {
            partition.unsafe_models.push(model.clone());
        }
    }
    Ok(partition)
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashSet;

    /// Flags every model whose name is in `unsafe_names`.
    pub struct StaticVerifier {
        pub unsafe_names: HashSet<String>,
    }

    impl StaticVerifier {
        pub fn flagging(names: &[&str]) -> Self {
            StaticVerifier { unsafe_names: names.iter().map(|n| n.to_string()).collect() }
        }
    }

    impl ModelVerifier for StaticVerifier {
        fn verify<'a>(&'a self, models: &'a [Model]) -> VerifyFuture<'a> {
            Box::pin(async move {
                let mut verdicts = HashMap::new();
                for model in models {
                    let hash = get_pseudo_hash(model.path())?;
                    verdicts.insert(hash, !self.unsafe_names.contains(&model.name));
                }
                Ok(verdicts)
            })
        }
    }
}
