// invokeai-bridge/src/app_config.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{info, warn};

use crate::error::{Error, Result};

// --- Configuration Structures ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default)]
    pub runwayml_inpainting: bool, // Allows `*-inpainting.*` checkpoints into the manifest
}

impl Default for FeatureFlags {
    fn default() -> Self {
        FeatureFlags { runwayml_inpainting: false }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf, // Root of everything the app installs
    #[serde(default = "default_sd_repo_dir")]
    pub sd_repo_dir: String, // InvokeAI checkout inside data_path
    #[serde(default)]
    pub model_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub vae_dirs: Vec<PathBuf>,
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub disable_pickle_scanner: bool,
    #[serde(default)]
    pub pickle_scan_cache: Option<PathBuf>, // Defaults to <data_path>/cache/picklescan.json
    #[serde(default = "default_pickle_scan_command")]
    pub pickle_scan_command: Vec<String>, // Program + args, the model path is appended
}

fn default_data_path() -> PathBuf {
    PathBuf::from("Data")
}

fn default_sd_repo_dir() -> String {
    "repo".to_string()
}

fn default_scan_depth() -> usize {
    1
}

fn default_pickle_scan_command() -> Vec<String> {
    vec!["picklescan".to_string(), "-p".to_string()]
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_path: default_data_path(),
            sd_repo_dir: default_sd_repo_dir(),
            model_dirs: Vec::new(),
            vae_dirs: Vec::new(),
            scan_depth: default_scan_depth(),
            features: FeatureFlags::default(),
            disable_pickle_scanner: false,
            pickle_scan_cache: None,
            pickle_scan_command: default_pickle_scan_command(),
        }
    }
}

impl AppConfig {
    /// Loads the config from a YAML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("[CONFIG] No config file at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }
        let text = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        info!("[CONFIG] Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sd_repo_dir.trim().is_empty() {
            return Err(Error::InvalidConfig("sdRepoDir must not be empty".to_string()));
        }
        if !self.disable_pickle_scanner && self.pickle_scan_command.is_empty() {
            return Err(Error::InvalidConfig(
                "pickleScanCommand must name a program while the pickle scanner is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory of the InvokeAI checkout.
    pub fn sd_repo_path(&self) -> PathBuf {
        self.data_path.join(&self.sd_repo_dir)
    }

    pub fn pickle_scan_cache_path(&self) -> PathBuf {
        self.pickle_scan_cache
            .clone()
            .unwrap_or_else(|| self.data_path.join("cache").join("picklescan.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "dataPath: /opt/sd\nfeatures:\n  runwaymlInpainting: true\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.data_path, PathBuf::from("/opt/sd"));
        assert_eq!(config.sd_repo_dir, "repo");
        assert!(config.features.runwayml_inpainting);
        assert!(!config.disable_pickle_scanner);
        assert_eq!(config.scan_depth, 1);
        assert_eq!(config.sd_repo_path(), PathBuf::from("/opt/sd").join("repo"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_empty_scanner_command_rejected() {
        let config = AppConfig {
            pickle_scan_command: Vec::new(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let disabled = AppConfig {
            pickle_scan_command: Vec::new(),
            disable_pickle_scanner: true,
            ..AppConfig::default()
        };
        assert!(disabled.validate().is_ok());
    }
}
