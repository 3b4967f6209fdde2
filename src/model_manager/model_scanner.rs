// invokeai-bridge/src/model_manager/model_scanner.rs

use std::collections::HashSet;
use std::path::PathBuf;
use log::{debug, info, warn};
use regex::RegexBuilder;
use walkdir::WalkDir;

use crate::app_config::AppConfig;
use super::types::{Model, ModelType};

/// Lists the model files of one type found in the configured directories.
/// Duplicates (same full path reached twice) are dropped and the result is
/// sorted by name.
pub fn list_models(config: &AppConfig, model_type: ModelType) -> Vec<Model> {
    let dirs: &[PathBuf] = match model_type {
        ModelType::Normal => &config.model_dirs,
        ModelType::Vae => &config.vae_dirs,
    };
    let extensions = model_type.valid_extensions();

    let mut seen = HashSet::new();
    let mut models = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            warn!("[MODEL_SCAN] Model directory {} does not exist, skipping", dir.display());
            continue;
        }
        for entry in WalkDir::new(dir).max_depth(config.scan_depth.max(1)).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("[MODEL_SCAN] Failed to read entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let has_valid_ext = entry
                .path()
                .extension()
                .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase().as_str()))
                .unwrap_or(false);
            if !has_valid_ext {
                continue;
            }
            let full_path = entry.path().to_path_buf();
            if seen.insert(full_path.clone()) {
                debug!("[MODEL_SCAN] Found {:?} model {}", model_type, full_path.display());
                models.push(Model::new(full_path, model_type));
            }
        }
    }

    models.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.full_path.cmp(&b.full_path)));
    info!("[MODEL_SCAN] {} {:?} model(s) found", models.len(), model_type);
    models
}

/// Looks a model up by file name. An empty name means "none selected".
pub fn get_model(config: &AppConfig, name: &str, model_type: ModelType) -> Option<Model> {
    if name.trim().is_empty() {
        return None;
    }
    list_models(config, model_type).into_iter().find(|m| m.name == name)
}

/// Wildcard match over the whole text: `*` is any run, `?` any one character.
pub fn matches_wildcard(text: &str, pattern: &str) -> bool {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    match RegexBuilder::new(&expr).dot_matches_new_line(true).build() {
        Ok(re) => re.is_match(text),
        Err(e) => {
            warn!("[MODEL_SCAN] Invalid wildcard '{}': {}", pattern, e);
            false
        }
    }
}
