// invokeai-bridge/src/invoke_ai/models_yaml.rs
//! Writes InvokeAI's `configs/models.yaml`.
//!
//! Every model is listed once without a VAE and once per VAE, keyed
//! `<model>-noVae` / `<model>-<vae>`. The entry matching the current
//! selection is marked `default: true`. Callers compare
//! [`models_yaml_hash`] before and after writing to decide whether the
//! backend needs a restart; default lines are left out of that hash.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::error::{Error, Result};
use crate::event_utils::{emit_models_disabled, EventSink};
use crate::hashing::{hash_text, HashAlgorithm};
use crate::model_manager::{
    list_models, get_model, matches_wildcard, verify_models_with_pseudo_hash,
    Model, ModelType, ModelVerifier,
};
use super::generation_job::JobCanceller;

pub const DEFAULT_KEY_MARKER: &str = "    default: ";
pub const INPAINTING_WILDCARD: &str = "*-inpainting.*";
pub const ENTRY_WIDTH: u32 = 512;
pub const ENTRY_HEIGHT: u32 = 512;
pub const UNSAFE_SELECTION_REASON: &str = "Selected model appears to contain malware.";

const V1_INFERENCE_CONFIG: &str = "configs/stable-diffusion/v1-inference.yaml";
const V1_INPAINTING_CONFIG: &str = "configs/stable-diffusion/v1-inpainting-inference.yaml";

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// The well-known manifest location the backend reads on startup.
pub fn models_yaml_path(config: &AppConfig) -> PathBuf {
    config.sd_repo_path().join("configs").join("models.yaml")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub key: String,
    pub config: String,
    pub weights: String,
    pub vae: Option<String>,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub is_default: bool,
}

impl ManifestEntry {
    pub fn render(&self) -> String {
        let mut text = format!(
            "{}:\n    config: {}\n    weights: {}\n",
            self.key, self.config, self.weights
        );
        if let Some(vae) = &self.vae {
            text.push_str(&format!("    vae: {}\n", vae));
        }
        text.push_str(&format!(
            "    description: {}\n    width: {}\n    height: {}\n{}{}\n",
            self.description, self.width, self.height, DEFAULT_KEY_MARKER, self.is_default
        ));
        text
    }
}

pub fn render_manifest(entries: &[ManifestEntry]) -> String {
    entries.iter().map(|e| format!("{}\n", e.render())).collect()
}

/// `<model name>-noVae` or `<model name>-<vae name>`.
pub fn model_name_for_yaml(model: &Model, vae: Option<&Model>) -> String {
    match vae {
        None => format!("{}-noVae", model.name),
        Some(vae) => format!("{}-{}", model.name, vae.name),
    }
}

/// Exact full-path match on the model, and on the VAE when one is selected.
/// No selected VAE only matches the no-VAE entry.
pub fn is_model_default(
    model: &Model,
    vae: Option<&Model>,
    selected_model: Option<&Model>,
    selected_vae: Option<&Model>,
) -> bool {
    let Some(selected_model) = selected_model else {
        return false;
    };
    let model_match = model.full_path == selected_model.full_path;
    let vae_match = match (selected_vae, vae) {
        (None, None) => true,
        (Some(selected), Some(vae)) => selected.full_path == vae.full_path,
        _ => false,
    };
    model_match && vae_match
}

// YAML single-quoted scalar, backslashes in Windows paths stay literal.
fn quote_path(path: &str) -> String {
    format!("'{}'", path.replace('\'', "''"))
}

fn sidecar_config_path(model: &Model) -> PathBuf {
    let mut path: OsString = model.full_path.clone().into_os_string();
    path.push(".yaml");
    PathBuf::from(path)
}

fn is_inpainting_model(model: &Model) -> bool {
    matches_wildcard(&model.name, INPAINTING_WILDCARD)
}

fn resolve_config_file(model: &Model, inpainting: bool) -> String {
    let sidecar = sidecar_config_path(model);
    if sidecar.is_file() {
        quote_path(&sidecar.to_string_lossy())
    } else if inpainting {
        V1_INPAINTING_CONFIG.to_string()
    } else {
        V1_INFERENCE_CONFIG.to_string()
    }
}

/// Builds one entry per model and VAE choice, the no-VAE choice first.
pub fn build_manifest_entries(
    models: &[Model],
    vaes: &[Model],
    selected_model: Option<&Model>,
    selected_vae: Option<&Model>,
    inpainting_enabled: bool,
) -> Vec<ManifestEntry> {
    let vae_choices: Vec<Option<&Model>> = std::iter::once(None).chain(vaes.iter().map(Some)).collect();
    let mut entries = Vec::with_capacity(models.len() * vae_choices.len());

    for model in models {
        let inpainting = is_inpainting_model(model);
        if inpainting && !inpainting_enabled {
            debug!("[MODELS_YAML] Skipping inpainting model {} (feature disabled)", model.name);
            continue;
        }
        let config_file = resolve_config_file(model, inpainting);

        for vae in &vae_choices {
            let vae = *vae;
            entries.push(ManifestEntry {
                key: model_name_for_yaml(model, vae),
                config: config_file.clone(),
                weights: quote_path(&model.full_name()),
                vae: vae.filter(|v| v.exists()).map(|v| quote_path(&v.full_name())),
                description: model.name.clone(),
                width: ENTRY_WIDTH,
                height: ENTRY_HEIGHT,
                is_default: is_model_default(model, vae, selected_model, selected_vae),
            });
        }
    }
    entries
}

#[derive(Debug, Clone, Default)]
pub struct ModelsYamlRequest<'a> {
    pub selected_model: Option<&'a Model>,
    pub selected_vae: Option<&'a Model>,
    /// Empty or absent catalogs are scanned from the configured directories.
    pub cached_models: Option<Vec<Model>>,
    pub cached_vaes: Option<Vec<Model>>,
}

#[derive(Debug, Clone)]
pub struct ManifestOutcome {
    pub path: PathBuf,
    pub text: String,
    pub entries: Vec<ManifestEntry>,
    pub excluded_unsafe: Vec<Model>,
}

/// Generates and writes the full manifest. Only one writer per manifest
/// file at a time; nothing here locks it.
pub struct ModelsYamlWriter<'a> {
    config: &'a AppConfig,
    verifier: &'a dyn ModelVerifier,
    canceller: &'a dyn JobCanceller,
    events: &'a dyn EventSink,
}

impl<'a> ModelsYamlWriter<'a> {
    pub fn new(
        config: &'a AppConfig,
        verifier: &'a dyn ModelVerifier,
        canceller: &'a dyn JobCanceller,
        events: &'a dyn EventSink,
    ) -> Self {
        ModelsYamlWriter { config, verifier, canceller, events }
    }

    pub async fn write_models_yaml_all(&self, request: ModelsYamlRequest<'_>) -> Result<ManifestOutcome> {
        let mut models = match request.cached_models {
            Some(models) if !models.is_empty() => models,
            _ => list_models(self.config, ModelType::Normal),
        };
        let mut vaes = match request.cached_vaes {
            Some(vaes) if !vaes.is_empty() => vaes,
            _ => list_models(self.config, ModelType::Vae),
        };

        let mut excluded_unsafe = Vec::new();
        if !self.config.disable_pickle_scanner {
            info!("[MODELS_YAML] Preparing model files...");
            let all: Vec<Model> = models.iter().chain(vaes.iter()).cloned().collect();
            let partition = verify_models_with_pseudo_hash(self.verifier, &all).await?;
            excluded_unsafe = partition.unsafe_models;

            if !excluded_unsafe.is_empty() {
                models.retain(|m| !excluded_unsafe.iter().any(|u| u.full_path == m.full_path));
                vaes.retain(|v| !excluded_unsafe.iter().any(|u| u.full_path == v.full_path));

                let names: Vec<String> = excluded_unsafe.iter().map(|m| m.name.clone()).collect();
                warn!(
                    "[MODELS_YAML] The following model files were disabled because they might be malicious:\n{}",
                    names.join("\n")
                );
                emit_models_disabled(self.events, names, "might be malicious");

                if let Some(selected) = request.selected_model {
                    if excluded_unsafe.iter().any(|u| u.full_path == selected.full_path) {
                        self.canceller.cancel(UNSAFE_SELECTION_REASON);
                        return Err(Error::SelectedModelUnsafe(selected.name.clone()));
                    }
                }
            }
        }

        let entries = build_manifest_entries(
            &models,
            &vaes,
            request.selected_model,
            request.selected_vae,
            self.config.features.runwayml_inpainting,
        );
        let text = render_manifest(&entries);
        let path = models_yaml_path(self.config);
        write_manifest_file(&path, &text).await?;

        info!(
            "[MODELS_YAML] Wrote {} entries for {} model(s) and {} VAE(s) to {}",
            entries.len(),
            models.len(),
            vaes.len(),
            path.display()
        );
        Ok(ManifestOutcome { path, text, entries, excluded_unsafe })
    }
}

async fn write_manifest_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    Ok(())
}

/// Writes a manifest holding just the given model under `key_name`.
pub fn write_models_yaml(
    config: &AppConfig,
    model: Option<&Model>,
    vae: Option<&Model>,
    key_name: &str,
) -> Result<String> {
    let weights = match model {
        Some(model) => quote_path(&model.full_name()),
        None => format!("unknown.{}", ModelType::Normal.valid_extensions()[0]),
    };
    let entry = ManifestEntry {
        key: key_name.to_string(),
        config: V1_INFERENCE_CONFIG.to_string(),
        weights,
        vae: vae.filter(|v| v.exists()).map(|v| quote_path(&v.full_name())),
        description: "Current model".to_string(),
        width: ENTRY_WIDTH,
        height: ENTRY_HEIGHT,
        is_default: true,
    };
    let text = entry.render();
    let path = models_yaml_path(config);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &text)?;
    info!("[MODELS_YAML] Wrote single-model manifest '{}' to {}", key_name, path.display());
    Ok(text)
}

/// Same as [`write_models_yaml`], looking both names up in the catalog first.
pub fn write_models_yaml_by_name(
    config: &AppConfig,
    model_name: &str,
    vae_name: &str,
    key_name: &str,
) -> Result<String> {
    let model = get_model(config, model_name, ModelType::Normal);
    if model.is_none() && !model_name.is_empty() {
        warn!("[MODELS_YAML] Model '{}' not found, writing placeholder weights", model_name);
    }
    let vae = get_model(config, vae_name, ModelType::Vae);
    write_models_yaml(config, model.as_ref(), vae.as_ref(), key_name)
}

/// Hashes the manifest, optionally without its `default:` lines, joined
/// with the platform newline.
pub fn models_yaml_hash(path: &Path, algorithm: HashAlgorithm, ignore_default_key: bool) -> Result<String> {
    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !ignore_default_key || !line.contains(DEFAULT_KEY_MARKER))
        .collect();
    Ok(hash_text(&lines.join(LINE_ENDING), algorithm))
}
