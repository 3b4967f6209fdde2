// invokeai-bridge/src/model_manager/types.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Normal, // Stable Diffusion checkpoint
    Vae,
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Normal
    }
}

impl ModelType {
    /// File extensions (lowercase, without dot) accepted for this type.
    pub fn valid_extensions(&self) -> &'static [&'static str] {
        match self {
            ModelType::Normal => &["ckpt", "safetensors"],
            ModelType::Vae => &["ckpt", "pt", "safetensors"],
        }
    }
}

/// A model file on disk. `name` is the file name including its extension.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    pub full_path: PathBuf,
    #[serde(default)]
    pub model_type: ModelType,
}

impl Model {
    pub fn new(full_path: impl Into<PathBuf>, model_type: ModelType) -> Self {
        let full_path = full_path.into();
        let name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Model { name, full_path, model_type }
    }

    pub fn path(&self) -> &Path {
        &self.full_path
    }

    pub fn exists(&self) -> bool {
        self.full_path.is_file()
    }

    /// Path as written into the manifest.
    pub fn full_name(&self) -> String {
        self.full_path.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_taken_from_file_name() {
        let model = Model::new("/models/sd-v1-5.ckpt", ModelType::Normal);
        assert_eq!(model.name, "sd-v1-5.ckpt");
        assert_eq!(model.full_name(), "/models/sd-v1-5.ckpt");
        assert!(!model.exists());
    }
}
