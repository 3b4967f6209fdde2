// invokeai-bridge/src/invoke_ai/mod.rs

pub mod generation_job;
pub mod models_yaml;

pub use generation_job::{
    GenerationJob,
    JobCanceller,
};

pub use models_yaml::{
    ManifestEntry,
    ManifestOutcome,
    ModelsYamlRequest,
    ModelsYamlWriter,
    build_manifest_entries,
    is_model_default,
    model_name_for_yaml,
    models_yaml_hash,
    models_yaml_path,
    render_manifest,
    write_models_yaml,
    write_models_yaml_by_name,
};
