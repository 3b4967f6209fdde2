use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use log::{error, info};

pub mod app_config;
pub mod error;
pub mod event_utils;
pub mod hashing;
pub mod invoke_ai;
pub mod logging;
pub mod model_manager;
pub mod prompt_syntax;

use app_config::AppConfig;
use error::{Error, Result};
use event_utils::LogEventSink;
use hashing::HashAlgorithm;
use invoke_ai::{models_yaml_hash, models_yaml_path, GenerationJob, ModelsYamlRequest, ModelsYamlWriter};
use model_manager::{get_model, ModelType, PickleScanVerifier};

pub use prompt_syntax::convert_old_attention_syntax;

const CONFIG_ENV_VAR: &str = "INVOKEAI_BRIDGE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "invokeai-bridge.yaml";

const USAGE: &str = "usage:
  invokeai-bridge convert-prompt <prompt...>
  invokeai-bridge write-manifest <model name> [vae name]
  invokeai-bridge write-single <model name> [vae name] [key]
  invokeai-bridge manifest-hash [--include-default] [--blake3]";

pub fn run() -> ExitCode {
  let app_start_time = std::time::Instant::now();
  let args: Vec<String> = std::env::args().skip(1).collect();

  let config_path = std::env::var(CONFIG_ENV_VAR)
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

  let config = match AppConfig::load(&config_path) {
      Ok(config) => config,
      Err(e) => {
          eprintln!("Failed to load config {}: {}", config_path.display(), e);
          return ExitCode::FAILURE;
      }
  };

  if let Err(e) = logging::init_logging(Path::new("log4rs.yaml"), &config.data_path.join("logs")) {
      eprintln!("Failed to initialize logging: {}", e);
  }
  info!("[STARTUP] OS: {}, Arch: {}", std::env::consts::OS, std::env::consts::ARCH);

  let result = match args.first().map(String::as_str) {
      Some("convert-prompt") => {
          println!("{}", convert_old_attention_syntax(&args[1..].join(" ")));
          Ok(())
      }
      Some("write-manifest") => write_manifest_command(&config, &args[1..]),
      Some("write-single") => {
          let model_name = args.get(1).map(String::as_str).unwrap_or("");
          let vae_name = args.get(2).map(String::as_str).unwrap_or("");
          let key = args.get(3).map(String::as_str).unwrap_or("default");
          invoke_ai::write_models_yaml_by_name(&config, model_name, vae_name, key).map(|_| ())
      }
      Some("manifest-hash") => {
          let ignore_default_key = !args.iter().any(|a| a == "--include-default");
          let algorithm = if args.iter().any(|a| a == "--blake3") {
              HashAlgorithm::Blake3
          } else {
              HashAlgorithm::Crc32
          };
          models_yaml_hash(&models_yaml_path(&config), algorithm, ignore_default_key).map(|hash| println!("{}", hash))
      }
      _ => {
          eprintln!("{}", USAGE);
          return ExitCode::from(2);
      }
  };

  info!("[LIFECYCLE] Finished in {:?}", app_start_time.elapsed());
  match result {
      Ok(()) => ExitCode::SUCCESS,
      Err(e) => {
          error!("[LIFECYCLE] {}", e);
          eprintln!("{}", e);
          ExitCode::FAILURE
      }
  }
}

// Writes the full manifest and reports whether the backend must restart.
fn write_manifest_command(config: &AppConfig, args: &[String]) -> Result<()> {
  let model_name = args.first().ok_or_else(|| Error::ModelNotFound("no model name given".to_string()))?;
  let selected_model = get_model(config, model_name, ModelType::Normal)
      .ok_or_else(|| Error::ModelNotFound(model_name.clone()))?;
  let selected_vae = match args.get(1) {
      Some(name) => Some(get_model(config, name, ModelType::Vae).ok_or_else(|| Error::ModelNotFound(name.clone()))?),
      None => None,
  };

  let manifest_path = models_yaml_path(config);
  let hash_before = models_yaml_hash(&manifest_path, HashAlgorithm::Crc32, true).ok();

  let events = Arc::new(LogEventSink);
  let job = GenerationJob::new(events.clone());
  let verifier = PickleScanVerifier::from_config(config);
  let writer = ModelsYamlWriter::new(config, &verifier, &job, events.as_ref());

  let runtime = tokio::runtime::Runtime::new()?;
  let outcome = runtime.block_on(writer.write_models_yaml_all(ModelsYamlRequest {
      selected_model: Some(&selected_model),
      selected_vae: selected_vae.as_ref(),
      ..Default::default()
  }))?;

  let hash_after = models_yaml_hash(&outcome.path, HashAlgorithm::Crc32, true)?;
  let restart_needed = hash_before.as_deref() != Some(hash_after.as_str());
  info!(
      "[MODELS_YAML] {} entries, {} excluded, restart needed: {}",
      outcome.entries.len(),
      outcome.excluded_unsafe.len(),
      restart_needed
  );
  println!("{}", if restart_needed { "restart" } else { "unchanged" });
  Ok(())
}
