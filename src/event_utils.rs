// invokeai-bridge/src/event_utils.rs
use log::{error, info};
use serde::Serialize;
use serde_json::Value;

/// Receives named events for the front end.
pub trait EventSink: Send + Sync {
    fn emit(&self, event_name: &str, payload: Value);
}

/// Sink that only writes events to the log.
#[derive(Debug, Default, Clone)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event_name: &str, payload: Value) {
        info!("[EVENT] {}: {}", event_name, payload);
    }
}

// --- Event Payloads ---

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelsDisabledPayload {
    pub model_names: Vec<String>,
    pub reason: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCancelledPayload {
    pub job_id: String,
    pub reason: String,
}

// Generic event emitter
pub fn emit_event<S: Serialize>(sink: &dyn EventSink, event_name: &str, payload: S) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit(event_name, value),
        Err(e) => error!("Failed to serialize payload for event '{}': {}", event_name, e),
    }
}

pub fn emit_models_disabled(sink: &dyn EventSink, model_names: Vec<String>, reason: &str) {
    let payload = ModelsDisabledPayload {
        model_names,
        reason: reason.to_string(),
    };
    emit_event(sink, "models-disabled", payload);
}

pub fn emit_generation_cancelled(sink: &dyn EventSink, job_id: &str, reason: &str) {
    let payload = GenerationCancelledPayload {
        job_id: job_id.to_string(),
        reason: reason.to_string(),
    };
    emit_event(sink, "generation-cancelled", payload);
}
