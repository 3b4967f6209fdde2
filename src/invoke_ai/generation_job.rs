// invokeai-bridge/src/invoke_ai/generation_job.rs
use std::sync::{Arc, Mutex};
use log::{info, warn};
use uuid::Uuid;

use crate::event_utils::{emit_generation_cancelled, EventSink};

/// Cancels the in-flight generation job with a human-readable reason.
pub trait JobCanceller: Send + Sync {
    fn cancel(&self, reason: &str);
}

/// Handle for one text-to-image run.
pub struct GenerationJob {
    id: String,
    cancel_reason: Mutex<Option<String>>,
    events: Arc<dyn EventSink>,
}

impl GenerationJob {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        GenerationJob {
            id: Uuid::new_v4().to_string(),
            cancel_reason: Mutex::new(None),
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.lock().map(|r| r.is_some()).unwrap_or(true)
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel_reason.lock().ok().and_then(|r| r.clone())
    }
}

impl JobCanceller for GenerationJob {
    // First reason sticks; later cancels are logged and ignored.
    fn cancel(&self, reason: &str) {
        let mut guard = match self.cancel_reason.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = guard.as_ref() {
            warn!("[GENERATION] Job {} already cancelled ({}), ignoring: {}", self.id, existing, reason);
            return;
        }
        *guard = Some(reason.to_string());
        drop(guard);

        info!("[GENERATION] Cancelling job {}: {}", self.id, reason);
        emit_generation_cancelled(self.events.as_ref(), &self.id, reason);
    }
}
