//! The compute capability invoked for each job.
//!
//! From the worker's point of view compute is a pure function of the
//! payload bytes and a model reference. It runs on the blocking pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("model {model:?} unavailable: {reason}")]
    Model { model: String, reason: String },

    #[error("evaluation failed: {0}")]
    Evaluate(String),

    #[error("compute task aborted: {0}")]
    Aborted(String),
}

/// `evaluate(image_bytes, model_reference) → outcome`.
pub trait ComputeCapability: Send + Sync {
    fn evaluate(&self, image: &[u8], model_reference: &str) -> Result<String, ComputeError>;
}

impl<F> ComputeCapability for F
where
    F: Fn(&[u8], &str) -> Result<String, ComputeError> + Send + Sync,
{
    fn evaluate(&self, image: &[u8], model_reference: &str) -> Result<String, ComputeError> {
        self(image, model_reference)
    }
}

/// Label lookup by payload digest.
///
/// A model file is a JSON object mapping lowercase SHA-256 hex digests of
/// payloads to labels. Payloads with no entry evaluate to `"unknown"`.
/// Models are resolved relative to `model_dir` and cached after first use.
pub struct DigestLookup {
    model_dir: PathBuf,
    models: Mutex<HashMap<String, Arc<HashMap<String, String>>>>,
}

impl DigestLookup {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            models: Mutex::new(HashMap::new()),
        }
    }

    fn model(&self, reference: &str) -> Result<Arc<HashMap<String, String>>, ComputeError> {
        let mut models = self
            .models
            .lock()
            .map_err(|e| ComputeError::Aborted(e.to_string()))?;
        if let Some(model) = models.get(reference) {
            return Ok(Arc::clone(model));
        }

        let path = self.model_dir.join(reference);
        let model_err = |reason: String| ComputeError::Model {
            model: reference.to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(&path).map_err(|e| model_err(e.to_string()))?;
        let table: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| model_err(e.to_string()))?;
        info!(model = %reference, labels = table.len(), "model loaded");

        let table = Arc::new(table);
        models.insert(reference.to_string(), Arc::clone(&table));
        Ok(table)
    }
}

impl ComputeCapability for DigestLookup {
    fn evaluate(&self, image: &[u8], model_reference: &str) -> Result<String, ComputeError> {
        if image.is_empty() {
            return Err(ComputeError::Evaluate("empty payload".to_string()));
        }
        let model = self.model(model_reference)?;
        let digest = hex::encode(Sha256::digest(image));
        let label = model
            .get(&digest)
            .cloned()
            .unwrap_or_else(|| Self::UNKNOWN.to_string());
        debug!(%digest, %label, "payload evaluated");
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_model(dir: &std::path::Path, name: &str, entries: &[(&[u8], &str)]) {
        let table: HashMap<String, String> = entries
            .iter()
            .map(|(bytes, label)| (hex::encode(Sha256::digest(bytes)), label.to_string()))
            .collect();
        std::fs::write(dir.join(name), serde_json::to_string(&table).unwrap()).unwrap();
    }

    #[test]
    fn known_payload_maps_to_label() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "data.pt", &[(b"face-of-paul", "Paul")]);
        let lookup = DigestLookup::new(dir.path());

        assert_eq!(lookup.evaluate(b"face-of-paul", "data.pt").unwrap(), "Paul");
        assert_eq!(lookup.evaluate(b"someone-else", "data.pt").unwrap(), "unknown");
    }

    #[test]
    fn model_is_cached_after_first_load() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "data.pt", &[(b"x", "Ada")]);
        let lookup = DigestLookup::new(dir.path());
        lookup.evaluate(b"x", "data.pt").unwrap();

        std::fs::remove_file(dir.path().join("data.pt")).unwrap();
        assert_eq!(lookup.evaluate(b"x", "data.pt").unwrap(), "Ada");
    }

    #[test]
    fn missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = DigestLookup::new(dir.path());
        let err = lookup.evaluate(b"x", "absent.pt").unwrap_err();
        assert!(matches!(err, ComputeError::Model { .. }));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = DigestLookup::new(dir.path());
        assert!(matches!(lookup.evaluate(b"", "data.pt"), Err(ComputeError::Evaluate(_))));
    }

    #[test]
    fn closures_are_capabilities() {
        let upper = |image: &[u8], _model: &str| -> Result<String, ComputeError> {
            Ok(String::from_utf8_lossy(image).to_uppercase())
        };
        assert_eq!(upper.evaluate(b"abc", "m").unwrap(), "ABC");
    }
}
