//! The validation pipeline entry point
//!
//! Stages run strictly in order and fail fast: upgrade, split resolution and
//! validation, discriminator extraction, schema acquisition, structural
//! validation under a narrow mutex, then the semantic check suite. A
//! document either passes every stage or validation fails as a whole; there
//! is no warn-and-continue and no retry (validation is a pure decision).

use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde_yaml::Value;
use tracing::debug;

use crate::checks;
use crate::constants::{MODEL_ECD, MODEL_TYPE, PREPROCESSING, SPLIT};
use crate::document::to_validation_instance;
use crate::error::Result;
use crate::schema::SchemaCache;
use crate::splitters::get_splitter;
use crate::upgrade::upgrade_config_to_latest_version;

static GLOBAL_CONTEXT: Lazy<ValidationContext> = Lazy::new(ValidationContext::new);

/// Validate a configuration document against the process-wide context.
///
/// Returns nothing on success; the internally upgraded document is not
/// exposed. Callers that need the upgraded form should call
/// [`upgrade_config_to_latest_version`] themselves.
pub fn validate_config(config: &Value) -> Result<()> {
    ValidationContext::global().validate_config(config)
}

/// Shared state of the validation pipeline: the bounded schema cache and the
/// structural-validation mutex. Injectable so tests can run against isolated
/// caches instead of the process-wide singleton.
pub struct ValidationContext {
    schemas: SchemaCache,
    structural_lock: Mutex<()>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self {
            schemas: SchemaCache::new(),
            structural_lock: Mutex::new(()),
        }
    }

    /// The lazily-initialized process-wide context.
    pub fn global() -> &'static ValidationContext {
        &GLOBAL_CONTEXT
    }

    /// The schema cache backing this context.
    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    /// Run the full pipeline against one document.
    pub fn validate_config(&self, config: &Value) -> Result<()> {
        // Upgrade first so every later stage sees the current key shape.
        // Returns a new document; the caller's value is untouched.
        let upgraded = upgrade_config_to_latest_version(config)?;

        // Split validation precedes structural validation: downstream stages
        // assume a resolvable split strategy exists.
        let empty_split = Value::Mapping(Default::default());
        let split = upgraded
            .get(PREPROCESSING)
            .and_then(|p| p.get(SPLIT))
            .unwrap_or(&empty_split);
        let splitter = get_splitter(split)?;
        splitter.validate(&upgraded)?;

        let model_type = upgraded
            .get(MODEL_TYPE)
            .and_then(Value::as_str)
            .unwrap_or(MODEL_ECD);
        let schema = self.schemas.get(model_type)?;

        // Canonicalization happens outside the lock; only the structural
        // validation call itself is serialized.
        let instance = to_validation_instance(&upgraded)?;
        {
            // Structural validation races on the compiled schema's lazy
            // reference-resolution state when first exercised from multiple
            // threads, which can intermittently fail to resolve a schema
            // fragment. Serializing exactly this call avoids it; do not
            // widen the critical section or remove it.
            let _guard = self
                .structural_lock
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            schema.validate_instance(&instance)?;
        }

        checks::run_all(&upgraded)?;
        debug!(model_type, "configuration accepted");
        Ok(())
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigValidationError;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    const VALID: &str = "input_features:\n  - name: age\n    type: number\noutput_features:\n  - name: income\n    type: binary\n";

    #[test]
    fn test_valid_config_accepted() {
        let ctx = ValidationContext::new();
        assert!(ctx.validate_config(&doc(VALID)).is_ok());
    }

    #[test]
    fn test_split_error_surfaces_before_structural_error() {
        // output_features is missing (structural) and the split is invalid;
        // the split error wins because its stage runs first.
        let config = doc(
            "input_features:\n  - name: age\n    type: number\npreprocessing:\n  split:\n    type: bogus\n",
        );
        let err = ValidationContext::new().validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigValidationError::SplitConfig(_)));
    }

    #[test]
    fn test_structural_error_surfaces_before_semantic_error() {
        // Duplicate names (semantic) and a bad feature type (structural):
        // the structural stage runs first.
        let config = doc(
            "input_features:\n  - name: age\n    type: mystery\n  - name: age\n    type: number\noutput_features:\n  - name: income\n    type: binary\n",
        );
        let err = ValidationContext::new().validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigValidationError::Structural(_)));
    }

    #[test]
    fn test_unknown_model_type_rejected() {
        let config = doc(&format!("{VALID}model_type: llm\n"));
        let err = ValidationContext::new().validate_config(&config).unwrap_err();
        // Assembly fails on the unregistered discriminator before structural
        // validation gets a chance to flag the enum mismatch.
        assert!(matches!(err, ConfigValidationError::UnknownModelType(t) if t == "llm"));
    }

    #[test]
    fn test_caller_document_not_mutated() {
        let config = doc("training:\n  epochs: 2\ninput_features:\n  - name: age\n    type: number\noutput_features:\n  - name: income\n    type: binary\n");
        let before = config.clone();
        let _ = ValidationContext::new().validate_config(&config);
        assert_eq!(config, before);
    }
}
