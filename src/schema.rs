//! Composite schema assembly and the bounded per-discriminator cache
//!
//! The document-level schema is assembled from the per-section fragment
//! providers in [`crate::registry`], compiled once, and memoized per model
//! type. Assembly is a pure function of the discriminator, so racing cache
//! misses at worst duplicate the build.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use jsonschema::JSONSchema;
use serde_json::{json, Value};

use crate::constants::{
    COMBINER, DEFAULTS, HYPEROPT, INPUT_FEATURES, MODEL_TYPE, OUTPUT_FEATURES, PREPROCESSING,
    TRAINER, VERSION_KEY,
};
use crate::error::{Result, StructuralError};
use crate::registry;
use crate::validator;

/// A compiled document-level schema for one model type.
///
/// Immutable once built; shared between callers via `Arc`.
#[derive(Debug)]
pub struct AssembledSchema {
    model_type: String,
    raw: Value,
    compiled: JSONSchema,
}

impl AssembledSchema {
    /// Assemble and compile the composite schema for a model type.
    pub fn assemble(model_type: &str) -> Result<Self> {
        let raw = json!({
            "type": "object",
            "properties": {
                MODEL_TYPE: registry::model_type_fragment(),
                INPUT_FEATURES: registry::input_features_fragment(),
                OUTPUT_FEATURES: registry::output_features_fragment(),
                COMBINER: registry::combiner_fragment(),
                TRAINER: registry::trainer_fragment(model_type)?,
                PREPROCESSING: registry::preprocessing_fragment(),
                HYPEROPT: registry::hyperopt_fragment(),
                DEFAULTS: registry::defaults_fragment(),
                VERSION_KEY: { "type": "string" },
            },
            "definitions": {},
            "required": [INPUT_FEATURES, OUTPUT_FEATURES],
        });
        let compiled = validator::compile(&raw)?;
        Ok(Self {
            model_type: model_type.to_string(),
            raw,
            compiled,
        })
    }

    /// The discriminator this schema was assembled for.
    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    /// The schema document itself.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Validate a canonicalized document instance (first mismatch only).
    pub fn validate_instance(&self, instance: &Value) -> std::result::Result<(), StructuralError> {
        validator::check_instance(&self.compiled, instance)
    }
}

/// Bounded LRU cache of assembled schemas, keyed by model type.
///
/// Capacity defaults to 2: only two model types are registered, and the
/// cache must not grow in long-running services. A miss is a cheap rebuild.
pub struct SchemaCache {
    capacity: usize,
    entries: Mutex<VecDeque<(String, Arc<AssembledSchema>)>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::with_capacity(2)
    }

    /// Revisit the capacity here if the model-type registry grows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Get the assembled schema for a model type, building it on a miss.
    pub fn get(&self, model_type: &str) -> Result<Arc<AssembledSchema>> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let pos = entries.iter().position(|(key, _)| key == model_type);
            if let Some(entry) = pos.and_then(|pos| entries.remove(pos)) {
                let schema = Arc::clone(&entry.1);
                entries.push_front(entry);
                return Ok(schema);
            }
        }

        // Built outside the lock: assembly is pure, so a concurrent miss for
        // the same model type duplicates work at worst.
        let schema = Arc::new(AssembledSchema::assemble(model_type)?);

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !entries.iter().any(|(key, _)| key == model_type) {
            entries.push_front((model_type.to_string(), Arc::clone(&schema)));
            entries.truncate(self.capacity);
        }
        Ok(schema)
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MODEL_ECD, MODEL_GBM};
    use crate::error::ConfigValidationError;

    #[test]
    fn test_composite_schema_has_fixed_property_set() {
        for model_type in [MODEL_ECD, MODEL_GBM] {
            let schema = AssembledSchema::assemble(model_type).unwrap();
            let properties = schema.raw()["properties"].as_object().unwrap();
            for key in [
                MODEL_TYPE,
                INPUT_FEATURES,
                OUTPUT_FEATURES,
                COMBINER,
                TRAINER,
                PREPROCESSING,
                HYPEROPT,
                DEFAULTS,
            ] {
                assert!(properties.contains_key(key), "{model_type} missing {key}");
            }
            assert_eq!(
                schema.raw()["required"],
                json!([INPUT_FEATURES, OUTPUT_FEATURES])
            );
        }
    }

    #[test]
    fn test_assembled_schema_is_debuggable() {
        let schema = AssembledSchema::assemble(MODEL_ECD).unwrap();
        assert!(format!("{schema:?}").contains("ecd"));
    }

    #[test]
    fn test_assemble_rejects_unknown_model_type() {
        let err = AssembledSchema::assemble("unknown").unwrap_err();
        assert!(matches!(err, ConfigValidationError::UnknownModelType(_)));
    }

    #[test]
    fn test_cache_returns_identical_schema_across_calls() {
        let cache = SchemaCache::new();
        let first = cache.get(MODEL_ECD).unwrap();
        let second = cache.get(MODEL_ECD).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let cache = SchemaCache::with_capacity(2);
        let ecd = cache.get(MODEL_ECD).unwrap();
        cache.get(MODEL_GBM).unwrap();
        // Touch ecd so gbm is the eviction candidate.
        cache.get(MODEL_ECD).unwrap();

        // Force an eviction by reinserting gbm after filling with ecd again;
        // with capacity 2 both registered types stay resident.
        assert_eq!(cache.len(), 2);
        let ecd_again = cache.get(MODEL_ECD).unwrap();
        assert!(Arc::ptr_eq(&ecd, &ecd_again));
    }

    #[test]
    fn test_cache_bounded_at_capacity_one() {
        let cache = SchemaCache::with_capacity(1);
        let first = cache.get(MODEL_ECD).unwrap();
        cache.get(MODEL_GBM).unwrap();
        assert_eq!(cache.len(), 1);

        // ecd was evicted, so a fresh instance is built.
        let rebuilt = cache.get(MODEL_ECD).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(first.raw(), rebuilt.raw());
    }

    #[test]
    fn test_unknown_model_type_is_not_cached() {
        let cache = SchemaCache::new();
        assert!(cache.get("unknown").is_err());
        assert!(cache.is_empty());
    }
}
