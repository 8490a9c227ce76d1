//! Per-section schema fragment providers
//!
//! Each section of the composite document schema comes from one provider
//! function returning a Draft-7 fragment as JSON. Providers are pure
//! functions of their inputs; the assembler relies on that for cache
//! correctness. The trainer provider dispatches on the model-type
//! discriminator with an explicit unknown-discriminator error rather than a
//! silent fallback.

use serde_json::{json, Value};

use crate::constants::{
    COMBINER_TYPES, HYPEROPT_SPACES, INPUT_FEATURE_TYPES, MODEL_ECD, MODEL_GBM, MODEL_TYPES,
    OUTPUT_FEATURE_TYPES, SPLIT_TYPES,
};
use crate::error::ConfigValidationError;

/// Fragment for the `model_type` key.
pub fn model_type_fragment() -> Value {
    json!({
        "type": "string",
        "enum": MODEL_TYPES,
        "default": MODEL_ECD,
    })
}

/// Fragment for the `input_features` list.
pub fn input_features_fragment() -> Value {
    json!({
        "type": "array",
        "minItems": 1,
        "items": {
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "type": { "type": "string", "enum": INPUT_FEATURE_TYPES },
                "column": { "type": "string" },
                "tied": { "type": ["string", "null"] },
                "encoder": { "type": "object" },
                "preprocessing": { "type": "object" },
            },
            "required": ["name", "type"],
            "additionalProperties": true,
        },
    })
}

/// Fragment for the `output_features` list.
pub fn output_features_fragment() -> Value {
    json!({
        "type": "array",
        "minItems": 1,
        "items": {
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "type": { "type": "string", "enum": OUTPUT_FEATURE_TYPES },
                "column": { "type": "string" },
                "decoder": { "type": "object" },
                "loss": { "type": "object" },
                "dependencies": {
                    "type": "array",
                    "items": { "type": "string" },
                },
                "preprocessing": { "type": "object" },
            },
            "required": ["name", "type"],
            "additionalProperties": true,
        },
    })
}

/// Fragment for the `combiner` section.
pub fn combiner_fragment() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "enum": COMBINER_TYPES },
        },
        "additionalProperties": true,
    })
}

/// Fragment for the `trainer` section, dispatched on the model type.
pub fn trainer_fragment(model_type: &str) -> Result<Value, ConfigValidationError> {
    match model_type {
        MODEL_ECD => Ok(json!({
            "type": "object",
            "properties": {
                "epochs": { "type": "integer", "minimum": 1 },
                "train_steps": { "type": "integer", "minimum": 1 },
                "batch_size": { "type": "integer", "minimum": 1 },
                "eval_batch_size": { "type": ["integer", "null"], "minimum": 1 },
                "learning_rate": { "type": "number", "exclusiveMinimum": 0 },
                "early_stop": { "type": "integer", "minimum": -1 },
                "validation_field": { "type": "string" },
                "validation_metric": { "type": "string" },
                "optimizer": {
                    "type": "object",
                    "properties": {
                        "type": {
                            "type": "string",
                            "enum": ["sgd", "adam", "adamw", "adagrad", "rmsprop"],
                        },
                    },
                    "additionalProperties": true,
                },
                "learning_rate_scheduler": {
                    "type": "object",
                    "properties": {
                        "warmup_steps": { "type": "integer", "minimum": 0 },
                        "decay": { "type": ["string", "null"] },
                    },
                    "additionalProperties": true,
                },
            },
            "additionalProperties": true,
        })),
        MODEL_GBM => Ok(json!({
            "type": "object",
            "properties": {
                "num_boost_round": { "type": "integer", "minimum": 1 },
                "learning_rate": { "type": "number", "exclusiveMinimum": 0 },
                "max_depth": { "type": "integer" },
                "num_leaves": { "type": "integer", "minimum": 2 },
                "early_stop": { "type": "integer", "minimum": -1 },
                "validation_field": { "type": "string" },
                "validation_metric": { "type": "string" },
            },
            "additionalProperties": true,
        })),
        other => Err(ConfigValidationError::UnknownModelType(other.to_string())),
    }
}

/// Fragment for the `preprocessing` section.
pub fn preprocessing_fragment() -> Value {
    json!({
        "type": "object",
        "properties": {
            "split": {
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": SPLIT_TYPES },
                    "probabilities": {
                        "type": "array",
                        "items": { "type": "number", "minimum": 0 },
                        "minItems": 3,
                        "maxItems": 3,
                    },
                    "column": { "type": "string" },
                },
                "additionalProperties": true,
            },
            "sample_ratio": { "type": "number", "exclusiveMinimum": 0, "maximum": 1 },
            "sample_size": { "type": "integer", "minimum": 1 },
            "oversample_minority": { "type": ["number", "null"], "exclusiveMinimum": 0 },
            "undersample_majority": { "type": ["number", "null"], "exclusiveMinimum": 0 },
        },
        "additionalProperties": true,
    })
}

/// Fragment for the `hyperopt` section.
pub fn hyperopt_fragment() -> Value {
    json!({
        "type": "object",
        "properties": {
            "goal": { "type": "string", "enum": ["minimize", "maximize"] },
            "metric": { "type": "string" },
            "output_feature": { "type": "string" },
            "parameters": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": {
                        "space": { "type": "string", "enum": HYPEROPT_SPACES },
                    },
                    "additionalProperties": true,
                },
            },
            "search_alg": {
                "type": "object",
                "properties": {
                    "type": { "type": "string" },
                },
                "additionalProperties": true,
            },
            "executor": {
                "type": "object",
                "properties": {
                    "type": { "type": "string" },
                    "num_samples": { "type": "integer", "minimum": 1 },
                },
                "additionalProperties": true,
            },
        },
        "additionalProperties": true,
    })
}

/// Fragment for the `defaults` section, keyed by feature type.
pub fn defaults_fragment() -> Value {
    let mut properties = serde_json::Map::new();
    for feature_type in INPUT_FEATURE_TYPES {
        properties.insert(feature_type.to_string(), json!({ "type": "object" }));
    }
    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false,
    })
}
