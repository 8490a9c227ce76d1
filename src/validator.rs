//! Structural validation against a compiled composite schema
//!
//! Wraps the `jsonschema` crate: Draft-7 compilation and translation of the
//! first mismatch into a [`StructuralError`] carrying the "."-joined
//! document path and the expected-shape message. Fail-fast: only the first
//! mismatch is reported, never an aggregate.

use jsonschema::paths::{JSONPointer, PathChunk};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::{ConfigValidationError, StructuralError};

/// Compile a composite schema document.
///
/// Compilation allocates internal resolver and keyword state, so callers
/// memoize the result (see `SchemaCache`) instead of compiling per call.
pub(crate) fn compile(schema: &Value) -> Result<JSONSchema, ConfigValidationError> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| ConfigValidationError::SchemaAssembly(e.to_string()))
}

/// Validate a canonicalized instance, surfacing the first mismatch.
pub(crate) fn check_instance(
    compiled: &JSONSchema,
    instance: &Value,
) -> Result<(), StructuralError> {
    match compiled.validate(instance) {
        Ok(()) => Ok(()),
        Err(mut errors) => {
            let error = match errors.next() {
                Some(error) => StructuralError {
                    path: dotted_path(&error.instance_path),
                    message: error.to_string(),
                },
                // validate() never yields an empty error iterator; guard anyway.
                None => StructuralError {
                    path: String::new(),
                    message: "config does not conform to schema".to_string(),
                },
            };
            Err(error)
        }
    }
}

fn dotted_path(pointer: &JSONPointer) -> String {
    pointer
        .iter()
        .map(|chunk| match chunk {
            PathChunk::Property(name) => name.to_string(),
            PathChunk::Index(index) => index.to_string(),
            PathChunk::Keyword(keyword) => keyword.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_required_key_reports_root_path() {
        let schema = json!({
            "type": "object",
            "required": ["output_features"],
        });
        let compiled = compile(&schema).unwrap();

        let err = check_instance(&compiled, &json!({})).unwrap_err();
        assert_eq!(err.path, "");
        assert!(err.message.contains("output_features"));
    }

    #[test]
    fn test_nested_mismatch_reports_dotted_path() {
        let schema = json!({
            "type": "object",
            "properties": {
                "trainer": {
                    "type": "object",
                    "properties": {
                        "epochs": { "type": "integer" },
                    },
                },
            },
        });
        let compiled = compile(&schema).unwrap();

        let err =
            check_instance(&compiled, &json!({ "trainer": { "epochs": "ten" } })).unwrap_err();
        assert_eq!(err.path, "trainer.epochs");
        assert!(err.message.contains("integer"));
    }

    #[test]
    fn test_valid_instance_passes() {
        let schema = json!({ "type": "object" });
        let compiled = compile(&schema).unwrap();
        assert!(check_instance(&compiled, &json!({ "extra": 1 })).is_ok());
    }
}
