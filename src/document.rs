//! Helpers over the raw configuration document tree
//!
//! The pipeline treats a configuration as pure data: a `serde_yaml::Value`
//! tree with no class identity. Sequence-valued fields may arrive in two
//! representations: a plain YAML sequence, or a `!tuple`-tagged sequence
//! emitted by producers that build configs from fixed-length values. Both are
//! "array-like" everywhere in the pipeline; `to_validation_instance` encodes
//! that extension for the structural validator, and `sequence_items` exposes
//! it to the splitters and semantic checks.

use serde_yaml::{Mapping, Value};

use crate::constants::{NAME, TYPE};
use crate::error::StructuralError;

/// Tag marking the fixed-length immutable sequence representation.
pub const TUPLE_TAG: &str = "tuple";

fn is_tuple_tag(tag: &serde_yaml::value::Tag) -> bool {
    tag.to_string().trim_start_matches('!') == TUPLE_TAG
}

/// View a value as a sequence, accepting both array-like representations.
pub fn sequence_items(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Sequence(items) => Some(items),
        Value::Tagged(tagged) if is_tuple_tag(&tagged.tag) => match &tagged.value {
            Value::Sequence(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Walk a path of mapping keys from the document root.
pub fn get_in<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = doc;
    for key in path {
        current = current.get(*key)?;
    }
    Some(current)
}

/// All mapping entries of a feature list section (`input_features` or
/// `output_features`). Missing or malformed sections yield an empty list;
/// shape errors are the structural validator's job.
pub fn features<'a>(doc: &'a Value, section: &str) -> Vec<&'a Mapping> {
    doc.get(section)
        .and_then(sequence_items)
        .map(|items| items.iter().filter_map(Value::as_mapping).collect())
        .unwrap_or_default()
}

/// String field of a feature mapping.
pub fn feature_str<'a>(feature: &'a Mapping, key: &str) -> Option<&'a str> {
    feature.get(key).and_then(Value::as_str)
}

/// `(name, type)` pairs for every feature in a section that declares both.
pub fn feature_types<'a>(doc: &'a Value, section: &str) -> Vec<(&'a str, &'a str)> {
    features(doc, section)
        .into_iter()
        .filter_map(|f| Some((feature_str(f, NAME)?, feature_str(f, TYPE)?)))
        .collect()
}

/// Canonicalize a document for structural validation.
///
/// This is where the validator's notion of "array" is widened: a
/// `!tuple`-tagged sequence canonicalizes to a JSON array, so schemas
/// declaring `"type": "array"` accept both representations. Any other tag is
/// transparent (the inner value is canonicalized). Mapping keys must be
/// scalars; non-finite floats have no JSON form. Both are reported as
/// structural errors at the root since they make the document unvalidatable.
pub fn to_validation_instance(doc: &Value) -> Result<serde_json::Value, StructuralError> {
    match doc {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => {
            let number = if let Some(i) = n.as_i64() {
                Some(serde_json::Number::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(serde_json::Number::from(u))
            } else {
                n.as_f64().and_then(serde_json::Number::from_f64)
            };
            number.map(serde_json::Value::Number).ok_or_else(|| StructuralError {
                path: String::new(),
                message: format!("number {n} has no JSON representation"),
            })
        }
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Sequence(items) => items
            .iter()
            .map(to_validation_instance)
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array),
        Value::Mapping(mapping) => {
            let mut object = serde_json::Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = scalar_key(key)?;
                object.insert(key, to_validation_instance(value)?);
            }
            Ok(serde_json::Value::Object(object))
        }
        Value::Tagged(tagged) => to_validation_instance(&tagged.value),
    }
}

fn scalar_key(key: &Value) -> Result<String, StructuralError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(StructuralError {
            path: String::new(),
            message: "mapping keys must be scalars".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::value::{Tag, TaggedValue};

    fn tuple_of(items: Vec<Value>) -> Value {
        Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(TUPLE_TAG),
            value: Value::Sequence(items),
        }))
    }

    #[test]
    fn test_sequence_items_accepts_both_representations() {
        let plain = Value::Sequence(vec![Value::from(1), Value::from(2)]);
        let tagged = tuple_of(vec![Value::from(1), Value::from(2)]);

        assert_eq!(sequence_items(&plain).unwrap().len(), 2);
        assert_eq!(sequence_items(&tagged).unwrap().len(), 2);
        assert!(sequence_items(&Value::from("not a sequence")).is_none());
    }

    #[test]
    fn test_tuple_canonicalizes_to_array() {
        let doc: Value = serde_yaml::from_str("probabilities: [0.7, 0.1, 0.2]").unwrap();
        let mut mapping = doc.as_mapping().unwrap().clone();
        mapping.insert(
            Value::from("tuple_probs"),
            tuple_of(vec![Value::from(0.7), Value::from(0.1), Value::from(0.2)]),
        );

        let instance = to_validation_instance(&Value::Mapping(mapping)).unwrap();
        assert!(instance["probabilities"].is_array());
        assert!(instance["tuple_probs"].is_array());
        assert_eq!(instance["tuple_probs"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_feature_types_reads_declared_pairs() {
        let doc: Value = serde_yaml::from_str(
            "input_features:\n  - name: age\n    type: number\n  - name: job\n    type: category\n",
        )
        .unwrap();
        let types = feature_types(&doc, "input_features");
        assert_eq!(types, vec![("age", "number"), ("job", "category")]);
    }

    #[test]
    fn test_non_scalar_mapping_key_is_rejected() {
        let mut mapping = Mapping::new();
        mapping.insert(Value::Sequence(vec![]), Value::Null);
        let err = to_validation_instance(&Value::Mapping(mapping)).unwrap_err();
        assert!(err.message.contains("scalars"));
    }
}
