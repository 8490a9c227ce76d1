//! Split strategy resolution and validation
//!
//! `preprocessing.split` selects how a dataset is divided into train,
//! validation, and test sets. Parameter problems (unknown strategy, bad
//! probabilities, missing column) surface at resolution time; rules that
//! need the rest of the document (does the split column name a declared
//! feature of the right type?) surface from [`Splitter::validate`]. Split
//! validation runs before structural validation because the rest of the
//! pipeline assumes a resolvable strategy.

use serde_yaml::Value;

use crate::constants::{COLUMN, INPUT_FEATURES, OUTPUT_FEATURES, PROBABILITIES, TYPE};
use crate::document::{feature_types, sequence_items};
use crate::error::SplitConfigError;

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A resolved split strategy.
pub trait Splitter: std::fmt::Debug + Send + Sync {
    /// Check document-dependent split rules against the upgraded config.
    fn validate(&self, config: &Value) -> Result<(), SplitConfigError>;
}

/// Resolve `preprocessing.split` to a concrete strategy.
///
/// An absent or empty section resolves to the random splitter with default
/// probabilities.
pub fn get_splitter(split: &Value) -> Result<Box<dyn Splitter>, SplitConfigError> {
    let split_type = split.get(TYPE).and_then(Value::as_str).unwrap_or("random");
    match split_type {
        "random" => {
            probabilities_of(split)?;
            Ok(Box::new(RandomSplitter))
        }
        // The fixed split column holds precomputed split indices in the
        // data, so it is not required to name a declared feature.
        "fixed" => {
            column_of(split, split_type)?;
            Ok(Box::new(FixedSplitter))
        }
        "stratify" => Ok(Box::new(StratifySplitter {
            column: required_column(split, split_type)?,
        })),
        "datetime" => Ok(Box::new(DatetimeSplitter {
            column: required_column(split, split_type)?,
        })),
        "hash" => {
            required_column(split, split_type)?;
            probabilities_of(split)?;
            Ok(Box::new(HashSplitter))
        }
        other => Err(SplitConfigError::UnknownSplitType(other.to_string())),
    }
}

fn probabilities_of(split: &Value) -> Result<(), SplitConfigError> {
    let Some(raw) = split.get(PROBABILITIES) else {
        return Ok(());
    };
    let items = sequence_items(raw).ok_or(SplitConfigError::InvalidProbabilities { sum: 0.0 })?;
    let numbers: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
    let sum: f64 = numbers.iter().sum();
    if numbers.len() != 3 || numbers.len() != items.len() || (sum - 1.0).abs() > PROBABILITY_TOLERANCE
    {
        return Err(SplitConfigError::InvalidProbabilities { sum });
    }
    Ok(())
}

fn column_of(split: &Value, split_type: &str) -> Result<Option<String>, SplitConfigError> {
    match split.get(COLUMN) {
        None => Ok(None),
        Some(Value::String(column)) => Ok(Some(column.clone())),
        Some(_) => Err(SplitConfigError::NonStringColumn {
            split_type: split_type.to_string(),
        }),
    }
}

fn required_column(split: &Value, split_type: &str) -> Result<String, SplitConfigError> {
    column_of(split, split_type)?.ok_or_else(|| SplitConfigError::MissingColumn {
        split_type: split_type.to_string(),
    })
}

fn declared_feature_type<'a>(config: &'a Value, column: &str) -> Option<&'a str> {
    feature_types(config, INPUT_FEATURES)
        .into_iter()
        .chain(feature_types(config, OUTPUT_FEATURES))
        .find(|(name, _)| *name == column)
        .map(|(_, feature_type)| feature_type)
}

#[derive(Debug)]
struct RandomSplitter;

impl Splitter for RandomSplitter {
    fn validate(&self, _config: &Value) -> Result<(), SplitConfigError> {
        Ok(())
    }
}

#[derive(Debug)]
struct FixedSplitter;

impl Splitter for FixedSplitter {
    fn validate(&self, _config: &Value) -> Result<(), SplitConfigError> {
        Ok(())
    }
}

#[derive(Debug)]
struct StratifySplitter {
    column: String,
}

impl Splitter for StratifySplitter {
    fn validate(&self, config: &Value) -> Result<(), SplitConfigError> {
        match declared_feature_type(config, &self.column) {
            None => Err(SplitConfigError::UnknownSplitColumn {
                column: self.column.clone(),
            }),
            Some(feature_type) if !matches!(feature_type, "binary" | "category") => {
                Err(SplitConfigError::StratifyNotCategorical {
                    column: self.column.clone(),
                    feature_type: feature_type.to_string(),
                })
            }
            Some(_) => Ok(()),
        }
    }
}

#[derive(Debug)]
struct DatetimeSplitter {
    column: String,
}

impl Splitter for DatetimeSplitter {
    fn validate(&self, config: &Value) -> Result<(), SplitConfigError> {
        match declared_feature_type(config, &self.column) {
            None => Err(SplitConfigError::UnknownSplitColumn {
                column: self.column.clone(),
            }),
            Some("date") => Ok(()),
            Some(feature_type) => Err(SplitConfigError::DatetimeNotDate {
                column: self.column.clone(),
                feature_type: feature_type.to_string(),
            }),
        }
    }
}

#[derive(Debug)]
struct HashSplitter;

impl Splitter for HashSplitter {
    fn validate(&self, _config: &Value) -> Result<(), SplitConfigError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_empty_split_resolves_to_random() {
        let splitter = get_splitter(&Value::Mapping(Default::default())).unwrap();
        assert!(splitter.validate(&doc("input_features: []")).is_ok());
    }

    #[test]
    fn test_unknown_split_type_is_rejected() {
        let err = get_splitter(&doc("type: chronological")).unwrap_err();
        assert_eq!(
            err,
            SplitConfigError::UnknownSplitType("chronological".to_string())
        );
    }

    #[test]
    fn test_probabilities_must_sum_to_one() {
        let err = get_splitter(&doc("type: random\nprobabilities: [0.5, 0.2, 0.2]")).unwrap_err();
        assert!(matches!(err, SplitConfigError::InvalidProbabilities { .. }));

        assert!(get_splitter(&doc("type: random\nprobabilities: [0.7, 0.1, 0.2]")).is_ok());
    }

    #[test]
    fn test_probabilities_require_three_entries() {
        let err = get_splitter(&doc("type: random\nprobabilities: [0.5, 0.5]")).unwrap_err();
        assert!(matches!(err, SplitConfigError::InvalidProbabilities { .. }));
    }

    #[test]
    fn test_resolved_splitter_is_debuggable() {
        let splitter = get_splitter(&doc("type: stratify\ncolumn: label")).unwrap();
        assert!(format!("{splitter:?}").contains("Stratify"));
    }

    #[test]
    fn test_non_string_column_is_rejected() {
        let err = get_splitter(&doc("type: stratify\ncolumn: [a, b]")).unwrap_err();
        assert_eq!(
            err,
            SplitConfigError::NonStringColumn {
                split_type: "stratify".to_string()
            }
        );
    }

    #[test]
    fn test_stratify_requires_column() {
        let err = get_splitter(&doc("type: stratify")).unwrap_err();
        assert_eq!(
            err,
            SplitConfigError::MissingColumn {
                split_type: "stratify".to_string()
            }
        );
    }

    #[test]
    fn test_stratify_column_must_be_categorical() {
        let config = doc(
            "input_features:\n  - name: age\n    type: number\noutput_features:\n  - name: label\n    type: binary\n",
        );

        let ok = get_splitter(&doc("type: stratify\ncolumn: label")).unwrap();
        assert!(ok.validate(&config).is_ok());

        let wrong_type = get_splitter(&doc("type: stratify\ncolumn: age")).unwrap();
        assert!(matches!(
            wrong_type.validate(&config),
            Err(SplitConfigError::StratifyNotCategorical { .. })
        ));

        let unknown = get_splitter(&doc("type: stratify\ncolumn: missing")).unwrap();
        assert_eq!(
            unknown.validate(&config),
            Err(SplitConfigError::UnknownSplitColumn {
                column: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_datetime_column_must_be_date_feature() {
        let config = doc("input_features:\n  - name: created\n    type: date\n");
        let splitter = get_splitter(&doc("type: datetime\ncolumn: created")).unwrap();
        assert!(splitter.validate(&config).is_ok());

        let config = doc("input_features:\n  - name: created\n    type: text\n");
        assert!(matches!(
            splitter.validate(&config),
            Err(SplitConfigError::DatetimeNotDate { .. })
        ));
    }
}
