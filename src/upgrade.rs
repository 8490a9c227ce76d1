//! Backward-compatibility upgrades for historical config documents
//!
//! Documents written against older releases are normalized to the current
//! shape before any validation runs. Upgrades are an ordered table of
//! version-gated transformations: a document declaring `trellis_version`
//! only receives the transformations introduced after that version, while an
//! undeclared version receives all of them. The upgrader never mutates its
//! input, tolerates unknown extra keys, and is idempotent.

use semver::Version;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::constants::{
    CONFIG_VERSION, DEFAULTS, HYPEROPT, INPUT_FEATURES, OUTPUT_FEATURES, PREPROCESSING, SPLIT,
    TRAINER, TYPE, VERSION_KEY,
};
use crate::error::UpgradeError;

struct Transformation {
    since: Version,
    name: &'static str,
    apply: fn(&mut Mapping) -> Result<(), UpgradeError>,
}

fn transformations() -> Vec<Transformation> {
    vec![
        Transformation {
            since: Version::new(0, 4, 0),
            name: "rename `training` to `trainer`",
            apply: rename_training_section,
        },
        Transformation {
            since: Version::new(0, 4, 0),
            name: "fold `hyperopt.sampler` into executor and search_alg",
            apply: fold_hyperopt_sampler,
        },
        Transformation {
            since: Version::new(0, 5, 0),
            name: "rename feature type `numerical` to `number`",
            apply: rename_numerical_feature_type,
        },
        Transformation {
            since: Version::new(0, 6, 0),
            name: "replace legacy split parameters with `preprocessing.split`",
            apply: structure_split_config,
        },
        Transformation {
            since: Version::new(0, 7, 0),
            name: "drop `trainer.eval_batch_size: 0`",
            apply: drop_zero_eval_batch_size,
        },
    ]
}

/// Upgrade a document to the current config version.
///
/// Returns a new document; the caller's value is never mutated in place.
pub fn upgrade_config_to_latest_version(config: &Value) -> Result<Value, UpgradeError> {
    let mapping = config.as_mapping().ok_or(UpgradeError::NotAMapping)?;
    let mut upgraded = mapping.clone();
    let written_against = document_version(&upgraded)?;

    for transformation in transformations() {
        if written_against < transformation.since {
            debug!(transformation = transformation.name, "applying config upgrade");
            (transformation.apply)(&mut upgraded)?;
        }
    }

    upgraded.insert(Value::from(VERSION_KEY), Value::from(CONFIG_VERSION));
    Ok(Value::Mapping(upgraded))
}

fn document_version(config: &Mapping) -> Result<Version, UpgradeError> {
    match config.get(VERSION_KEY) {
        None | Some(Value::Null) => Ok(Version::new(0, 0, 0)),
        Some(Value::String(s)) => parse_version(s),
        // YAML readily parses `0.8` as a float; accept the numeric spelling.
        Some(Value::Number(n)) => parse_version(&n.to_string()),
        Some(_) => Err(UpgradeError::InvalidVersion(
            "non-scalar version value".to_string(),
        )),
    }
}

/// Parse a possibly-partial version string ("0.4" means "0.4.0").
fn parse_version(raw: &str) -> Result<Version, UpgradeError> {
    let trimmed = raw.trim().trim_start_matches('v');
    let padded = match trimmed.split('.').count() {
        1 => format!("{trimmed}.0.0"),
        2 => format!("{trimmed}.0"),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).map_err(|_| UpgradeError::InvalidVersion(raw.to_string()))
}

fn rename_training_section(config: &mut Mapping) -> Result<(), UpgradeError> {
    if let Some(training) = config.remove("training") {
        if !training.is_mapping() {
            return Err(UpgradeError::MalformedSection {
                section: "training".to_string(),
            });
        }
        // A document carrying both keeps the modern section.
        config.entry(Value::from(TRAINER)).or_insert(training);
    }
    Ok(())
}

fn fold_hyperopt_sampler(config: &mut Mapping) -> Result<(), UpgradeError> {
    let Some(hyperopt) = config.get_mut(HYPEROPT).and_then(Value::as_mapping_mut) else {
        return Ok(());
    };
    let Some(sampler) = hyperopt.remove("sampler") else {
        return Ok(());
    };
    let Value::Mapping(sampler) = sampler else {
        return Err(UpgradeError::MalformedSection {
            section: "hyperopt.sampler".to_string(),
        });
    };

    let mut executor = match hyperopt.remove("executor") {
        Some(Value::Mapping(m)) => m,
        _ => Mapping::new(),
    };
    for (key, value) in sampler {
        if key == "search_alg" {
            hyperopt.entry(Value::from("search_alg")).or_insert(value);
        } else {
            executor.entry(key).or_insert(value);
        }
    }
    hyperopt.insert(Value::from("executor"), Value::Mapping(executor));
    Ok(())
}

fn rename_numerical_feature_type(config: &mut Mapping) -> Result<(), UpgradeError> {
    for section in [INPUT_FEATURES, OUTPUT_FEATURES] {
        let Some(items) = config.get_mut(section).and_then(Value::as_sequence_mut) else {
            continue;
        };
        for feature in items.iter_mut().filter_map(Value::as_mapping_mut) {
            if feature.get(TYPE).and_then(Value::as_str) == Some("numerical") {
                feature.insert(Value::from(TYPE), Value::from("number"));
            }
        }
    }

    if let Some(defaults) = config.get_mut(DEFAULTS).and_then(Value::as_mapping_mut) {
        if let Some(section) = defaults.remove("numerical") {
            defaults.entry(Value::from("number")).or_insert(section);
        }
    }
    Ok(())
}

fn structure_split_config(config: &mut Mapping) -> Result<(), UpgradeError> {
    let Some(preprocessing) = config.get_mut(PREPROCESSING).and_then(Value::as_mapping_mut)
    else {
        return Ok(());
    };

    let probabilities = preprocessing.remove("split_probabilities");
    let stratify = preprocessing.remove("stratify");
    let force_split = preprocessing.remove("force_split");
    if preprocessing.contains_key(SPLIT) {
        return Ok(());
    }

    let mut split = Mapping::new();
    if let Some(column) = stratify {
        split.insert(Value::from(TYPE), Value::from("stratify"));
        split.insert(Value::from("column"), column);
        if let Some(probabilities) = probabilities {
            split.insert(Value::from("probabilities"), probabilities);
        }
    } else if let Some(probabilities) = probabilities {
        split.insert(Value::from(TYPE), Value::from("random"));
        split.insert(Value::from("probabilities"), probabilities);
    } else if force_split.and_then(|v| v.as_bool()) == Some(true) {
        split.insert(Value::from(TYPE), Value::from("fixed"));
    } else {
        return Ok(());
    }

    preprocessing.insert(Value::from(SPLIT), Value::Mapping(split));
    Ok(())
}

fn drop_zero_eval_batch_size(config: &mut Mapping) -> Result<(), UpgradeError> {
    if let Some(trainer) = config.get_mut(TRAINER).and_then(Value::as_mapping_mut) {
        if trainer.get("eval_batch_size").and_then(Value::as_u64) == Some(0) {
            trainer.remove("eval_batch_size");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let config = doc(
            "training:\n  epochs: 5\npreprocessing:\n  split_probabilities: [0.8, 0.1, 0.1]\n",
        );
        let once = upgrade_config_to_latest_version(&config).unwrap();
        let twice = upgrade_config_to_latest_version(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_upgrade_does_not_mutate_input() {
        let config = doc("training:\n  epochs: 5\n");
        let upgraded = upgrade_config_to_latest_version(&config).unwrap();
        assert!(config.get("training").is_some());
        assert!(upgraded.get("training").is_none());
        assert!(upgraded.get(TRAINER).is_some());
    }

    #[test]
    fn test_legacy_split_keys_become_split_section() {
        let config = doc("preprocessing:\n  split_probabilities: [0.8, 0.1, 0.1]\n");
        let upgraded = upgrade_config_to_latest_version(&config).unwrap();
        let split = upgraded.get(PREPROCESSING).unwrap().get(SPLIT).unwrap();
        assert_eq!(split.get(TYPE).and_then(Value::as_str), Some("random"));
        assert!(split.get("probabilities").is_some());
    }

    #[test]
    fn test_stratify_key_becomes_stratify_split() {
        let config = doc("preprocessing:\n  stratify: label\n");
        let upgraded = upgrade_config_to_latest_version(&config).unwrap();
        let split = upgraded.get(PREPROCESSING).unwrap().get(SPLIT).unwrap();
        assert_eq!(split.get(TYPE).and_then(Value::as_str), Some("stratify"));
        assert_eq!(split.get("column").and_then(Value::as_str), Some("label"));
    }

    #[test]
    fn test_numerical_feature_type_renamed() {
        let config = doc(
            "input_features:\n  - name: age\n    type: numerical\ndefaults:\n  numerical:\n    preprocessing: {}\n",
        );
        let upgraded = upgrade_config_to_latest_version(&config).unwrap();
        let features = upgraded.get(INPUT_FEATURES).unwrap().as_sequence().unwrap();
        assert_eq!(
            features[0].get(TYPE).and_then(Value::as_str),
            Some("number")
        );
        let defaults = upgraded.get(DEFAULTS).unwrap();
        assert!(defaults.get("number").is_some());
        assert!(defaults.get("numerical").is_none());
    }

    #[test]
    fn test_sampler_folds_into_executor() {
        let config = doc(
            "hyperopt:\n  sampler:\n    num_samples: 10\n    search_alg:\n      type: hyperband\n",
        );
        let upgraded = upgrade_config_to_latest_version(&config).unwrap();
        let hyperopt = upgraded.get(HYPEROPT).unwrap();
        assert!(hyperopt.get("sampler").is_none());
        assert_eq!(
            hyperopt
                .get("executor")
                .and_then(|e| e.get("num_samples"))
                .and_then(Value::as_u64),
            Some(10)
        );
        assert!(hyperopt.get("search_alg").is_some());
    }

    #[test]
    fn test_current_version_skips_transformations() {
        let mut config = Mapping::new();
        config.insert(Value::from(VERSION_KEY), Value::from(CONFIG_VERSION));
        config.insert(Value::from("training"), Value::Mapping(Mapping::new()));
        let upgraded = upgrade_config_to_latest_version(&Value::Mapping(config)).unwrap();
        // Transformation gated below the document's version does not run.
        assert!(upgraded.get("training").is_some());
    }

    #[test]
    fn test_partial_version_strings_parse() {
        assert_eq!(parse_version("0.4").unwrap(), Version::new(0, 4, 0));
        assert_eq!(parse_version("v0.6.1").unwrap(), Version::new(0, 6, 1));
        assert!(parse_version("not-a-version").is_err());
    }

    #[test]
    fn test_zero_eval_batch_size_dropped() {
        let config = doc("trainer:\n  eval_batch_size: 0\n  epochs: 2\n");
        let upgraded = upgrade_config_to_latest_version(&config).unwrap();
        let trainer = upgraded.get(TRAINER).unwrap();
        assert!(trainer.get("eval_batch_size").is_none());
        assert_eq!(trainer.get("epochs").and_then(Value::as_u64), Some(2));
    }

    #[test]
    fn test_malformed_training_section_is_rejected() {
        let config = doc("training: 5\n");
        let err = upgrade_config_to_latest_version(&config).unwrap_err();
        assert_eq!(
            err,
            UpgradeError::MalformedSection {
                section: "training".to_string()
            }
        );
    }

    #[test]
    fn test_non_mapping_document_is_rejected() {
        let err = upgrade_config_to_latest_version(&Value::from("nope")).unwrap_err();
        assert_eq!(err, UpgradeError::NotAMapping);
    }

    #[test]
    fn test_unknown_extra_keys_are_preserved() {
        let config = doc("backend:\n  type: local\ncustom_key: 7\n");
        let upgraded = upgrade_config_to_latest_version(&config).unwrap();
        assert_eq!(upgraded.get("custom_key").and_then(Value::as_u64), Some(7));
    }
}
