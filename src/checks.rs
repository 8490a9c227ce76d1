//! Semantic cross-field checks
//!
//! Rules that structural validation cannot express: uniqueness, referential
//! integrity, mutual exclusion, and backend/combiner/trainer compatibility.
//! Each check is a pure function over the upgraded document and raises one
//! specifically-named [`CheckError`]. The suite runs in a fixed order and
//! stops at the first failure; the order matters only for diagnostic
//! clarity, the checks themselves are independent.

use std::collections::{HashMap, HashSet};

use serde_yaml::Value;

use crate::constants::{
    metrics_for_feature_type, BACKEND, COMBINED, COMBINER, DEPENDENCIES, HYPEROPT,
    HYPEROPT_SPACES, INPUT_FEATURES, LOSS, MODEL_ECD, MODEL_GBM, MODEL_TYPE, NAME,
    OUTPUT_FEATURES, PREPROCESSING, SEQUENCE_FEATURE_TYPES, TABULAR_FEATURE_TYPES, TIED, TRAINER,
    TYPE,
};
use crate::document::{feature_str, feature_types, features, get_in, sequence_items};
use crate::error::CheckError;

type Check = fn(&Value) -> Result<(), CheckError>;

/// The suite, in run order. First failure wins.
const CHECKS: &[Check] = &[
    check_validation_metrics_are_valid,
    check_feature_names_unique,
    check_tied_features_are_valid,
    check_dependent_features,
    check_training_runway,
    check_gbm_backend_incompatibility,
    check_gbm_feature_types,
    check_ray_backend_in_memory_preprocessing,
    check_sequence_concat_combiner_requirements,
    check_tabtransformer_combiner_requirements,
    check_comparator_combiner_requirements,
    check_class_balance_preprocessing,
    check_sampling_exclusivity,
    check_hyperopt_search_space,
    check_hyperopt_metric_targets,
    check_gbm_single_output_feature,
];

pub(crate) fn run_all(config: &Value) -> Result<(), CheckError> {
    for check in CHECKS {
        check(config)?;
    }
    Ok(())
}

fn model_type(config: &Value) -> &str {
    config
        .get(MODEL_TYPE)
        .and_then(Value::as_str)
        .unwrap_or(MODEL_ECD)
}

fn combiner_type(config: &Value) -> Option<&str> {
    get_in(config, &[COMBINER, TYPE]).and_then(Value::as_str)
}

fn backend_type(config: &Value) -> Option<&str> {
    get_in(config, &[BACKEND, TYPE]).and_then(Value::as_str)
}

/// Is a preprocessing parameter present with a non-null value?
fn preprocessing_param_set(config: &Value, key: &str) -> bool {
    matches!(get_in(config, &[PREPROCESSING, key]), Some(v) if !v.is_null())
}

fn metric_valid_for(feature_type: &str, metric: &str) -> bool {
    metric == LOSS || metrics_for_feature_type(feature_type).contains(&metric)
}

/// `trainer.validation_field` / `validation_metric` must target `combined`
/// or a declared output feature and a metric that feature produces.
pub fn check_validation_metrics_are_valid(config: &Value) -> Result<(), CheckError> {
    let field = get_in(config, &[TRAINER, "validation_field"])
        .and_then(Value::as_str)
        .unwrap_or(COMBINED);
    let metric = get_in(config, &[TRAINER, "validation_metric"])
        .and_then(Value::as_str)
        .unwrap_or(LOSS);

    if field == COMBINED {
        if metric != LOSS {
            return Err(CheckError::InvalidValidationMetric {
                metric: metric.to_string(),
                feature: COMBINED.to_string(),
            });
        }
        return Ok(());
    }

    let outputs = feature_types(config, OUTPUT_FEATURES);
    let Some(&(_, feature_type)) = outputs.iter().find(|(name, _)| *name == field) else {
        return Err(CheckError::UnknownValidationField {
            field: field.to_string(),
        });
    };
    if !metric_valid_for(feature_type, metric) {
        return Err(CheckError::InvalidValidationMetric {
            metric: metric.to_string(),
            feature: field.to_string(),
        });
    }
    Ok(())
}

/// Feature names must be unique across input and output features.
pub fn check_feature_names_unique(config: &Value) -> Result<(), CheckError> {
    let mut seen = HashSet::new();
    for section in [INPUT_FEATURES, OUTPUT_FEATURES] {
        for feature in features(config, section) {
            if let Some(name) = feature_str(feature, NAME) {
                if !seen.insert(name) {
                    return Err(CheckError::DuplicateFeatureName {
                        name: name.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// `tied` must reference an existing input feature of the same type.
pub fn check_tied_features_are_valid(config: &Value) -> Result<(), CheckError> {
    let inputs: HashMap<&str, &str> = feature_types(config, INPUT_FEATURES).into_iter().collect();
    for feature in features(config, INPUT_FEATURES) {
        let Some(tied) = feature_str(feature, TIED) else {
            continue;
        };
        let name = feature_str(feature, NAME).unwrap_or_default();
        let Some(tied_type) = inputs.get(tied) else {
            return Err(CheckError::InvalidTiedFeature {
                feature: name.to_string(),
                tied: tied.to_string(),
            });
        };
        let feature_type = feature_str(feature, TYPE).unwrap_or_default();
        if *tied_type != feature_type {
            return Err(CheckError::TiedFeatureTypeMismatch {
                feature: name.to_string(),
                feature_type: feature_type.to_string(),
                tied: tied.to_string(),
                tied_type: tied_type.to_string(),
            });
        }
    }
    Ok(())
}

/// Output-feature `dependencies` must reference declared output features and
/// form a DAG, so every feature is resolvable at training time.
pub fn check_dependent_features(config: &Value) -> Result<(), CheckError> {
    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    for feature in features(config, OUTPUT_FEATURES) {
        let Some(name) = feature_str(feature, NAME) else {
            continue;
        };
        let dependencies = feature
            .get(DEPENDENCIES)
            .and_then(sequence_items)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        graph.insert(name, dependencies);
    }

    for (feature, dependencies) in &graph {
        for dependency in dependencies {
            if !graph.contains_key(dependency) {
                return Err(CheckError::UnknownDependentFeature {
                    feature: feature.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
    }

    // Iterative DFS cycle detection over the dependency graph.
    let mut done: HashSet<&str> = HashSet::new();
    for &start in graph.keys() {
        if done.contains(start) {
            continue;
        }
        let mut in_progress: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        in_progress.insert(start);
        while let Some((node, next)) = stack.pop() {
            let dependencies = &graph[node];
            if next < dependencies.len() {
                stack.push((node, next + 1));
                let dependency = dependencies[next];
                if in_progress.contains(dependency) {
                    return Err(CheckError::DependentFeatureCycle {
                        feature: dependency.to_string(),
                    });
                }
                if !done.contains(dependency) {
                    in_progress.insert(dependency);
                    stack.push((dependency, 0));
                }
            } else {
                in_progress.remove(node);
                done.insert(node);
            }
        }
    }
    Ok(())
}

/// Enough training steps must remain after the scheduler warm-up window.
pub fn check_training_runway(config: &Value) -> Result<(), CheckError> {
    let Some(train_steps) = get_in(config, &[TRAINER, "train_steps"]).and_then(Value::as_u64)
    else {
        return Ok(());
    };
    let warmup_steps = get_in(config, &[TRAINER, "learning_rate_scheduler", "warmup_steps"])
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if train_steps <= warmup_steps {
        return Err(CheckError::InsufficientTrainingRunway {
            train_steps,
            warmup_steps,
        });
    }
    Ok(())
}

/// GBM training is single-process; the horovod backend cannot host it.
pub fn check_gbm_backend_incompatibility(config: &Value) -> Result<(), CheckError> {
    if model_type(config) == MODEL_GBM && backend_type(config) == Some("horovod") {
        return Err(CheckError::GbmBackendIncompatible {
            backend: "horovod".to_string(),
        });
    }
    Ok(())
}

/// GBM models consume tabular features only.
pub fn check_gbm_feature_types(config: &Value) -> Result<(), CheckError> {
    if model_type(config) != MODEL_GBM {
        return Ok(());
    }
    for (name, feature_type) in feature_types(config, INPUT_FEATURES) {
        if !TABULAR_FEATURE_TYPES.contains(&feature_type) {
            return Err(CheckError::GbmUnsupportedFeatureType {
                feature: name.to_string(),
                feature_type: feature_type.to_string(),
            });
        }
    }
    Ok(())
}

/// The ray backend streams large features from disk unless preprocessing is
/// materialized in memory; audio and image features require the latter.
pub fn check_ray_backend_in_memory_preprocessing(config: &Value) -> Result<(), CheckError> {
    if backend_type(config) != Some("ray") {
        return Ok(());
    }
    for feature in features(config, INPUT_FEATURES) {
        let feature_type = feature_str(feature, TYPE).unwrap_or_default();
        if !matches!(feature_type, "audio" | "image") {
            continue;
        }
        let in_memory = feature
            .get(PREPROCESSING)
            .and_then(|p| p.get("in_memory"))
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !in_memory {
            return Err(CheckError::RayRequiresInMemoryPreprocessing {
                feature: feature_str(feature, NAME).unwrap_or_default().to_string(),
                feature_type: feature_type.to_string(),
            });
        }
    }
    Ok(())
}

/// The sequence_concat combiner concatenates along a sequence axis, so at
/// least one input feature must provide one.
pub fn check_sequence_concat_combiner_requirements(config: &Value) -> Result<(), CheckError> {
    if combiner_type(config) != Some("sequence_concat") {
        return Ok(());
    }
    let has_sequence = feature_types(config, INPUT_FEATURES)
        .iter()
        .any(|(_, feature_type)| SEQUENCE_FEATURE_TYPES.contains(feature_type));
    if !has_sequence {
        return Err(CheckError::SequenceConcatRequiresSequenceFeature);
    }
    Ok(())
}

/// The tabtransformer combiner embeds tabular inputs only.
pub fn check_tabtransformer_combiner_requirements(config: &Value) -> Result<(), CheckError> {
    if combiner_type(config) != Some("tabtransformer") {
        return Ok(());
    }
    for (name, feature_type) in feature_types(config, INPUT_FEATURES) {
        if !TABULAR_FEATURE_TYPES.contains(&feature_type) {
            return Err(CheckError::TabTransformerUnsupportedFeature {
                feature: name.to_string(),
                feature_type: feature_type.to_string(),
            });
        }
    }
    Ok(())
}

/// The comparator combiner compares two entities; `entity_1` and `entity_2`
/// must disjointly cover the declared input features.
pub fn check_comparator_combiner_requirements(config: &Value) -> Result<(), CheckError> {
    if combiner_type(config) != Some("comparator") {
        return Ok(());
    }
    let entities = |key: &str| -> Option<Vec<&str>> {
        get_in(config, &[COMBINER, key])
            .and_then(sequence_items)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
    };
    let (Some(entity_1), Some(entity_2)) = (entities("entity_1"), entities("entity_2")) else {
        return Err(CheckError::InvalidComparatorEntities {
            reason: "entity_1 and entity_2 are required".to_string(),
        });
    };

    let input_names: HashSet<&str> = feature_types(config, INPUT_FEATURES)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    let mut assigned = HashSet::new();
    for name in entity_1.iter().chain(&entity_2) {
        if !input_names.contains(name) {
            return Err(CheckError::InvalidComparatorEntities {
                reason: format!("{name:?} does not name an input feature"),
            });
        }
        if !assigned.insert(*name) {
            return Err(CheckError::InvalidComparatorEntities {
                reason: format!("feature {name:?} appears in both entities"),
            });
        }
    }
    for name in &input_names {
        if !assigned.contains(name) {
            return Err(CheckError::InvalidComparatorEntities {
                reason: format!("input feature {name:?} is not assigned to an entity"),
            });
        }
    }
    Ok(())
}

/// Class balancing resamples rows against a single binary target.
pub fn check_class_balance_preprocessing(config: &Value) -> Result<(), CheckError> {
    if !preprocessing_param_set(config, "oversample_minority")
        && !preprocessing_param_set(config, "undersample_majority")
    {
        return Ok(());
    }
    let outputs = feature_types(config, OUTPUT_FEATURES);
    if outputs.len() != 1 || outputs[0].1 != "binary" {
        return Err(CheckError::ClassBalanceRequiresBinaryOutput);
    }
    Ok(())
}

/// Resampling strategies cannot be combined.
pub fn check_sampling_exclusivity(config: &Value) -> Result<(), CheckError> {
    const EXCLUSIVE_PAIRS: &[(&str, &str)] = &[
        ("oversample_minority", "undersample_majority"),
        ("sample_ratio", "sample_size"),
    ];
    for (first, second) in EXCLUSIVE_PAIRS {
        if preprocessing_param_set(config, first) && preprocessing_param_set(config, second) {
            return Err(CheckError::ExclusiveSamplingParameters { first, second });
        }
    }
    Ok(())
}

/// Hyperopt parameters must reference declared sections or features and
/// carry a complete, well-formed distribution.
pub fn check_hyperopt_search_space(config: &Value) -> Result<(), CheckError> {
    let Some(parameters) = get_in(config, &[HYPEROPT, "parameters"]).and_then(Value::as_mapping)
    else {
        return Ok(());
    };

    let mut referenceable: HashSet<&str> = [TRAINER, COMBINER, PREPROCESSING, "defaults"]
        .into_iter()
        .collect();
    let declared = feature_types(config, INPUT_FEATURES);
    let declared_out = feature_types(config, OUTPUT_FEATURES);
    referenceable.extend(declared.iter().map(|(name, _)| *name));
    referenceable.extend(declared_out.iter().map(|(name, _)| *name));

    for (parameter, space) in parameters {
        let Some(parameter) = parameter.as_str() else {
            continue;
        };
        let root = parameter.split('.').next().unwrap_or(parameter);
        if !referenceable.contains(root) {
            return Err(CheckError::InvalidHyperoptSearchSpace {
                parameter: parameter.to_string(),
                reason: format!("{root:?} does not reference a declared section or feature"),
            });
        }
        validate_search_space(parameter, space)?;
    }
    Ok(())
}

fn validate_search_space(parameter: &str, space: &Value) -> Result<(), CheckError> {
    let fail = |reason: String| CheckError::InvalidHyperoptSearchSpace {
        parameter: parameter.to_string(),
        reason,
    };
    let Some(distribution) = space.get("space").and_then(Value::as_str) else {
        return Err(fail("missing `space` distribution".to_string()));
    };
    if !HYPEROPT_SPACES.contains(&distribution) {
        return Err(fail(format!("unknown distribution {distribution:?}")));
    }
    match distribution {
        "choice" => {
            let categories = space.get("categories").and_then(sequence_items);
            if categories.map_or(true, Vec::is_empty) {
                return Err(fail("`choice` requires non-empty `categories`".to_string()));
            }
        }
        "grid_search" => {
            let values = space.get("values").and_then(sequence_items);
            if values.map_or(true, Vec::is_empty) {
                return Err(fail("`grid_search` requires non-empty `values`".to_string()));
            }
        }
        _ => {
            let lower = space.get("lower").and_then(Value::as_f64);
            let upper = space.get("upper").and_then(Value::as_f64);
            match (lower, upper) {
                (Some(lower), Some(upper)) if lower < upper => {}
                (Some(_), Some(_)) => {
                    return Err(fail("`lower` must be less than `upper`".to_string()));
                }
                _ => {
                    return Err(fail(format!(
                        "{distribution:?} requires numeric `lower` and `upper`"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// The hyperopt objective must target a declared output and a metric it
/// produces, with a well-formed optimization goal.
pub fn check_hyperopt_metric_targets(config: &Value) -> Result<(), CheckError> {
    let Some(hyperopt) = config.get(HYPEROPT) else {
        return Ok(());
    };
    let fail = |reason: String| CheckError::InvalidHyperoptMetricTarget { reason };

    let goal = hyperopt
        .get("goal")
        .and_then(Value::as_str)
        .unwrap_or("minimize");
    if !matches!(goal, "minimize" | "maximize") {
        return Err(fail(format!("unknown goal {goal:?}")));
    }

    let target = hyperopt
        .get("output_feature")
        .and_then(Value::as_str)
        .unwrap_or(COMBINED);
    let metric = hyperopt.get("metric").and_then(Value::as_str).unwrap_or(LOSS);

    if target == COMBINED {
        if metric != LOSS {
            return Err(fail(format!(
                "metric {metric:?} is not produced by the combined objective"
            )));
        }
        return Ok(());
    }

    let outputs = feature_types(config, OUTPUT_FEATURES);
    let Some(&(_, feature_type)) = outputs.iter().find(|(name, _)| *name == target) else {
        return Err(fail(format!(
            "output_feature {target:?} does not name an output feature"
        )));
    };
    if !metric_valid_for(feature_type, metric) {
        return Err(fail(format!(
            "metric {metric:?} is not produced by output feature {target:?}"
        )));
    }
    Ok(())
}

/// GBM models predict a single target.
pub fn check_gbm_single_output_feature(config: &Value) -> Result<(), CheckError> {
    if model_type(config) != MODEL_GBM {
        return Ok(());
    }
    let count = features(config, OUTPUT_FEATURES).len();
    if count != 1 {
        return Err(CheckError::GbmSingleOutputRequired { count });
    }
    Ok(())
}
