//! Document keys, registered discriminator values, and metric tables
//!
//! Every string that the pipeline reads out of a configuration document is
//! named here so that the upgrader, the schema fragments, and the semantic
//! checks cannot drift apart.

/// Current configuration version, stamped by the upgrader.
pub const CONFIG_VERSION: &str = "0.8.0";

/// Key holding the config version a document was written against.
pub const VERSION_KEY: &str = "trellis_version";

// Top-level document keys.
pub const MODEL_TYPE: &str = "model_type";
pub const INPUT_FEATURES: &str = "input_features";
pub const OUTPUT_FEATURES: &str = "output_features";
pub const COMBINER: &str = "combiner";
pub const TRAINER: &str = "trainer";
pub const PREPROCESSING: &str = "preprocessing";
pub const HYPEROPT: &str = "hyperopt";
pub const DEFAULTS: &str = "defaults";
pub const BACKEND: &str = "backend";
pub const SPLIT: &str = "split";

// Common nested keys.
pub const NAME: &str = "name";
pub const TYPE: &str = "type";
pub const TIED: &str = "tied";
pub const DEPENDENCIES: &str = "dependencies";
pub const COLUMN: &str = "column";
pub const PROBABILITIES: &str = "probabilities";

/// The default model type when a document does not declare one.
pub const MODEL_ECD: &str = "ecd";
/// Gradient-boosted tree model type.
pub const MODEL_GBM: &str = "gbm";

/// Discriminator values with a registered trainer fragment.
pub const MODEL_TYPES: &[&str] = &[MODEL_ECD, MODEL_GBM];

/// Pseudo output-feature name targeting the combined loss across outputs.
pub const COMBINED: &str = "combined";
/// Metric available for every output feature and for `combined`.
pub const LOSS: &str = "loss";

/// Feature types accepted for input features.
pub const INPUT_FEATURE_TYPES: &[&str] = &[
    "binary",
    "category",
    "number",
    "sequence",
    "text",
    "set",
    "bag",
    "timeseries",
    "vector",
    "image",
    "audio",
    "date",
];

/// Feature types accepted for output features.
pub const OUTPUT_FEATURE_TYPES: &[&str] = &[
    "binary",
    "category",
    "number",
    "sequence",
    "text",
    "set",
    "timeseries",
    "vector",
];

/// Registered combiner types.
pub const COMBINER_TYPES: &[&str] = &[
    "concat",
    "sequence_concat",
    "sequence",
    "comparator",
    "tabnet",
    "tabtransformer",
    "transformer",
];

/// Feature types that carry a sequence dimension.
pub const SEQUENCE_FEATURE_TYPES: &[&str] = &["sequence", "text", "timeseries"];

/// Feature types the tabular combiners and the GBM trainer accept.
pub const TABULAR_FEATURE_TYPES: &[&str] = &["binary", "category", "number"];

/// Registered split strategies.
pub const SPLIT_TYPES: &[&str] = &["random", "fixed", "stratify", "datetime", "hash"];

/// Registered hyperopt search-space distributions.
pub const HYPEROPT_SPACES: &[&str] = &[
    "choice",
    "grid_search",
    "uniform",
    "quniform",
    "loguniform",
    "randint",
    "qrandint",
    "lograndint",
];

/// Metrics produced by an output feature of the given type, `loss` excluded.
pub fn metrics_for_feature_type(feature_type: &str) -> &'static [&'static str] {
    match feature_type {
        "binary" => &["accuracy", "precision", "recall", "roc_auc", "specificity"],
        "category" => &["accuracy", "hits_at_k"],
        "number" => &[
            "mean_squared_error",
            "mean_absolute_error",
            "root_mean_squared_error",
            "r2",
        ],
        "sequence" | "text" => &[
            "token_accuracy",
            "last_accuracy",
            "edit_distance",
            "perplexity",
        ],
        "set" => &["jaccard"],
        "vector" | "timeseries" => &["mean_squared_error", "mean_absolute_error"],
        _ => &[],
    }
}
