//! Error types for the validation pipeline
//!
//! Every rejection is attributable to exactly one pipeline stage, and each
//! semantic rule has its own variant so callers can match on the rule that
//! fired rather than parse a message.

use thiserror::Error;

/// Result type for validation operations
pub type Result<T> = std::result::Result<T, ConfigValidationError>;

/// Top-level pipeline error, one variant per stage
#[derive(Error, Debug)]
pub enum ConfigValidationError {
    #[error("config upgrade failed: {0}")]
    Upgrade(#[from] UpgradeError),

    #[error("invalid split configuration: {0}")]
    SplitConfig(#[from] SplitConfigError),

    #[error("unknown model type: {0:?} (registered: ecd, gbm)")]
    UnknownModelType(String),

    #[error("schema assembly failed: {0}")]
    SchemaAssembly(String),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Check(#[from] CheckError),
}

/// The document could not be normalized to the current version
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpgradeError {
    #[error("config document must be a mapping")]
    NotAMapping,

    #[error("config version {0:?} is not a valid version string")]
    InvalidVersion(String),

    #[error("legacy section `{section}` must be a mapping")]
    MalformedSection { section: String },
}

/// Split strategy unknown or split parameters invalid
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplitConfigError {
    #[error("unknown split type: {0:?} (registered: random, fixed, stratify, datetime, hash)")]
    UnknownSplitType(String),

    #[error("split probabilities must be three numbers summing to 1, got sum {sum}")]
    InvalidProbabilities { sum: f64 },

    #[error("`{split_type}` split requires a `column`")]
    MissingColumn { split_type: String },

    #[error("`{split_type}` split `column` must be a string")]
    NonStringColumn { split_type: String },

    #[error("split column {column:?} does not name a declared feature")]
    UnknownSplitColumn { column: String },

    #[error("stratify split column {column:?} must be a binary or category feature, got {feature_type}")]
    StratifyNotCategorical { column: String, feature_type: String },

    #[error("datetime split column {column:?} must be a date feature, got {feature_type}")]
    DatetimeNotDate { column: String, feature_type: String },
}

/// The document does not conform to the composite schema.
///
/// `path` is the "."-joined path to the offending key ("" at the root) and
/// `message` describes the expected shape at that path.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("config does not conform to schema at `{path}`: {message}")]
pub struct StructuralError {
    pub path: String,
    pub message: String,
}

/// A semantic cross-field rule failed, one variant per rule
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("validation_field {field:?} does not name an output feature or `combined`")]
    UnknownValidationField { field: String },

    #[error("validation_metric {metric:?} is not produced by output feature {feature:?}")]
    InvalidValidationMetric { metric: String, feature: String },

    #[error("feature name {name:?} is declared more than once")]
    DuplicateFeatureName { name: String },

    #[error("feature {feature:?} is tied to {tied:?}, which does not name an input feature")]
    InvalidTiedFeature { feature: String, tied: String },

    #[error("feature {feature:?} ({feature_type}) cannot be tied to {tied:?} ({tied_type})")]
    TiedFeatureTypeMismatch {
        feature: String,
        feature_type: String,
        tied: String,
        tied_type: String,
    },

    #[error("feature {feature:?} depends on {dependency:?}, which does not name an output feature")]
    UnknownDependentFeature { feature: String, dependency: String },

    #[error("output feature dependencies form a cycle through {feature:?}")]
    DependentFeatureCycle { feature: String },

    #[error("train_steps ({train_steps}) leaves no training runway after {warmup_steps} warm-up steps")]
    InsufficientTrainingRunway { train_steps: u64, warmup_steps: u64 },

    #[error("gbm models cannot run on the {backend:?} backend")]
    GbmBackendIncompatible { backend: String },

    #[error("gbm models do not support {feature_type} input feature {feature:?}")]
    GbmUnsupportedFeatureType { feature: String, feature_type: String },

    #[error("the ray backend requires in-memory preprocessing for {feature_type} feature {feature:?}")]
    RayRequiresInMemoryPreprocessing { feature: String, feature_type: String },

    #[error("the sequence_concat combiner requires at least one sequence, text, or timeseries input feature")]
    SequenceConcatRequiresSequenceFeature,

    #[error("the tabtransformer combiner does not support {feature_type} input feature {feature:?}")]
    TabTransformerUnsupportedFeature { feature: String, feature_type: String },

    #[error("invalid comparator combiner entities: {reason}")]
    InvalidComparatorEntities { reason: String },

    #[error("class balancing requires a single binary output feature")]
    ClassBalanceRequiresBinaryOutput,

    #[error("preprocessing parameters `{first}` and `{second}` are mutually exclusive")]
    ExclusiveSamplingParameters {
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid hyperopt search space for parameter {parameter:?}: {reason}")]
    InvalidHyperoptSearchSpace { parameter: String, reason: String },

    #[error("invalid hyperopt metric target: {reason}")]
    InvalidHyperoptMetricTarget { reason: String },

    #[error("gbm models require exactly one output feature, got {count}")]
    GbmSingleOutputRequired { count: usize },
}
