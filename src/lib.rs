//! Trellis Config Validation
//!
//! Schema assembly and validation pipeline for declarative model
//! configuration documents.
//!
//! ## Features
//!
//! - **Compatibility Upgrades**: Documents written against older releases
//!   are normalized to the current shape before validation
//! - **Composite Schemas**: The document-level JSON Schema is assembled from
//!   per-section fragments keyed on the model-type discriminator
//! - **Bounded Caching**: Assembled schemas are compiled once and memoized
//!   in a capacity-2 LRU cache
//! - **Array-Like Extension**: Sequence-valued fields are accepted in both
//!   the canonical and the `!tuple`-tagged representation
//! - **Semantic Checks**: An ordered, fail-fast suite of cross-field rules
//!   structural validation cannot express
//!
//! ## Pipeline
//!
//! ```text
//! raw document
//!   └─> upgrade to current version
//!         └─> resolve + validate split strategy
//!               └─> assemble schema for model_type (cached)
//!                     └─> structural validation (mutex-guarded)
//!                           └─> semantic checks (fail-fast)
//!                                 └─> accept
//! ```

pub mod checks;
pub mod constants;
pub mod document;
pub mod error;
pub mod registry;
pub mod schema;
pub mod splitters;
pub mod upgrade;
pub mod validate;

mod validator;

pub use error::{
    CheckError, ConfigValidationError, Result, SplitConfigError, StructuralError, UpgradeError,
};
pub use schema::{AssembledSchema, SchemaCache};
pub use splitters::{get_splitter, Splitter};
pub use upgrade::upgrade_config_to_latest_version;
pub use validate::{validate_config, ValidationContext};
