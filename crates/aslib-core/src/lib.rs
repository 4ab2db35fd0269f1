//! Conversion engine turning OpenML-style evaluation results into an ASlib
//! algorithm-selection scenario: cross-referenced ARFF tables plus a YAML
//! scenario description.
//!
//! The pipeline runs index building, feature reconciliation, table assembly,
//! and artifact emission as separate stages, each handing an owned structure
//! to the next, so every stage is testable with canned inputs.

pub mod assemble;
pub mod description;
mod emit;
pub mod features;
pub mod fetch;
pub mod index;
pub mod model;

pub use assemble::{assemble_scenario, Scenario, ScenarioOptions};
pub use description::ScenarioDescription;
pub use features::{reconcile_features, FeatureSet};
pub use fetch::{ConfigurationRegistry, FeatureSource, FetchError};
pub use index::RecordIndex;
pub use model::{
    AlgorithmId, ConfigurationId, EvaluationRecord, RunStatus, SubjectId,
    MISSING_FEATURE_SENTINEL,
};
