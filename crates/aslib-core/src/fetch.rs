//! Capability seams the conversion engine consumes. The OpenML client and
//! the local-CSV feature source both implement these; tests supply canned
//! in-memory implementations.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{AlgorithmId, ConfigurationId, SubjectId};

/// Per-entity fetch failure. Both variants are recoverable: the affected
/// subject or configuration is degraded and the run continues.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport or server failure.
    #[error("fetch failed: {0}")]
    Network(String),
    /// The payload arrived but violates the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Supplies the feature/quality vector of one subject.
pub trait FeatureSource {
    fn fetch_features(&self, subject: SubjectId) -> Result<BTreeMap<String, f64>, FetchError>;
}

/// Resolves configuration identity: display name and optional
/// hyperparameter signature.
pub trait ConfigurationRegistry {
    /// Human-readable display name for a configuration. Failure drops the
    /// configuration from the scenario since its identity cannot be
    /// reported.
    fn resolve_name(
        &self,
        configuration: ConfigurationId,
        algorithm: AlgorithmId,
    ) -> Result<String, FetchError>;

    /// Flattened hyperparameter settings. An empty map is a valid answer
    /// (serializes as an empty string).
    fn resolve_hyperparameters(
        &self,
        configuration: ConfigurationId,
    ) -> Result<BTreeMap<String, String>, FetchError>;
}
