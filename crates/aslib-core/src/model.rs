//! Identifiers and record types shared across the pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unit of experimentation (an OpenML task). Row key of every output
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

/// An algorithm variant under evaluation (an OpenML setup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationId(pub u64);

/// The algorithm a configuration belongs to (an OpenML flow). Needed to
/// resolve configuration display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fetched evaluation: a configuration scored on a subject under the
/// chosen performance measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub subject: SubjectId,
    pub configuration: ConfigurationId,
    pub algorithm: AlgorithmId,
    pub value: f64,
}

/// A feature vector uniformly equal to this value means the upstream
/// feature-computation step timed out for the whole subject. The convention
/// is all-or-nothing per subject; individual features never carry the
/// sentinel on their own.
pub const MISSING_FEATURE_SENTINEL: f64 = -512.0;

/// Outcome classification for algorithm runs and feature computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    Timeout,
    Memout,
    NotApplicable,
    Crash,
    Other,
}

impl RunStatus {
    /// The six legal symbols, in the order the nominal ARFF domain declares
    /// them.
    pub const DOMAIN: [&'static str; 6] =
        ["ok", "timeout", "memout", "not_applicable", "crash", "other"];

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Timeout => "timeout",
            RunStatus::Memout => "memout",
            RunStatus::NotApplicable => "not_applicable",
            RunStatus::Crash => "crash",
            RunStatus::Other => "other",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
