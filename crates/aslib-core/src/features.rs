//! Feature Set Reconciler: fetches each subject's feature vector and
//! derives the scenario-wide feature schema as the intersection of the
//! available key sets.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::fetch::{FeatureSource, FetchError};
use crate::model::{RunStatus, SubjectId, MISSING_FEATURE_SENTINEL};

/// Reconciled feature data for the whole subject population.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    /// Feature names present for every subject whose fetch succeeded, in
    /// sorted order. Sorting makes the schema independent of fetch order.
    pub schema: Vec<String>,
    /// Full fetched vectors, keyed by subject. Keys outside the schema are
    /// retained; table assembly projects onto the schema.
    pub values: BTreeMap<SubjectId, BTreeMap<String, f64>>,
    /// Per-subject feature-computation status.
    pub status: BTreeMap<SubjectId, RunStatus>,
}

impl FeatureSet {
    pub fn status_of(&self, subject: SubjectId) -> RunStatus {
        self.status.get(&subject).copied().unwrap_or(RunStatus::Other)
    }
}

/// Fetches features for every subject and folds the key-set intersection.
///
/// A failed fetch degrades only that subject: `crash` for transport
/// failures, `other` for malformed payloads. A vector uniformly equal to
/// [`MISSING_FEATURE_SENTINEL`] marks an upstream feature-computation
/// timeout; the subject is kept but every feature value becomes missing.
pub fn reconcile_features(subjects: &[SubjectId], source: &dyn FeatureSource) -> FeatureSet {
    let mut set = FeatureSet::default();
    let mut intersection: Option<BTreeSet<String>> = None;

    for &subject in subjects {
        match source.fetch_features(subject) {
            Ok(vector) => {
                let keys: BTreeSet<String> = vector.keys().cloned().collect();
                intersection = Some(match intersection {
                    None => keys,
                    Some(acc) => acc.intersection(&keys).cloned().collect(),
                });
                let timed_out = !vector.is_empty()
                    && vector.values().all(|v| *v == MISSING_FEATURE_SENTINEL);
                if timed_out {
                    warn!(subject = %subject, "feature vector is uniformly the missing-value sentinel, marking timeout");
                    set.status.insert(subject, RunStatus::Timeout);
                } else {
                    set.status.insert(subject, RunStatus::Ok);
                }
                set.values.insert(subject, vector);
            }
            Err(FetchError::Network(reason)) => {
                warn!(subject = %subject, %reason, "feature fetch failed");
                set.status.insert(subject, RunStatus::Crash);
            }
            Err(FetchError::Malformed(reason)) => {
                warn!(subject = %subject, %reason, "feature payload malformed");
                set.status.insert(subject, RunStatus::Other);
            }
        }
    }

    set.schema = intersection.unwrap_or_default().into_iter().collect();
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedFeatures {
        by_subject: BTreeMap<SubjectId, Result<BTreeMap<String, f64>, FetchError>>,
    }

    impl FeatureSource for CannedFeatures {
        fn fetch_features(
            &self,
            subject: SubjectId,
        ) -> Result<BTreeMap<String, f64>, FetchError> {
            self.by_subject
                .get(&subject)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Network("unknown subject".to_string())))
        }
    }

    fn vector(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn source(
        entries: Vec<(u64, Result<BTreeMap<String, f64>, FetchError>)>,
    ) -> CannedFeatures {
        CannedFeatures {
            by_subject: entries
                .into_iter()
                .map(|(id, r)| (SubjectId(id), r))
                .collect(),
        }
    }

    #[test]
    fn schema_is_the_intersection_of_successful_fetches() {
        let src = source(vec![
            (1, Ok(vector(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]))),
            (2, Ok(vector(&[("b", 4.0), ("c", 5.0), ("d", 6.0)]))),
        ]);
        let set = reconcile_features(&[SubjectId(1), SubjectId(2)], &src);
        assert_eq!(set.schema, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn superset_subject_never_grows_the_schema() {
        let base = source(vec![
            (1, Ok(vector(&[("a", 1.0), ("b", 2.0)]))),
            (2, Ok(vector(&[("a", 3.0), ("b", 4.0)]))),
        ]);
        let with_superset = source(vec![
            (1, Ok(vector(&[("a", 1.0), ("b", 2.0)]))),
            (2, Ok(vector(&[("a", 3.0), ("b", 4.0)]))),
            (3, Ok(vector(&[("a", 5.0), ("b", 6.0), ("z", 7.0)]))),
        ]);
        let before = reconcile_features(&[SubjectId(1), SubjectId(2)], &base);
        let after =
            reconcile_features(&[SubjectId(1), SubjectId(2), SubjectId(3)], &with_superset);
        assert_eq!(before.schema, after.schema);
    }

    #[test]
    fn subset_subject_shrinks_the_schema() {
        let src = source(vec![
            (1, Ok(vector(&[("a", 1.0), ("b", 2.0)]))),
            (2, Ok(vector(&[("a", 3.0)]))),
        ]);
        let set = reconcile_features(&[SubjectId(1), SubjectId(2)], &src);
        assert_eq!(set.schema, vec!["a".to_string()]);
    }

    #[test]
    fn schema_is_independent_of_fetch_order() {
        let src = source(vec![
            (1, Ok(vector(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]))),
            (2, Ok(vector(&[("b", 4.0), ("d", 5.0)]))),
        ]);
        let forward = reconcile_features(&[SubjectId(1), SubjectId(2)], &src);
        let reverse = reconcile_features(&[SubjectId(2), SubjectId(1)], &src);
        assert_eq!(forward.schema, reverse.schema);
    }

    #[test]
    fn uniform_sentinel_vector_marks_timeout() {
        let src = source(vec![(
            1,
            Ok(vector(&[
                ("a", MISSING_FEATURE_SENTINEL),
                ("b", MISSING_FEATURE_SENTINEL),
                ("c", MISSING_FEATURE_SENTINEL),
            ])),
        )]);
        let set = reconcile_features(&[SubjectId(1)], &src);
        assert_eq!(set.status_of(SubjectId(1)), RunStatus::Timeout);
        // The vector is retained but the row will render all-missing.
        assert!(set.values.contains_key(&SubjectId(1)));
    }

    #[test]
    fn partial_sentinel_vector_is_still_ok() {
        let src = source(vec![(
            1,
            Ok(vector(&[("a", MISSING_FEATURE_SENTINEL), ("b", 2.0)])),
        )]);
        let set = reconcile_features(&[SubjectId(1)], &src);
        assert_eq!(set.status_of(SubjectId(1)), RunStatus::Ok);
    }

    #[test]
    fn fetch_failures_degrade_only_the_affected_subject() {
        let src = source(vec![
            (1, Ok(vector(&[("a", 1.0)]))),
            (2, Err(FetchError::Network("connection reset".to_string()))),
            (3, Err(FetchError::Malformed("not a flat mapping".to_string()))),
        ]);
        let set = reconcile_features(&[SubjectId(1), SubjectId(2), SubjectId(3)], &src);
        assert_eq!(set.status_of(SubjectId(1)), RunStatus::Ok);
        assert_eq!(set.status_of(SubjectId(2)), RunStatus::Crash);
        assert_eq!(set.status_of(SubjectId(3)), RunStatus::Other);
        // Failed subjects do not influence the intersection.
        assert_eq!(set.schema, vec!["a".to_string()]);
    }

    #[test]
    fn zero_successful_fetches_yields_empty_schema() {
        let src = source(vec![(
            1,
            Err(FetchError::Network("down".to_string())),
        )]);
        let set = reconcile_features(&[SubjectId(1)], &src);
        assert!(set.schema.is_empty());
        assert_eq!(set.status_of(SubjectId(1)), RunStatus::Crash);
    }
}
