//! Record Index Builder: normalizes a raw evaluation stream into unique
//! subject/configuration sets and a sparse outcome lookup.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{AlgorithmId, ConfigurationId, EvaluationRecord, SubjectId};

/// Normalized view over a stream of evaluation records.
///
/// Subjects and configurations keep discovery order; that order fixes the
/// row order of every assembled table.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    pub subjects: Vec<SubjectId>,
    pub configurations: Vec<ConfigurationId>,
    pub outcomes: BTreeMap<(SubjectId, ConfigurationId), f64>,
    pub configuration_algorithm: BTreeMap<ConfigurationId, AlgorithmId>,
}

impl RecordIndex {
    /// Builds the index from a finite record sequence. An empty sequence
    /// yields an empty index; duplicate (subject, configuration) pairs are
    /// last-write-wins.
    pub fn from_records(records: impl IntoIterator<Item = EvaluationRecord>) -> Self {
        let mut index = Self::default();
        let mut seen_subjects: BTreeSet<SubjectId> = BTreeSet::new();
        let mut seen_configurations: BTreeSet<ConfigurationId> = BTreeSet::new();
        for record in records {
            if seen_subjects.insert(record.subject) {
                index.subjects.push(record.subject);
            }
            if seen_configurations.insert(record.configuration) {
                index.configurations.push(record.configuration);
            }
            index
                .outcomes
                .insert((record.subject, record.configuration), record.value);
            index
                .configuration_algorithm
                .insert(record.configuration, record.algorithm);
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty() && self.configurations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: u64, configuration: u64, algorithm: u64, value: f64) -> EvaluationRecord {
        EvaluationRecord {
            subject: SubjectId(subject),
            configuration: ConfigurationId(configuration),
            algorithm: AlgorithmId(algorithm),
            value,
        }
    }

    #[test]
    fn empty_stream_yields_empty_index() {
        let index = RecordIndex::from_records(Vec::new());
        assert!(index.is_empty());
        assert!(index.outcomes.is_empty());
        assert!(index.configuration_algorithm.is_empty());
    }

    #[test]
    fn discovery_order_is_preserved_and_deduplicated() {
        let index = RecordIndex::from_records(vec![
            record(3, 20, 1, 0.9),
            record(1, 20, 1, 0.8),
            record(3, 10, 2, 0.7),
            record(1, 10, 2, 0.6),
        ]);
        assert_eq!(index.subjects, vec![SubjectId(3), SubjectId(1)]);
        assert_eq!(
            index.configurations,
            vec![ConfigurationId(20), ConfigurationId(10)]
        );
        assert_eq!(index.outcomes.len(), 4);
    }

    #[test]
    fn duplicate_pair_is_last_write_wins() {
        let index = RecordIndex::from_records(vec![
            record(1, 10, 2, 0.5),
            record(1, 10, 2, 0.75),
        ]);
        assert_eq!(index.subjects.len(), 1);
        assert_eq!(index.configurations.len(), 1);
        assert_eq!(
            index.outcomes.get(&(SubjectId(1), ConfigurationId(10))),
            Some(&0.75)
        );
    }

    #[test]
    fn configuration_algorithm_mapping_is_recorded() {
        let index = RecordIndex::from_records(vec![record(1, 10, 7, 0.5)]);
        assert_eq!(
            index.configuration_algorithm.get(&ConfigurationId(10)),
            Some(&AlgorithmId(7))
        );
    }
}
