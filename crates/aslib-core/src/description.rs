//! The scenario description document: structural metadata plus the
//! algorithm and feature registries, serialized as YAML.

use std::collections::BTreeMap;

use serde::Serialize;

/// One feature-computation step. The generated scenarios declare a single
/// step named `ALL` providing the entire feature schema.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureStep {
    pub provides: Vec<String>,
}

/// Key-value document describing the shape and semantics of the generated
/// tables.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioDescription {
    pub scenario_id: String,
    pub performance_measures: Vec<String>,
    pub maximize: Vec<bool>,
    pub performance_type: Vec<String>,
    pub algorithm_cutoff_time: f64,
    pub algorithm_cutoff_memory: String,
    pub features_cutoff_time: String,
    pub features_cutoff_memory: String,
    pub algorithms_deterministic: Vec<String>,
    pub algorithms_stochastic: String,
    pub features_deterministic: Vec<String>,
    pub features_stochastic: String,
    pub number_of_feature_steps: usize,
    pub feature_steps: BTreeMap<String, FeatureStep>,
    pub default_steps: Vec<String>,
}

impl ScenarioDescription {
    /// Builds the description from the dynamic registries. Cutoff defaults
    /// to 0 when unspecified; unknown memory/time limits serialize as `?`.
    pub fn new(
        scenario_id: impl Into<String>,
        measure: impl Into<String>,
        cutoff_time: Option<f64>,
        algorithms: Vec<String>,
        feature_schema: Vec<String>,
    ) -> Self {
        let measure = measure.into();
        let mut feature_steps = BTreeMap::new();
        feature_steps.insert(
            "ALL".to_string(),
            FeatureStep {
                provides: feature_schema.clone(),
            },
        );
        Self {
            scenario_id: scenario_id.into(),
            performance_measures: vec![measure.clone()],
            maximize: vec![true],
            performance_type: vec![measure],
            algorithm_cutoff_time: cutoff_time.unwrap_or(0.0),
            algorithm_cutoff_memory: "?".to_string(),
            features_cutoff_time: "?".to_string(),
            features_cutoff_memory: "?".to_string(),
            algorithms_deterministic: algorithms,
            algorithms_stochastic: String::new(),
            features_deterministic: feature_schema,
            features_stochastic: String::new(),
            number_of_feature_steps: 1,
            feature_steps,
            default_steps: vec!["ALL".to_string()],
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_carries_registries_and_fixed_step() {
        let desc = ScenarioDescription::new(
            "OpenML_study_14",
            "predictive_accuracy",
            Some(3600.0),
            vec!["12_weka.J48".to_string()],
            vec!["NumberOfClasses".to_string(), "NumberOfInstances".to_string()],
        );
        assert_eq!(desc.performance_measures, vec!["predictive_accuracy"]);
        assert_eq!(desc.maximize, vec![true]);
        assert_eq!(desc.algorithm_cutoff_time, 3600.0);
        assert_eq!(desc.number_of_feature_steps, 1);
        assert_eq!(desc.default_steps, vec!["ALL"]);
        let step = desc.feature_steps.get("ALL").expect("ALL step");
        assert_eq!(step.provides, desc.features_deterministic);
    }

    #[test]
    fn unspecified_cutoff_defaults_to_zero() {
        let desc = ScenarioDescription::new("s", "m", None, Vec::new(), Vec::new());
        assert_eq!(desc.algorithm_cutoff_time, 0.0);
    }

    #[test]
    fn yaml_output_contains_all_required_keys() {
        let desc = ScenarioDescription::new(
            "OpenML_study_14",
            "area_under_roc_curve",
            None,
            Vec::new(),
            Vec::new(),
        );
        let yaml = desc.to_yaml().expect("yaml");
        for key in [
            "scenario_id",
            "performance_measures",
            "maximize",
            "performance_type",
            "algorithm_cutoff_time",
            "algorithm_cutoff_memory",
            "features_cutoff_time",
            "features_cutoff_memory",
            "algorithms_deterministic",
            "algorithms_stochastic",
            "features_deterministic",
            "features_stochastic",
            "number_of_feature_steps",
            "feature_steps",
            "default_steps",
        ] {
            assert!(yaml.contains(key), "missing key {} in:\n{}", key, yaml);
        }
    }

    #[test]
    fn empty_registries_serialize_as_empty_lists() {
        let desc = ScenarioDescription::new("s", "m", None, Vec::new(), Vec::new());
        let yaml = desc.to_yaml().expect("yaml");
        assert!(yaml.contains("algorithms_deterministic: []"));
        assert!(yaml.contains("features_deterministic: []"));
    }
}
