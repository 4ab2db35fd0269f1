//! Scenario Table Assembler: lays the normalized index and reconciled
//! features out into the fixed set of cross-referenced scenario tables.

use aslib_arff::{Attribute, Cell, Table};
use tracing::warn;

use crate::description::ScenarioDescription;
use crate::features::FeatureSet;
use crate::fetch::ConfigurationRegistry;
use crate::index::RecordIndex;
use crate::model::{ConfigurationId, RunStatus, SubjectId};

/// Knobs of one conversion run.
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub scenario_id: String,
    pub measure: String,
    pub cutoff_time: Option<f64>,
    /// Adds a flattened `key:value` hyperparameter column to the run table,
    /// the way the joint metadata exporter reports setups.
    pub include_hyperparameters: bool,
    /// Also produce the left-joined outcomes+features table.
    pub emit_joint: bool,
}

impl ScenarioOptions {
    pub fn new(scenario_id: impl Into<String>, measure: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            measure: measure.into(),
            cutoff_time: None,
            include_hyperparameters: false,
            emit_joint: false,
        }
    }
}

/// The assembled scenario: three mandatory tables, the optional joint
/// table, and the description document.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub algorithm_runs: Table,
    pub feature_values: Table,
    pub feature_runstatus: Table,
    pub joint: Option<Table>,
    pub description: ScenarioDescription,
}

struct ResolvedConfiguration {
    id: ConfigurationId,
    name: String,
    hyperparameters: String,
}

/// Pure reshaping of the indexed records and reconciled features into the
/// scenario tables. The only fallible inputs are the registry lookups; a
/// configuration whose name cannot be resolved is dropped with a warning.
pub fn assemble_scenario(
    index: &RecordIndex,
    features: &FeatureSet,
    registry: &dyn ConfigurationRegistry,
    options: &ScenarioOptions,
) -> Scenario {
    let resolved = resolve_configurations(index, registry, options.include_hyperparameters);

    let algorithm_runs = build_algorithm_runs(index, &resolved, options);
    let feature_values = build_feature_values(index, features);
    let feature_runstatus = build_feature_runstatus(index, features);
    let joint = options
        .emit_joint
        .then(|| build_joint(index, features, &resolved, options));

    let description = ScenarioDescription::new(
        options.scenario_id.clone(),
        options.measure.clone(),
        options.cutoff_time,
        resolved.iter().map(|c| c.name.clone()).collect(),
        features.schema.clone(),
    );

    Scenario {
        algorithm_runs,
        feature_values,
        feature_runstatus,
        joint,
        description,
    }
}

fn resolve_configurations(
    index: &RecordIndex,
    registry: &dyn ConfigurationRegistry,
    include_hyperparameters: bool,
) -> Vec<ResolvedConfiguration> {
    let mut resolved = Vec::with_capacity(index.configurations.len());
    for &configuration in &index.configurations {
        let Some(&algorithm) = index.configuration_algorithm.get(&configuration) else {
            warn!(configuration = %configuration, "configuration has no recorded algorithm, dropping");
            continue;
        };
        let name = match registry.resolve_name(configuration, algorithm) {
            Ok(name) => name,
            Err(err) => {
                warn!(configuration = %configuration, error = %err, "cannot resolve configuration name, dropping");
                continue;
            }
        };
        let hyperparameters = if include_hyperparameters {
            match registry.resolve_hyperparameters(configuration) {
                Ok(params) => params
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, v))
                    .collect::<Vec<_>>()
                    .join(","),
                Err(err) => {
                    warn!(configuration = %configuration, error = %err, "cannot resolve hyperparameters, leaving empty");
                    String::new()
                }
            }
        } else {
            String::new()
        };
        resolved.push(ResolvedConfiguration {
            id: configuration,
            name,
            hyperparameters,
        });
    }
    resolved
}

fn run_attributes(options: &ScenarioOptions) -> Vec<Attribute> {
    let mut attributes = vec![
        Attribute::text("instance_id"),
        Attribute::numeric("repetition"),
        Attribute::text("algorithm"),
    ];
    if options.include_hyperparameters {
        attributes.push(Attribute::text("hyperparameters"));
    }
    attributes.push(Attribute::numeric(options.measure.clone()));
    attributes.push(Attribute::nominal("runstatus", &RunStatus::DOMAIN));
    attributes
}

fn run_row(
    index: &RecordIndex,
    subject: SubjectId,
    configuration: &ResolvedConfiguration,
    options: &ScenarioOptions,
) -> Vec<Cell> {
    let (value, status) = match index.outcomes.get(&(subject, configuration.id)) {
        Some(v) => (*v, RunStatus::Ok),
        None => (0.0, RunStatus::Other),
    };
    let mut row = vec![
        Cell::text(subject.to_string()),
        Cell::Numeric(1.0),
        Cell::text(configuration.name.clone()),
    ];
    if options.include_hyperparameters {
        row.push(Cell::text(configuration.hyperparameters.clone()));
    }
    row.push(Cell::Numeric(value));
    row.push(Cell::symbol(status.as_str()));
    row
}

fn build_algorithm_runs(
    index: &RecordIndex,
    resolved: &[ResolvedConfiguration],
    options: &ScenarioOptions,
) -> Table {
    let mut table = Table::new("ALGORITHM_RUNS", run_attributes(options));
    for &subject in &index.subjects {
        for configuration in resolved {
            table.push_row(run_row(index, subject, configuration, options));
        }
    }
    table
}

fn feature_cells(features: &FeatureSet, subject: SubjectId) -> Vec<Cell> {
    if features.status_of(subject) != RunStatus::Ok {
        return vec![Cell::Missing; features.schema.len()];
    }
    let vector = features.values.get(&subject);
    features
        .schema
        .iter()
        .map(|name| {
            vector
                .and_then(|v| v.get(name))
                .map_or(Cell::Missing, |value| Cell::Numeric(*value))
        })
        .collect()
}

fn build_feature_values(index: &RecordIndex, features: &FeatureSet) -> Table {
    let mut attributes = vec![
        Attribute::text("instance_id"),
        Attribute::numeric("repetition"),
    ];
    attributes.extend(features.schema.iter().map(|name| Attribute::numeric(name.clone())));
    let mut table = Table::new("FEATURES", attributes);
    for &subject in &index.subjects {
        let mut row = vec![Cell::text(subject.to_string()), Cell::Numeric(1.0)];
        row.extend(feature_cells(features, subject));
        table.push_row(row);
    }
    table
}

fn build_feature_runstatus(index: &RecordIndex, features: &FeatureSet) -> Table {
    let mut table = Table::new(
        "FEATURES_RUNSTATUS",
        vec![
            Attribute::text("instance_id"),
            Attribute::numeric("repetition"),
            Attribute::nominal("ALL", &RunStatus::DOMAIN),
        ],
    );
    for &subject in &index.subjects {
        table.push_row(vec![
            Cell::text(subject.to_string()),
            Cell::Numeric(1.0),
            Cell::symbol(features.status_of(subject).as_str()),
        ]);
    }
    table
}

/// Left join of the run rows with the feature rows on subject identity. An
/// outcome row whose subject is missing from the feature side keeps its
/// place with missing feature cells.
fn build_joint(
    index: &RecordIndex,
    features: &FeatureSet,
    resolved: &[ResolvedConfiguration],
    options: &ScenarioOptions,
) -> Table {
    let mut attributes = run_attributes(options);
    attributes.extend(features.schema.iter().map(|name| Attribute::numeric(name.clone())));
    let mut table = Table::new("JOINT_METADATA", attributes);
    for &subject in &index.subjects {
        let feature_row = feature_cells(features, subject);
        for configuration in resolved {
            let mut row = run_row(index, subject, configuration, options);
            row.extend(feature_row.iter().cloned());
            table.push_row(row);
        }
    }
    table
}
