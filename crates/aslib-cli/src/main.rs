use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aslib_core::{assemble_scenario, reconcile_features, RecordIndex, ScenarioOptions};
use aslib_openml::{CsvFeatureSource, EvaluationFilter, OpenMlClient};

#[derive(Parser)]
#[command(name = "aslib", version, about = "Generates ASlib scenarios from OpenML evaluation results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch evaluations and meta-features and write the scenario tables.
    Generate {
        /// Evaluation measure, e.g. predictive_accuracy.
        #[arg(long)]
        measure: String,
        /// Restrict to the tasks and setups of an OpenML study.
        #[arg(long)]
        study: Option<u64>,
        /// Restrict to evaluations uploaded by this user.
        #[arg(long)]
        user: Option<u64>,
        /// Algorithm runtime cutoff recorded in the description.
        #[arg(long)]
        cutoff: Option<f64>,
        /// Read instance features from a local CSV instead of OpenML
        /// dataset qualities.
        #[arg(long)]
        features_csv: Option<PathBuf>,
        /// Add the flattened hyperparameter column to the run table.
        #[arg(long)]
        hyperparameters: bool,
        /// Also write the joined outcomes+features table.
        #[arg(long)]
        joint: bool,
        /// Output directory.
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            measure,
            study,
            user,
            cutoff,
            features_csv,
            hyperparameters,
            joint,
            out,
        } => generate(
            &measure,
            study,
            user,
            cutoff,
            features_csv.as_deref(),
            hyperparameters,
            joint,
            &out,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn generate(
    measure: &str,
    study: Option<u64>,
    user: Option<u64>,
    cutoff: Option<f64>,
    features_csv: Option<&std::path::Path>,
    hyperparameters: bool,
    joint: bool,
    out: &std::path::Path,
) -> Result<()> {
    let client = OpenMlClient::new().context("building OpenML client")?;

    let mut filter = EvaluationFilter::default();
    if let Some(study_id) = study {
        let study_filter = client
            .get_study(study_id)
            .with_context(|| format!("fetching study {}", study_id))?;
        info!(
            study = study_id,
            tasks = study_filter.tasks.len(),
            setups = study_filter.setups.len(),
            "restricting to study"
        );
        filter.tasks = study_filter.tasks;
        filter.setups = study_filter.setups;
    }
    filter.uploader = user;

    let listing = client
        .list_evaluations(measure, &filter)
        .context("listing evaluations")?;
    info!(count = listing.records.len(), "fetched evaluations");

    let index = RecordIndex::from_records(listing.records.iter().cloned());
    info!(
        subjects = index.subjects.len(),
        configurations = index.configurations.len(),
        "built record index"
    );

    let features = match features_csv {
        Some(path) => {
            let source = CsvFeatureSource::from_path(path)
                .with_context(|| format!("loading feature CSV {}", path.display()))?;
            reconcile_features(&index.subjects, &source)
        }
        None => {
            let source = listing.feature_source(&client);
            reconcile_features(&index.subjects, &source)
        }
    };
    info!(schema = features.schema.len(), "reconciled feature schema");

    let scenario_id = match (study, user) {
        (Some(id), _) => format!("OpenML_study_{}", id),
        (None, Some(id)) => format!("OpenML_user_{}", id),
        (None, None) => "OpenML_custom".to_string(),
    };
    let options = ScenarioOptions {
        scenario_id,
        measure: measure.to_string(),
        cutoff_time: cutoff,
        include_hyperparameters: hyperparameters,
        emit_joint: joint,
    };
    let scenario = assemble_scenario(&index, &features, &client, &options);

    let paths = scenario.write_to(out)?;
    for path in paths {
        println!("wrote: {}", path.display());
    }
    Ok(())
}
