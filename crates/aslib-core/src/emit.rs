//! Artifact emission. Every table is rendered and validated in memory
//! before the first byte reaches disk, so a schema violation can never
//! leave a partial scenario behind.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::assemble::Scenario;

impl Scenario {
    /// Renders all artifacts, then writes them into `dir` (created if
    /// absent). Returns the written paths.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut artifacts: Vec<(PathBuf, String)> = vec![
            (
                dir.join("algorithm_runs.arff"),
                self.algorithm_runs
                    .render()
                    .context("rendering algorithm_runs")?,
            ),
            (
                dir.join("feature_values.arff"),
                self.feature_values
                    .render()
                    .context("rendering feature_values")?,
            ),
            (
                dir.join("feature_runstatus.arff"),
                self.feature_runstatus
                    .render()
                    .context("rendering feature_runstatus")?,
            ),
            (
                dir.join("description.txt"),
                self.description
                    .to_yaml()
                    .context("rendering description")?,
            ),
        ];
        if let Some(joint) = &self.joint {
            artifacts.push((dir.join("joint.arff"), joint.render().context("rendering joint")?));
        }

        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        let mut written = Vec::with_capacity(artifacts.len());
        for (path, content) in artifacts {
            atomic_write_bytes(&path, content.as_bytes())
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote artifact");
            written.push(path);
        }
        Ok(written)
    }
}

fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
