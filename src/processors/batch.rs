//! Batch orchestration: input resolution, per-file and combined export.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::ConvertConfig;
use crate::core::loaders::{load_trial, LoaderError};
use crate::core::transforms::{build_table, build_tagged_table};
use crate::core::writers::{
    ensure_output_dir, write_workbook, OutputArtifact, WriteError, COMBINED_SHEET, DATA_SHEET,
};
use crate::visualization::{render, PlotSpec, VisualizationError};

use super::aggregate::{aggregate, Aggregated, CombinedTable, TrialTable};

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0} is neither a valid file nor a directory")]
    Path(PathBuf),

    #[error("Failed to read input directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoaderError,
    },

    #[error("Failed to render plot for {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: VisualizationError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Resolved units of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// A single log, accepted regardless of its extension.
    File(PathBuf),
    /// A directory and its matching logs, sorted by path.
    Directory { dir: PathBuf, files: Vec<PathBuf> },
}

/// A file skipped under `keep_going`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of input files considered.
    pub files_seen: usize,
    pub outputs: Vec<OutputArtifact>,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    /// True if no output was written (empty directory, or every file failed).
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Record a per-file load error, or hand the error back when it is fatal.
    ///
    /// Only [`PipelineError::Load`] is isolated under `keep_going`; render and
    /// write errors always abort the run.
    fn record_failure(&mut self, path: &Path, error: PipelineError, keep_going: bool) -> Result<()> {
        let is_format = match &error {
            PipelineError::Load { source, .. } if keep_going => Some(source.is_format_error()),
            _ => None,
        };
        let Some(is_format) = is_format else {
            return Err(error);
        };

        let kind = if is_format { "format error" } else { "I/O error" };
        warn!("Skipping {} ({}): {}", path.display(), kind, error);
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
        Ok(())
    }
}

/// Determine the units of work for an input path.
///
/// A regular file is one unit. A directory yields every regular file in it
/// whose extension matches `extension` (case-insensitive); other entries are
/// skipped silently.
///
/// # Errors
///
/// Returns [`PipelineError::Path`] if the path does not exist or is neither
/// a file nor a directory.
pub fn resolve_input(path: &Path, extension: &str) -> Result<InputKind> {
    if path.is_file() {
        return Ok(InputKind::File(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(PipelineError::Path(path.to_path_buf()));
    }

    let entries = fs::read_dir(path).map_err(|e| PipelineError::ReadDir {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();

    files.sort();

    Ok(InputKind::Directory {
        dir: path.to_path_buf(),
        files,
    })
}

/// Leaf name of the input directory, used to name combined output.
pub fn batch_name(dir: &Path) -> String {
    dir.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .or_else(|| {
            dir.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
        })
        .unwrap_or_else(|| "combined".to_string())
}

/// Parse a log and build its derived table.
fn load_table(path: &Path, config: &ConvertConfig, tagged: bool) -> Result<TrialTable> {
    let trial = load_trial(path, config.capture_timestamp).map_err(|e| PipelineError::Load {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("{}: {} records", trial.source_name, trial.len());

    let table = if tagged {
        build_tagged_table(&trial)
    } else {
        build_table(&trial)
    };

    Ok(TrialTable {
        name: trial.source_name,
        table,
    })
}

/// Convert one log into `<output_dir>/<base>.xlsx` and its plot.
pub fn process_file(path: &Path, output_dir: &Path, config: &ConvertConfig) -> Result<OutputArtifact> {
    let trial = load_table(path, config, false)?;
    export_trial(&trial, output_dir, config)
}

fn export_trial(trial: &TrialTable, output_dir: &Path, config: &ConvertConfig) -> Result<OutputArtifact> {
    let spec = PlotSpec::single(&trial.name, &trial.table);
    let figure = render(&spec, config.axis_policy(false), &config.plot).map_err(|e| {
        PipelineError::Render {
            name: trial.name.clone(),
            source: e,
        }
    })?;

    let artifact = write_workbook(
        output_dir,
        &trial.name,
        DATA_SHEET,
        &trial.table,
        figure,
        config.placement(),
    )?;

    Ok(artifact)
}

/// Write a combined table as `<output_dir>/<batch>.xlsx` with an overlaid plot.
pub fn export_combined(
    combined: &CombinedTable,
    output_dir: &Path,
    config: &ConvertConfig,
) -> Result<OutputArtifact> {
    let spec = PlotSpec::combined(combined);
    let figure = render(&spec, config.axis_policy(true), &config.plot).map_err(|e| {
        PipelineError::Render {
            name: combined.name.clone(),
            source: e,
        }
    })?;

    let artifact = write_workbook(
        output_dir,
        &combined.name,
        COMBINED_SHEET,
        &combined.table,
        figure,
        config.placement(),
    )?;

    info!(
        "{}: combined {} trials, {} rows",
        combined.name,
        combined.num_trials(),
        combined.len()
    );

    Ok(artifact)
}

/// Run the pipeline over a file or directory.
///
/// See [`run_with`].
pub fn run(input: &Path, output_dir: &Path, config: &ConvertConfig) -> Result<BatchReport> {
    run_with(input, output_dir, config, |_| {})
}

/// Run the pipeline, calling `on_file` before each input file is processed.
///
/// Every file is parsed, rendered and written before the next one starts.
/// In combine mode the derived tables are accumulated and written once at
/// the end. A directory without matching files produces an empty report.
///
/// Unless `config.keep_going` is set, the first failing file aborts the run.
/// With it, files that fail to load are skipped and reported, while render
/// and write errors still abort.
pub fn run_with<F>(
    input: &Path,
    output_dir: &Path,
    config: &ConvertConfig,
    mut on_file: F,
) -> Result<BatchReport>
where
    F: FnMut(&Path),
{
    let kind = resolve_input(input, &config.extension)?;
    ensure_output_dir(output_dir)?;

    let mut report = BatchReport::default();

    match kind {
        InputKind::File(path) => {
            if config.combine {
                info!(
                    "{}: single input file, writing per-file output",
                    path.display()
                );
            }
            report.files_seen = 1;
            on_file(&path);
            match process_file(&path, output_dir, config) {
                Ok(artifact) => report.outputs.push(artifact),
                Err(e) => report.record_failure(&path, e, config.keep_going)?,
            }
        }
        InputKind::Directory { dir, files } => {
            report.files_seen = files.len();
            if files.is_empty() {
                info!("No .{} files found in {}", config.extension, dir.display());
                return Ok(report);
            }

            if config.combine {
                let mut tables = Vec::with_capacity(files.len());
                for path in &files {
                    on_file(path);
                    match load_table(path, config, true) {
                        Ok(table) => tables.push(table),
                        Err(e) => report.record_failure(path, e, config.keep_going)?,
                    }
                }

                match aggregate(tables, config.combine, &batch_name(&dir)) {
                    Aggregated::Combined(combined) if combined.num_trials() == 0 => {
                        warn!("{}: no trials loaded, nothing to combine", dir.display());
                    }
                    Aggregated::Combined(combined) => {
                        report.outputs.push(export_combined(&combined, output_dir, config)?);
                    }
                    Aggregated::Separate(tables) => {
                        for table in &tables {
                            report.outputs.push(export_trial(table, output_dir, config)?);
                        }
                    }
                }
            } else {
                for path in &files {
                    on_file(path);
                    match process_file(path, output_dir, config) {
                        Ok(artifact) => report.outputs.push(artifact),
                        Err(e) => report.record_failure(path, e, config.keep_going)?,
                    }
                }
            }
        }
    }

    Ok(report)
}
