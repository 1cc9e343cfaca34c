//! Command-line interface for the conversion pipeline.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ConvertConfig;
use crate::processors::batch;
use crate::visualization::AxisPolicy;

#[derive(Parser)]
#[command(name = "loadcell-report")]
#[command(about = "Convert load-cell logs into spreadsheets with load vs time plots", version)]
pub struct Cli {
    /// Input log file or directory of logs
    #[arg(short, long = "ifile", visible_alias = "input")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long = "odir", visible_alias = "output-dir", default_value = "output_files")]
    output: PathBuf,

    /// Save plots as <name>_plot.png instead of embedding them
    #[arg(short, long)]
    savepng: bool,

    /// Merge all logs of a directory into one workbook and plot
    #[arg(long)]
    combine: bool,

    /// Keep the first header line of each log as a timestamp column
    #[arg(long)]
    timestamp: bool,

    /// Skip files that fail and report them at the end
    #[arg(long)]
    keep_going: bool,

    /// Axis limits (default: fixed per file, auto when combining)
    #[arg(long, value_enum)]
    axis: Option<AxisPolicy>,

    /// Log file extension to pick up in directory mode
    #[arg(long)]
    extension: Option<String>,

    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded config.
    fn apply(&self, mut config: ConvertConfig) -> ConvertConfig {
        if self.savepng {
            config.embed_plot = false;
        }
        if self.combine {
            config.combine = true;
        }
        if self.timestamp {
            config.capture_timestamp = true;
        }
        if self.keep_going {
            config.keep_going = true;
        }
        if let Some(axis) = self.axis {
            config.axis = Some(axis);
        }
        if let Some(ext) = &self.extension {
            config.extension = ext.trim_start_matches('.').to_string();
        }
        config
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            let head: String = value.chars().take(35).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<19}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn load_config(path: &Path) -> Result<ConvertConfig> {
    ConvertConfig::from_yaml(path)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("{:#}, using defaults", e);
                ConvertConfig::default()
            }
        },
        None => ConvertConfig::default(),
    };
    let config = cli.apply(config);

    cmd_convert(&cli.input, &cli.output, &config);
}

fn cmd_convert(input: &Path, output_dir: &Path, config: &ConvertConfig) {
    let start = Instant::now();

    let spinner = create_spinner("Converting load-cell logs...");

    let result = batch::run_with(input, output_dir, config, |path| {
        spinner.set_message(format!("Processing {}", path.display()));
    });

    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let mode = if config.combine { "combined" } else { "per file" };
    let plot = if config.embed_plot {
        format!("embedded at {}", config.anchor)
    } else {
        "sibling PNG".to_string()
    };
    let workbooks: Vec<String> = report
        .outputs
        .iter()
        .map(|a| {
            a.spreadsheet
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        })
        .collect();

    print_summary(
        "Conversion Complete",
        &[
            ("Input", input.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Mode", mode.to_string()),
            ("Plot", plot),
            ("Files processed", report.files_seen.to_string()),
            ("Workbooks", workbooks.join(", ")),
            ("Failures", report.failures.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if !report.failures.is_empty() {
        for failure in &report.failures {
            error!("{}: {}", failure.path.display(), failure.error);
        }
        std::process::exit(1);
    }
}
