//! Load-cell log conversion pipeline.
//!
//! This crate provides tools for:
//! - Parsing tab-delimited load-cell measurement logs
//! - Deriving absolute load and merging trials into one table
//! - Rendering scatter plots of absolute load versus time
//! - Writing `.xlsx` workbooks with the plot embedded or saved beside them
//!
//! # Example
//!
//! ```no_run
//! use loadcell_report::{processors::batch, ConvertConfig};
//! use std::path::Path;
//!
//! let config = ConvertConfig { combine: true, ..ConvertConfig::default() };
//! let report = batch::run(Path::new("trials"), Path::new("output_files"), &config).unwrap();
//! println!("{} workbooks written", report.outputs.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{AnchorCell, ConvertConfig};
pub use crate::core::loaders::{MeasurementRecord, Trial};
pub use crate::core::transforms::DerivedTable;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
