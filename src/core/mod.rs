//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{load_trial, parse_trial, LoaderError, MeasurementRecord, Trial};
pub use transforms::{build_table, build_tagged_table, DerivedRow, DerivedTable};
pub use writers::{write_workbook, OutputArtifact, PlotLocation, PlotPlacement, WriteError};
