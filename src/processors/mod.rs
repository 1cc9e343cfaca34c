//! Data processing modules.

pub mod aggregate;
pub mod batch;

// Re-export key types for convenience
pub use aggregate::{aggregate, Accumulator, Aggregated, CombinedTable, SeriesSpan, TrialTable};
pub use batch::{
    batch_name, export_combined, process_file, resolve_input, run, run_with, BatchReport,
    FileFailure, InputKind, PipelineError,
};
