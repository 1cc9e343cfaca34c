//! Merging of per-trial tables for combined batch output.

use std::ops::Range;

use crate::core::transforms::DerivedTable;

/// A derived table together with the trial it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialTable {
    pub name: String,
    pub table: DerivedTable,
}

/// Rows contributed by one trial to a combined table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpan {
    pub label: String,
    pub range: Range<usize>,
}

/// Row-wise union of several trial tables, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedTable {
    /// Batch name, used for the output file and plot title.
    pub name: String,
    pub table: DerivedTable,
    /// One span per input trial, in input order.
    pub series: Vec<SeriesSpan>,
}

impl CombinedTable {
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of trials merged into this table.
    pub fn num_trials(&self) -> usize {
        self.series.len()
    }
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    Separate(Vec<TrialTable>),
    Combined(CombinedTable),
}

/// Append-only accumulator for combine mode.
///
/// Owned by the batch run for one invocation; trials are pushed in
/// processing order and [`Accumulator::finish`] yields the combined table.
#[derive(Debug, Clone)]
pub struct Accumulator {
    combined: CombinedTable,
}

impl Accumulator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            combined: CombinedTable {
                name: name.into(),
                table: DerivedTable {
                    rows: Vec::new(),
                    tagged: true,
                },
                series: Vec::new(),
            },
        }
    }

    /// Append all rows of a trial table.
    pub fn push(&mut self, trial: TrialTable) {
        let start = self.combined.table.rows.len();
        self.combined.table.rows.extend(trial.table.rows);
        let end = self.combined.table.rows.len();

        self.combined.series.push(SeriesSpan {
            label: trial.name,
            range: start..end,
        });
    }

    /// Number of trials accumulated so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.combined.series.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.combined.series.is_empty()
    }

    /// Number of rows accumulated so far.
    pub fn num_rows(&self) -> usize {
        self.combined.table.len()
    }

    pub fn finish(self) -> CombinedTable {
        self.combined
    }
}

/// Combine trial tables or pass them through unchanged.
///
/// With `combine` off the input is returned as-is. With it on, rows are
/// concatenated in input order into one table named `name`; nothing is
/// sorted or deduplicated.
pub fn aggregate(tables: Vec<TrialTable>, combine: bool, name: &str) -> Aggregated {
    if !combine {
        return Aggregated::Separate(tables);
    }

    let mut acc = Accumulator::new(name);
    for table in tables {
        acc.push(table);
    }
    Aggregated::Combined(acc.finish())
}
