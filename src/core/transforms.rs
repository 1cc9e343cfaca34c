//! Derived tables built from parsed trials.
//!
//! A [`DerivedTable`] carries the raw columns of a trial plus the absolute
//! load, and optionally the provenance columns used when several trials are
//! merged into one table.

use super::loaders::Trial;

pub const COL_READING: &str = "Reading";
pub const COL_LOAD: &str = "Load [ozFin]";
pub const COL_TIME: &str = "Time [sec.]";
pub const COL_ABS_LOAD: &str = "ABS(Load)";
pub const COL_TRIAL: &str = "Trial";
pub const COL_DATETIME: &str = "Datetime";

const BASE_COLUMNS: [&str; 4] = [COL_READING, COL_LOAD, COL_TIME, COL_ABS_LOAD];
const TAGGED_COLUMNS: [&str; 6] = [
    COL_READING,
    COL_LOAD,
    COL_TIME,
    COL_ABS_LOAD,
    COL_TRIAL,
    COL_DATETIME,
];

/// One output row.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub reading: i64,
    pub load: f64,
    pub elapsed_time: f64,
    /// `|load|`
    pub abs_load: f64,
    /// Originating trial name, set on tagged tables only.
    pub trial: Option<String>,
    /// Originating trial timestamp, set on tagged tables when captured.
    pub datetime: Option<String>,
}

/// A trial's rows with derived columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedTable {
    pub rows: Vec<DerivedRow>,
    /// Whether rows carry the `Trial`/`Datetime` columns.
    pub tagged: bool,
}

impl DerivedTable {
    /// Returns the number of rows in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column titles in output order.
    pub fn column_titles(&self) -> &'static [&'static str] {
        if self.tagged {
            &TAGGED_COLUMNS
        } else {
            &BASE_COLUMNS
        }
    }

    pub fn abs_loads(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.abs_load).collect()
    }

    /// Plot coordinates: (elapsed time, absolute load) per row.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.rows.iter().map(|r| (r.elapsed_time, r.abs_load)).collect()
    }
}

/// Build the derived table for a single trial.
///
/// This is a pure function; an empty trial yields an empty table.
pub fn build_table(trial: &Trial) -> DerivedTable {
    let rows = trial
        .records
        .iter()
        .map(|r| DerivedRow {
            reading: r.reading,
            load: r.load,
            elapsed_time: r.elapsed_time,
            abs_load: r.load.abs(),
            trial: None,
            datetime: None,
        })
        .collect();

    DerivedTable {
        rows,
        tagged: false,
    }
}

/// Build the derived table and tag every row with the trial's name and
/// timestamp so rows stay attributable after concatenation.
pub fn build_tagged_table(trial: &Trial) -> DerivedTable {
    let mut table = build_table(trial);
    for row in &mut table.rows {
        row.trial = Some(trial.source_name.clone());
        row.datetime = trial.timestamp.clone();
    }
    table.tagged = true;
    table
}
