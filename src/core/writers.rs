//! Workbook export.
//!
//! Each processing unit becomes one `.xlsx` workbook with a single named
//! sheet. The rendered plot is either embedded at an anchor cell or written
//! as `<base>_plot.png` next to the workbook.

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatBorder, Image, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use super::transforms::DerivedTable;
use crate::visualization::{Figure, VisualizationError};

/// Sheet name for per-file workbooks.
pub const DATA_SHEET: &str = "Data";

/// Sheet name for combined workbooks.
pub const COMBINED_SHEET: &str = "Combined Data";

/// Width of the data columns, in character units.
const COLUMN_WIDTH: f64 = 14.0;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create the output directory.
    #[error("failed to create output directory '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to build or save the workbook.
    #[error("failed to write workbook '{path}': {source}")]
    Workbook {
        path: String,
        #[source]
        source: XlsxError,
    },

    /// Failed to encode or save the plot image.
    #[error("failed to write plot for '{path}': {source}")]
    Plot {
        path: String,
        #[source]
        source: VisualizationError,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Where the plot of an export goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotPlacement {
    /// Inside the sheet, top-left corner at the given zero-based cell.
    Embedded { row: u32, col: u16 },
    /// Beside the workbook as `<base>_plot.png`.
    SiblingPng,
}

/// Where the plot of an export ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotLocation {
    Embedded { row: u32, col: u16 },
    File(PathBuf),
}

/// Files produced for one processing unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub spreadsheet: PathBuf,
    pub plot: PlotLocation,
}

/// Create the output directory and any missing ancestors.
///
/// Succeeds if the directory already exists.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| WriteError::CreateDirectory {
        path: dir.display().to_string(),
        source: e,
    })
}

/// `<dir>/<base>.xlsx`
pub fn workbook_path(dir: &Path, base: &str) -> PathBuf {
    dir.join(format!("{}.xlsx", base))
}

/// `<dir>/<base>_plot.png`
pub fn plot_path(dir: &Path, base: &str) -> PathBuf {
    dir.join(format!("{}_plot.png", base))
}

/// Write a table and its plot.
///
/// The figure is consumed: it is dropped when this function returns, on
/// success and on every error path.
///
/// # Arguments
///
/// * `output_dir` - Directory for the workbook (and sibling PNG)
/// * `base` - Output base name, without extension
/// * `sheet_name` - Name of the single sheet
/// * `table` - Rows to write below a header row
/// * `figure` - Rendered plot
/// * `placement` - Embed the plot or save it beside the workbook
///
/// # Errors
///
/// Returns an error if the plot cannot be encoded or saved, or if the
/// workbook cannot be built or saved to `<output_dir>/<base>.xlsx`.
pub fn write_workbook(
    output_dir: &Path,
    base: &str,
    sheet_name: &str,
    table: &DerivedTable,
    figure: Figure,
    placement: PlotPlacement,
) -> Result<OutputArtifact> {
    let spreadsheet = workbook_path(output_dir, base);
    let path_str = spreadsheet.display().to_string();
    let xlsx_error = |e: XlsxError| WriteError::Workbook {
        path: path_str.clone(),
        source: e,
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).map_err(xlsx_error)?;
    write_table(worksheet, table).map_err(xlsx_error)?;

    let plot = match placement {
        PlotPlacement::Embedded { row, col } => {
            let png = figure.to_png().map_err(|e| WriteError::Plot {
                path: path_str.clone(),
                source: e,
            })?;
            let image = Image::new_from_buffer(&png).map_err(xlsx_error)?;
            worksheet.insert_image(row, col, &image).map_err(xlsx_error)?;
            PlotLocation::Embedded { row, col }
        }
        PlotPlacement::SiblingPng => PlotLocation::File(plot_path(output_dir, base)),
    };

    workbook.save(&spreadsheet).map_err(xlsx_error)?;

    // The PNG only goes out once its workbook exists.
    if let PlotLocation::File(png_path) = &plot {
        figure.save_png(png_path).map_err(|e| WriteError::Plot {
            path: png_path.display().to_string(),
            source: e,
        })?;
    }
    drop(figure);

    log::info!("Workbook -> {}", spreadsheet.display());

    Ok(OutputArtifact { spreadsheet, plot })
}

/// Write the header row and one row per table row.
fn write_table(worksheet: &mut Worksheet, table: &DerivedTable) -> std::result::Result<(), XlsxError> {
    let header = Format::new().set_bold().set_border(FormatBorder::Thin);

    for (col, title) in table.column_titles().iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *title, &header)?;
        worksheet.set_column_width(col, COLUMN_WIDTH)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let r = i as u32 + 1;
        worksheet.write_number(r, 0, row.reading as f64)?;
        write_float(worksheet, r, 1, row.load)?;
        write_float(worksheet, r, 2, row.elapsed_time)?;
        write_float(worksheet, r, 3, row.abs_load)?;

        if table.tagged {
            if let Some(trial) = &row.trial {
                worksheet.write_string(r, 4, trial)?;
            }
            if let Some(datetime) = &row.datetime {
                worksheet.write_string(r, 5, datetime)?;
            }
        }
    }

    Ok(())
}

/// Non-finite values have no spreadsheet representation and are left blank.
fn write_float(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: f64,
) -> std::result::Result<(), XlsxError> {
    if value.is_finite() {
        worksheet.write_number(row, col, value)?;
    }
    Ok(())
}
