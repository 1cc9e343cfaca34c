//! Scatter plots of absolute load versus time.
//!
//! Plots are rendered with plotters into an in-memory RGB surface
//! ([`Figure`]), which the export writer either embeds in the workbook or
//! saves as a PNG next to it.

use std::fs;
use std::ops::Range;
use std::path::Path;

use clap::ValueEnum;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::transforms::DerivedTable;
use crate::processors::aggregate::CombinedTable;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("PNG encoding error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Invalid figure size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

pub const X_LABEL: &str = "Time [sec.]";
pub const Y_LABEL: &str = "Absolute Load [ozFin]";

/// Fixed-mode x window in seconds.
pub const FIXED_X_RANGE: Range<f64> = 0.0..80.0;

/// Fixed-mode y window in ozFin.
pub const FIXED_Y_RANGE: Range<f64> = 0.0..50.0;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1000;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 600;

const DEFAULT_MARKER_SIZE: u32 = 3;

/// Grid divisions drawn when text rendering is unavailable.
const PLAIN_GRID_DIVISIONS: usize = 10;

const GRID_COLOR: RGBColor = RGBColor(220, 220, 220);

/// Series colors, assigned in order.
const SERIES_COLORS: &[(u8, u8, u8)] = &[
    (0, 0, 255),     // Blue
    (255, 127, 14),  // Orange
    (44, 160, 44),   // Green
    (214, 39, 40),   // Red
    (148, 103, 189), // Purple
    (140, 86, 75),   // Brown
    (227, 119, 194), // Pink
    (127, 127, 127), // Gray
    (188, 189, 34),  // Olive
    (23, 190, 207),  // Cyan
];

/// Axis limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AxisPolicy {
    /// [0, 80] x [0, 50]
    Fixed,
    /// Data bounds with 5% padding
    Auto,
}

/// Figure size and marker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotStyle {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_marker_size")]
    pub marker_size: u32,
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_marker_size() -> u32 {
    DEFAULT_MARKER_SIZE
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            marker_size: default_marker_size(),
        }
    }
}

/// One labeled set of (time, absolute load) points.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    pub title: String,
    pub series: Vec<Series>,
}

impl PlotSpec {
    /// Single-series plot for one trial.
    pub fn single(base_name: &str, table: &DerivedTable) -> Self {
        Self {
            title: format!("Scatter Plot of Load vs Time for {}", base_name),
            series: vec![Series {
                label: "Load vs Time".to_string(),
                points: table.points(),
            }],
        }
    }

    /// Overlaid plot with one series per trial of a combined table.
    pub fn combined(combined: &CombinedTable) -> Self {
        let series = combined
            .series
            .iter()
            .map(|span| Series {
                label: span.label.clone(),
                points: combined.table.rows[span.range.clone()]
                    .iter()
                    .map(|r| (r.elapsed_time, r.abs_load))
                    .collect(),
            })
            .collect();

        Self {
            title: format!("Combined Scatter Plot of Load vs Time for {}", combined.name),
            series,
        }
    }

    /// Total number of points across all series.
    pub fn num_points(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// A rendered chart: an RGB pixel surface.
///
/// The export writer takes figures by value, so the surface is released
/// once the export finishes, whether it succeeded or not.
#[derive(Debug)]
pub struct Figure {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Figure {
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encode the figure as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(
            &self.pixels,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }

    /// Encode the figure and write it to `path`.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let bytes = self.to_png()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Compute the x and y ranges for a plot under the given policy.
pub fn axis_ranges(spec: &PlotSpec, policy: AxisPolicy) -> (Range<f64>, Range<f64>) {
    match policy {
        AxisPolicy::Fixed => (FIXED_X_RANGE, FIXED_Y_RANGE),
        AxisPolicy::Auto => {
            let points = spec.series.iter().flat_map(|s| s.points.iter());
            let (x_min, x_max, y_min, y_max) = compute_bounds(points);
            let x_padding = (x_max - x_min) * 0.05;
            let y_padding = (y_max - y_min) * 0.05;
            (
                (x_min - x_padding)..(x_max + x_padding),
                (y_min - y_padding)..(y_max + y_padding),
            )
        }
    }
}

/// Render a scatter chart.
///
/// Every series gets its own color and marker shape plus a legend entry.
/// Points outside fixed axis limits are still handed to the backend and
/// clipped there. If the chart text cannot be drawn (no usable font), the
/// chart is drawn again with grid and markers only.
pub fn render(spec: &PlotSpec, policy: AxisPolicy, style: &PlotStyle) -> Result<Figure> {
    if style.width == 0 || style.height == 0 {
        return Err(VisualizationError::InvalidSize {
            width: style.width,
            height: style.height,
        });
    }

    let (x_range, y_range) = axis_ranges(spec, policy);
    let mut pixels = vec![0u8; style.width as usize * style.height as usize * 3];

    if let Err(e) = draw(&mut pixels, spec, &x_range, &y_range, style, true) {
        log::warn!("{}: drawing without text ({})", spec.title, e);
        pixels.fill(0);
        draw(&mut pixels, spec, &x_range, &y_range, style, false)?;
    }

    Ok(Figure {
        width: style.width,
        height: style.height,
        pixels,
    })
}

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

fn draw(
    pixels: &mut [u8],
    spec: &PlotSpec,
    x_range: &Range<f64>,
    y_range: &Range<f64>,
    style: &PlotStyle,
    annotate: bool,
) -> Result<()> {
    let root = BitMapBackend::with_buffer(pixels, (style.width, style.height)).into_drawing_area();

    root.fill(&WHITE).map_err(plotting_error)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(15);
    if annotate {
        builder
            .caption(&spec.title, ("sans-serif", 22))
            .x_label_area_size(45)
            .y_label_area_size(55);
    }

    let mut chart = builder
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(plotting_error)?;

    if annotate {
        chart
            .configure_mesh()
            .x_desc(X_LABEL)
            .y_desc(Y_LABEL)
            .light_line_style(GRID_COLOR)
            .draw()
            .map_err(plotting_error)?;
    } else {
        draw_plain_grid(&mut chart, x_range, y_range)?;
    }

    for (index, series) in spec.series.iter().enumerate() {
        draw_scatter(&mut chart, series, index, style.marker_size, annotate)?;
    }

    if annotate {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plotting_error)?;
    }

    root.present().map_err(plotting_error)?;

    Ok(())
}

type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn draw_scatter(
    chart: &mut Chart<'_, '_>,
    series: &Series,
    index: usize,
    size: u32,
    annotate: bool,
) -> Result<()> {
    let (r, g, b) = SERIES_COLORS[index % SERIES_COLORS.len()];
    let style = RGBColor(r, g, b).filled();
    let points = series.points.iter().copied();
    let label = series.label.clone();

    // Marker shape cycles with the series index
    match index % 3 {
        0 => {
            let anno = chart
                .draw_series(points.map(|p| Circle::new(p, size, style)))
                .map_err(plotting_error)?;
            if annotate {
                anno.label(label)
                    .legend(move |(x, y)| Circle::new((x, y), size, style));
            }
        }
        1 => {
            let anno = chart
                .draw_series(points.map(|p| TriangleMarker::new(p, size + 1, style)))
                .map_err(plotting_error)?;
            if annotate {
                anno.label(label)
                    .legend(move |(x, y)| TriangleMarker::new((x, y), size + 1, style));
            }
        }
        _ => {
            let anno = chart
                .draw_series(points.map(|p| Cross::new(p, size + 1, style)))
                .map_err(plotting_error)?;
            if annotate {
                anno.label(label)
                    .legend(move |(x, y)| Cross::new((x, y), size + 1, style));
            }
        }
    }

    Ok(())
}

fn draw_plain_grid(
    chart: &mut Chart<'_, '_>,
    x_range: &Range<f64>,
    y_range: &Range<f64>,
) -> Result<()> {
    let divisions = PLAIN_GRID_DIVISIONS as f64;
    let x_step = (x_range.end - x_range.start) / divisions;
    let y_step = (y_range.end - y_range.start) / divisions;

    let vertical = (0..=PLAIN_GRID_DIVISIONS).map(|i| {
        let x = x_range.start + x_step * i as f64;
        PathElement::new(vec![(x, y_range.start), (x, y_range.end)], GRID_COLOR)
    });
    let horizontal = (0..=PLAIN_GRID_DIVISIONS).map(|i| {
        let y = y_range.start + y_step * i as f64;
        PathElement::new(vec![(x_range.start, y), (x_range.end, y)], GRID_COLOR)
    });

    chart
        .draw_series(vertical.chain(horizontal))
        .map_err(plotting_error)?;

    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates, ignoring
/// non-finite values.
fn compute_bounds<'a, I>(points: I) -> (f64, f64, f64, f64)
where
    I: Iterator<Item = &'a (f64, f64)>,
{
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in points.filter(|(x, y)| x.is_finite() && y.is_finite()) {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if x_min > x_max {
        // No points
        return (0.0, 1.0, 0.0, 1.0);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(points: Vec<(f64, f64)>) -> PlotSpec {
        PlotSpec {
            title: "test".to_string(),
            series: vec![Series {
                label: "Load vs Time".to_string(),
                points,
            }],
        }
    }

    fn small_style() -> PlotStyle {
        PlotStyle {
            width: 320,
            height: 200,
            marker_size: 2,
        }
    }

    #[test]
    fn test_fixed_ranges_ignore_data() {
        let (x, y) = axis_ranges(&spec(vec![(120.0, 99.0)]), AxisPolicy::Fixed);
        assert_eq!(x, 0.0..80.0);
        assert_eq!(y, 0.0..50.0);
    }

    #[test]
    fn test_auto_ranges_pad_data_bounds() {
        let (x, y) = axis_ranges(&spec(vec![(0.0, 10.0), (100.0, 20.0)]), AxisPolicy::Auto);
        assert!((x.start - -5.0).abs() < 1e-9);
        assert!((x.end - 105.0).abs() < 1e-9);
        assert!((y.start - 9.5).abs() < 1e-9);
        assert!((y.end - 20.5).abs() < 1e-9);
    }

    #[test]
    fn test_auto_ranges_degenerate_and_empty() {
        let (x, y) = axis_ranges(&spec(vec![(1.0, 1.0)]), AxisPolicy::Auto);
        assert!(x.start < 1.0 && x.end > 1.0);
        assert!(y.start < 1.0 && y.end > 1.0);

        let (x, y) = axis_ranges(&spec(Vec::new()), AxisPolicy::Auto);
        assert!(x.start < x.end);
        assert!(y.start < y.end);
    }

    #[test]
    fn test_render_produces_png() {
        let figure = render(
            &spec(vec![(0.1, 5.0), (0.2, 7.5), (90.0, 60.0)]),
            AxisPolicy::Fixed,
            &small_style(),
        )
        .unwrap();

        assert_eq!(figure.width(), 320);
        assert_eq!(figure.height(), 200);

        let png = figure.to_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_render_empty_series() {
        let figure = render(&spec(Vec::new()), AxisPolicy::Auto, &small_style()).unwrap();
        assert!(!figure.to_png().unwrap().is_empty());
    }

    #[test]
    fn test_render_multiple_series() {
        let mut multi = spec(vec![(0.1, 5.0)]);
        for i in 1..5 {
            multi.series.push(Series {
                label: format!("trial {}", i),
                points: vec![(i as f64, i as f64 * 2.0)],
            });
        }
        assert_eq!(multi.num_points(), 5);
        assert!(render(&multi, AxisPolicy::Auto, &small_style()).is_ok());
    }

    #[test]
    fn test_render_rejects_zero_size() {
        let style = PlotStyle {
            width: 0,
            ..PlotStyle::default()
        };
        assert!(matches!(
            render(&spec(Vec::new()), AxisPolicy::Fixed, &style),
            Err(VisualizationError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        let figure = render(&spec(vec![(1.0, 2.0)]), AxisPolicy::Fixed, &small_style()).unwrap();

        figure.save_png(&path).unwrap();
        assert!(path.exists());
    }
}
