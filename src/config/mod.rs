//! Configuration types for the conversion pipeline.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::writers::PlotPlacement;
use crate::visualization::{AxisPolicy, PlotStyle};

/// Spreadsheet cell used as the top-left anchor of an embedded plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnchorCell {
    /// Zero-based row.
    pub row: u32,
    /// Zero-based column.
    pub col: u16,
}

impl Default for AnchorCell {
    /// `H1`, to the right of the data columns.
    fn default() -> Self {
        Self { row: 0, col: 7 }
    }
}

impl FromStr for AnchorCell {
    type Err = String;

    /// Parse an A1-style reference such as `H1` or `AA12`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("invalid cell reference '{}'", s))?;
        let (letters, digits) = s.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("invalid cell reference '{}'", s));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > 16_384 {
                return Err(format!("column out of range in '{}'", s));
            }
        }

        let row: u32 = digits
            .parse()
            .map_err(|_| format!("invalid row in cell reference '{}'", s))?;
        if row == 0 || row > 1_048_576 {
            return Err(format!("row out of range in '{}'", s));
        }

        Ok(Self {
            row: row - 1,
            col: (col - 1) as u16,
        })
    }
}

impl fmt::Display for AnchorCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut n = self.col as u32 + 1;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        let letters: String = letters.into_iter().rev().collect();
        write!(f, "{}{}", letters, self.row + 1)
    }
}

impl TryFrom<String> for AnchorCell {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnchorCell> for String {
    fn from(cell: AnchorCell) -> Self {
        cell.to_string()
    }
}

/// Settings for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Merge all trials of a directory into one workbook and one plot
    #[serde(default)]
    pub combine: bool,

    /// Embed the plot in the workbook instead of writing `<base>_plot.png`
    #[serde(default = "default_embed_plot")]
    pub embed_plot: bool,

    /// Keep the first header line of each log as its timestamp
    #[serde(default)]
    pub capture_timestamp: bool,

    /// Skip files that fail instead of aborting the whole batch
    #[serde(default)]
    pub keep_going: bool,

    /// Log file extension recognized in directory mode
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Axis limits; when unset, fixed for per-file output and auto for combined
    #[serde(default)]
    pub axis: Option<AxisPolicy>,

    /// Anchor cell for embedded plots
    #[serde(default)]
    pub anchor: AnchorCell,

    #[serde(default)]
    pub plot: PlotStyle,
}

fn default_embed_plot() -> bool {
    true
}

fn default_extension() -> String {
    "log".to_string()
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            combine: false,
            embed_plot: default_embed_plot(),
            capture_timestamp: false,
            keep_going: false,
            extension: default_extension(),
            axis: None,
            anchor: AnchorCell::default(),
            plot: PlotStyle::default(),
        }
    }
}

impl ConvertConfig {
    /// Axis policy to use for a given output mode.
    pub fn axis_policy(&self, combined: bool) -> AxisPolicy {
        self.axis.unwrap_or(if combined {
            AxisPolicy::Auto
        } else {
            AxisPolicy::Fixed
        })
    }

    /// Where the rendered plot goes.
    pub fn placement(&self) -> PlotPlacement {
        if self.embed_plot {
            PlotPlacement::Embedded {
                row: self.anchor.row,
                col: self.anchor.col,
            }
        } else {
            PlotPlacement::SiblingPng
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ConvertConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ConvertConfig::default();
        assert!(!config.combine);
        assert!(config.embed_plot);
        assert_eq!(config.extension, "log");
        assert_eq!(config.anchor, AnchorCell { row: 0, col: 7 });
    }

    #[test]
    fn test_axis_policy_per_mode() {
        let mut config = ConvertConfig::default();
        assert_eq!(config.axis_policy(false), AxisPolicy::Fixed);
        assert_eq!(config.axis_policy(true), AxisPolicy::Auto);

        config.axis = Some(AxisPolicy::Auto);
        assert_eq!(config.axis_policy(false), AxisPolicy::Auto);
    }

    #[test]
    fn test_placement() {
        let mut config = ConvertConfig::default();
        assert_eq!(config.placement(), PlotPlacement::Embedded { row: 0, col: 7 });

        config.embed_plot = false;
        assert_eq!(config.placement(), PlotPlacement::SiblingPng);
    }

    #[test]
    fn test_anchor_cell_parse() {
        assert_eq!("H1".parse::<AnchorCell>().unwrap(), AnchorCell { row: 0, col: 7 });
        assert_eq!("a1".parse::<AnchorCell>().unwrap(), AnchorCell { row: 0, col: 0 });
        assert_eq!("AA12".parse::<AnchorCell>().unwrap(), AnchorCell { row: 11, col: 26 });
        assert_eq!(AnchorCell { row: 11, col: 26 }.to_string(), "AA12");

        assert!("H0".parse::<AnchorCell>().is_err());
        assert!("12".parse::<AnchorCell>().is_err());
        assert!("H".parse::<AnchorCell>().is_err());
        assert!("H-1".parse::<AnchorCell>().is_err());
    }

    #[test]
    fn test_yaml_round_trip_with_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("convert.yaml");
        std::fs::write(&path, "combine: true\nanchor: J3\naxis: auto\n").unwrap();

        let config = ConvertConfig::from_yaml(&path).unwrap();
        assert!(config.combine);
        assert!(config.embed_plot);
        assert_eq!(config.anchor, AnchorCell { row: 2, col: 9 });
        assert_eq!(config.axis, Some(AxisPolicy::Auto));

        let out = dir.path().join("saved.yaml");
        config.to_yaml(&out).unwrap();
        let reloaded = ConvertConfig::from_yaml(&out).unwrap();
        assert_eq!(reloaded.anchor, config.anchor);
        assert_eq!(reloaded.plot, config.plot);
    }

    #[test]
    fn test_yaml_rejects_bad_anchor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "anchor: 7H\n").unwrap();
        assert!(ConvertConfig::from_yaml(&path).is_err());
    }
}
