use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Contents of a parameter file. Every key is optional here; required keys are enforced when
/// the file is merged with the command line.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PartialRunConfig {
    pub dimension: Option<usize>,

    // --- Geometry ---
    pub grid_delta: Option<f64>,
    pub x_extent: Option<f64>,
    pub y_extent: Option<f64>,
    pub trench_width: Option<f64>,
    pub trench_height: Option<f64>,
    pub taper_angle: Option<f64>,
    pub base_height: Option<f64>,
    pub periodic_boundary: Option<bool>,

    // --- Particles ---
    pub sticking_probability_p1: Option<f64>,
    pub deposition_rate_p1: Option<f64>,
    pub reaction_order_p1: Option<f64>,
    pub sticking_probability_p2: Option<f64>,
    pub deposition_rate_p2: Option<f64>,
    pub reaction_order_p2: Option<f64>,

    // --- Process ---
    pub num_rays_per_point: Option<f64>,
    pub process_time: Option<f64>,
    pub time_step_ratio: Option<f64>,
    pub random_seed: Option<u64>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading parameters from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_str_with_path(&content, path)
    }

    pub fn from_str_with_path(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(&normalize_numbers(content)).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

/// Parameter files may write numbers as `.5` or `5.`; TOML needs a digit on both sides of the
/// decimal point.
fn normalize_numbers(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let Some((key, rest)) = line.split_once('=') else {
                return line.to_string();
            };
            let (value, comment) = rest.split_at(rest.find('#').unwrap_or(rest.len()));
            match pad_decimal_point(value.trim()) {
                Some(number) if comment.is_empty() => format!("{}={}", key, number),
                Some(number) => format!("{}={} {}", key, number, comment),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn pad_decimal_point(value: &str) -> Option<String> {
    let sign_len = usize::from(value.starts_with(['+', '-']));
    let (sign, unsigned) = value.split_at(sign_len);
    let (mantissa, exponent) =
        unsigned.split_at(unsigned.find(['e', 'E']).unwrap_or(unsigned.len()));
    let (int, frac) = mantissa.split_once('.')?;

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !(is_digits(int) && is_digits(frac)) || (int.is_empty() && frac.is_empty()) {
        return None;
    }
    if !int.is_empty() && !frac.is_empty() {
        return None;
    }
    let int = if int.is_empty() { "0" } else { int };
    let frac = if frac.is_empty() { "0" } else { frac };
    Some(format!("{}{}.{}{}", sign, int, frac, exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<PartialRunConfig> {
        PartialRunConfig::from_str_with_path(content, Path::new("params.txt"))
    }

    #[test]
    fn key_value_lines_with_comments_are_read() {
        let config = parse(
            "# Domain\n\
             gridDelta=0.05\n\
             xExtent = 1.0\n\
             numRaysPerPoint=1000\n\
             periodicBoundary=true\n",
        )
        .unwrap();
        assert_eq!(config.grid_delta, Some(0.05));
        assert_eq!(config.x_extent, Some(1.0));
        assert_eq!(config.num_rays_per_point, Some(1000.0));
        assert_eq!(config.periodic_boundary, Some(true));
        assert_eq!(config.trench_width, None);
    }

    #[test]
    fn bare_decimal_points_are_accepted() {
        let config = parse(
            "processTime=.5\n\
             xExtent=5.\n\
             gridDelta = -.25e-1 # fine grid\n\
             trenchWidth=0.4\n",
        )
        .unwrap();
        assert_eq!(config.process_time, Some(0.5));
        assert_eq!(config.x_extent, Some(5.0));
        assert_eq!(config.grid_delta, Some(-0.025));
        assert_eq!(config.trench_width, Some(0.4));
    }

    #[test]
    fn normalization_leaves_other_lines_alone() {
        let content = "# xExtent=.5\ngridDelta=0.1\nperiodicBoundary=true";
        assert_eq!(
            normalize_numbers(content),
            "# xExtent=0.5\ngridDelta=0.1\nperiodicBoundary=true"
        );
        assert_eq!(pad_decimal_point("."), None);
        assert_eq!(pad_decimal_point("1.5"), None);
        assert_eq!(pad_decimal_point("+5.E2").as_deref(), Some("+5.0E2"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("gridDelta=0.1\ntrenchDepth=0.4\n").unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        assert!(parse("gridDelta=fine\n").is_err());
        assert!(parse("xExtent=\"1.0\"\n").is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PartialRunConfig::from_file(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
