mod defaults;
mod file;

pub use file::PartialRunConfig;

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use procsim::core::geometry::{Dimension, TrenchGeometry};
use procsim::core::material::Material;
use procsim::core::models::TeosParticleParameters;
use procsim::engine::config::{ProcessConfigBuilder, TeosTrenchConfig, TeosTrenchConfigBuilder};
use std::str::FromStr;
use tracing::debug;

/// Command-line overrides of process parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessOverrides {
    pub rays_per_point: Option<usize>,
    pub process_time: Option<f64>,
    pub seed: Option<u64>,
}

impl PartialRunConfig {
    /// Resolves the final configuration: `-S` values override the file, dedicated flags
    /// override both, defaults fill the rest.
    pub fn merge_with_cli(
        mut self,
        args: &ConfigArgs,
        overrides: ProcessOverrides,
    ) -> Result<TeosTrenchConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let dimension = match args.dim {
            Some(dim) => dim,
            None => Dimension::try_from(self.dimension.unwrap_or(defaults.dimension))
                .map_err(|e| CliError::Config(e.to_string()))?,
        };

        let x_extent = required(self.x_extent, "xExtent")?;
        let geometry = TrenchGeometry {
            grid_delta: required(self.grid_delta, "gridDelta")?,
            x_extent,
            y_extent: self.y_extent.unwrap_or(x_extent),
            trench_width: required(self.trench_width, "trenchWidth")?,
            trench_depth: required(self.trench_height, "trenchHeight")?,
            taper_angle: self.taper_angle.unwrap_or(defaults.taper_angle),
            base_height: self.base_height.unwrap_or(defaults.base_height),
            periodic_boundary: self
                .periodic_boundary
                .unwrap_or(defaults.periodic_boundary),
            make_mask: false,
            material: Material::Si,
        };

        let first_particle = TeosParticleParameters {
            sticking_probability: required(self.sticking_probability_p1, "stickingProbabilityP1")?,
            rate: required(self.deposition_rate_p1, "depositionRateP1")?,
            order: self.reaction_order_p1.unwrap_or(defaults.reaction_order),
        };
        let second_particle = self.second_particle(&defaults)?;

        let rays_per_point = match overrides.rays_per_point {
            Some(rays) => rays,
            None => match self.num_rays_per_point {
                Some(rays) => rays_from_float(rays)?,
                None => defaults.num_rays_per_point,
            },
        };
        let mut process = ProcessConfigBuilder::new()
            .duration(
                overrides
                    .process_time
                    .or(self.process_time)
                    .ok_or_else(|| missing("processTime"))?,
            )
            .rays_per_point(rays_per_point)
            .seed(
                overrides
                    .seed
                    .or(self.random_seed)
                    .unwrap_or(defaults.random_seed),
            );
        if let Some(ratio) = self.time_step_ratio {
            process = process.time_step_ratio(ratio);
        }
        let process = process
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let mut builder = TeosTrenchConfigBuilder::new()
            .dimension(dimension)
            .geometry(geometry)
            .first_particle(first_particle)
            .process(process);
        if let Some(second) = second_particle {
            builder = builder.second_particle(second);
        }
        let config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    fn second_particle(&self, defaults: &DefaultsConfig) -> Result<Option<TeosParticleParameters>> {
        match (self.sticking_probability_p2, self.deposition_rate_p2) {
            (None, None) => {
                if self.reaction_order_p2.is_some() {
                    return Err(CliError::Config(
                        "`reactionOrderP2` is set but the second particle is not defined."
                            .to_string(),
                    ));
                }
                Ok(None)
            }
            (Some(sticking_probability), Some(rate)) => Ok(Some(TeosParticleParameters {
                sticking_probability,
                rate,
                order: self.reaction_order_p2.unwrap_or(defaults.reaction_order),
            })),
            _ => Err(CliError::Config(
                "The second particle needs both `stickingProbabilityP2` and `depositionRateP2`."
                    .to_string(),
            )),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            let value_str = value_str.trim();

            match key {
                "dimension" => self.dimension = Some(parse_value(key, value_str)?),
                "gridDelta" => self.grid_delta = Some(parse_value(key, value_str)?),
                "xExtent" => self.x_extent = Some(parse_value(key, value_str)?),
                "yExtent" => self.y_extent = Some(parse_value(key, value_str)?),
                "trenchWidth" => self.trench_width = Some(parse_value(key, value_str)?),
                "trenchHeight" => self.trench_height = Some(parse_value(key, value_str)?),
                "taperAngle" => self.taper_angle = Some(parse_value(key, value_str)?),
                "baseHeight" => self.base_height = Some(parse_value(key, value_str)?),
                "periodicBoundary" => {
                    self.periodic_boundary = Some(parse_value(key, value_str)?)
                }
                "stickingProbabilityP1" => {
                    self.sticking_probability_p1 = Some(parse_value(key, value_str)?)
                }
                "depositionRateP1" => {
                    self.deposition_rate_p1 = Some(parse_value(key, value_str)?)
                }
                "reactionOrderP1" => self.reaction_order_p1 = Some(parse_value(key, value_str)?),
                "stickingProbabilityP2" => {
                    self.sticking_probability_p2 = Some(parse_value(key, value_str)?)
                }
                "depositionRateP2" => {
                    self.deposition_rate_p2 = Some(parse_value(key, value_str)?)
                }
                "reactionOrderP2" => self.reaction_order_p2 = Some(parse_value(key, value_str)?),
                "numRaysPerPoint" => {
                    self.num_rays_per_point = Some(parse_value(key, value_str)?)
                }
                "processTime" => self.process_time = Some(parse_value(key, value_str)?),
                "timeStepRatio" => self.time_step_ratio = Some(parse_value(key, value_str)?),
                "randomSeed" => self.random_seed = Some(parse_value(key, value_str)?),
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value_str: &str) -> Result<T> {
    value_str.parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: '{}'", key, value_str))
    })
}

fn missing(key: &str) -> CliError {
    CliError::Config(format!(
        "`{}` is required either in the parameter file or via the command line.",
        key
    ))
}

fn required(value: Option<f64>, key: &str) -> Result<f64> {
    value.ok_or_else(|| missing(key))
}

/// The parameter file stores the ray count as a number; it must be a positive whole number.
fn rays_from_float(value: f64) -> Result<usize> {
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(CliError::Config(format!(
            "`numRaysPerPoint` must be a positive integer, got {}",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    const SINGLE_TEOS: &str = "\
# Geometry
gridDelta=0.05
xExtent=1.0
yExtent=0.8
trenchWidth=0.4
trenchHeight=0.8
taperAngle=0.0

# Process
processTime=1.5
numRaysPerPoint=500
stickingProbabilityP1=0.1
depositionRateP1=0.1
reactionOrderP1=1.0
";

    fn parse(content: &str) -> PartialRunConfig {
        PartialRunConfig::from_str_with_path(content, Path::new("params.txt")).unwrap()
    }

    fn args(set_values: &[&str], dim: Option<Dimension>) -> ConfigArgs {
        ConfigArgs {
            config: PathBuf::from("params.txt"),
            dim,
            set_values: set_values.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn single_teos_file_resolves_to_trench_config() {
        let config = parse(SINGLE_TEOS)
            .merge_with_cli(&args(&[], None), ProcessOverrides::default())
            .unwrap();

        assert_eq!(config.dimension, Dimension::Two);
        assert_eq!(config.geometry.grid_delta, 0.05);
        assert_eq!(config.geometry.y_extent, 0.8);
        assert_eq!(config.geometry.trench_depth, 0.8);
        assert_eq!(config.geometry.material, Material::Si);
        assert_eq!(config.first_particle.sticking_probability, 0.1);
        assert!(config.second_particle.is_none());
        assert_eq!(config.process.duration, 1.5);
        assert_eq!(config.process.rays_per_point, 500);
    }

    #[test]
    fn cli_flags_override_set_values_and_file() {
        let overrides = ProcessOverrides {
            rays_per_point: Some(20),
            process_time: Some(0.5),
            seed: Some(9),
        };
        let config = parse(SINGLE_TEOS)
            .merge_with_cli(
                &args(&["processTime=3.0", "trenchWidth=0.5"], Some(Dimension::Three)),
                overrides,
            )
            .unwrap();

        assert_eq!(config.dimension, Dimension::Three);
        assert_eq!(config.geometry.trench_width, 0.5);
        assert_eq!(config.process.duration, 0.5);
        assert_eq!(config.process.rays_per_point, 20);
        assert_eq!(config.process.seed, 9);
    }

    #[test]
    fn missing_required_key_is_reported() {
        let err = parse("gridDelta=0.1\nxExtent=1.0\n")
            .merge_with_cli(&args(&[], None), ProcessOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("trenchWidth"));
    }

    #[test]
    fn second_particle_needs_both_parameters() {
        let partial = parse(&format!("{}stickingProbabilityP2=0.5\n", SINGLE_TEOS));
        assert!(matches!(
            partial.merge_with_cli(&args(&[], None), ProcessOverrides::default()),
            Err(CliError::Config(_))
        ));

        let config = parse(SINGLE_TEOS)
            .merge_with_cli(
                &args(
                    &["stickingProbabilityP2=0.5", "depositionRateP2=0.2"],
                    None,
                ),
                ProcessOverrides::default(),
            )
            .unwrap();
        let second = config.second_particle.unwrap();
        assert_eq!(second.rate, 0.2);
        assert_eq!(second.order, 1.0);
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        let partial = parse(SINGLE_TEOS);
        for set in ["gridDelta", "gridDelta=abc", "unknownKey=1"] {
            assert!(matches!(
                partial
                    .clone()
                    .merge_with_cli(&args(&[set], None), ProcessOverrides::default()),
                Err(CliError::Config(_))
            ));
        }
    }

    #[test]
    fn fractional_ray_count_is_rejected() {
        let partial = parse(&SINGLE_TEOS.replace("numRaysPerPoint=500", "numRaysPerPoint=12.5"));
        assert!(matches!(
            partial.merge_with_cli(&args(&[], None), ProcessOverrides::default()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn dimension_key_selects_three_dimensions() {
        let config = parse(&format!("dimension=3\n{}", SINGLE_TEOS))
            .merge_with_cli(&args(&[], None), ProcessOverrides::default())
            .unwrap();
        assert_eq!(config.dimension, Dimension::Three);
    }
}
