use crate::core::geometry::{Dimension, TrenchGeometry};
use crate::core::models::TeosParticleParameters;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub const DEFAULT_RAYS_PER_POINT: usize = 1000;
pub const DEFAULT_TIME_STEP_RATIO: f64 = 0.4999;
pub const DEFAULT_COVERAGE_ITERATIONS: usize = 10;
pub const DEFAULT_MAX_STEPS: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    /// Process time. Zero only computes the rates on the initial surface.
    pub duration: f64,
    pub rays_per_point: usize,
    /// Fraction of a grid spacing the fastest surface point may move per step.
    pub time_step_ratio: f64,
    /// Tracing rounds used to converge surface coverages before the first step.
    pub coverage_iterations: usize,
    /// Average fluxes over neighbouring surface points with similar normals.
    pub smoothing: bool,
    pub seed: u64,
    pub max_steps: usize,
}

#[derive(Default)]
pub struct ProcessConfigBuilder {
    duration: Option<f64>,
    rays_per_point: Option<usize>,
    time_step_ratio: Option<f64>,
    coverage_iterations: Option<usize>,
    smoothing: Option<bool>,
    seed: Option<u64>,
    max_steps: Option<usize>,
}

impl ProcessConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }
    pub fn rays_per_point(mut self, rays: usize) -> Self {
        self.rays_per_point = Some(rays);
        self
    }
    pub fn time_step_ratio(mut self, ratio: f64) -> Self {
        self.time_step_ratio = Some(ratio);
        self
    }
    pub fn coverage_iterations(mut self, iterations: usize) -> Self {
        self.coverage_iterations = Some(iterations);
        self
    }
    pub fn smoothing(mut self, enabled: bool) -> Self {
        self.smoothing = Some(enabled);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn build(self) -> Result<ProcessConfig, ConfigError> {
        let duration = self
            .duration
            .ok_or(ConfigError::MissingParameter("duration"))?;
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "duration",
                reason: format!("must be a non-negative number, got {}", duration),
            });
        }

        let rays_per_point = self.rays_per_point.unwrap_or(DEFAULT_RAYS_PER_POINT);
        if rays_per_point == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "rays_per_point",
                reason: "must be at least 1".to_string(),
            });
        }

        let time_step_ratio = self.time_step_ratio.unwrap_or(DEFAULT_TIME_STEP_RATIO);
        if !(time_step_ratio > 0.0 && time_step_ratio <= 0.5) {
            return Err(ConfigError::InvalidParameter {
                name: "time_step_ratio",
                reason: format!("must lie in (0, 0.5], got {}", time_step_ratio),
            });
        }

        let max_steps = self.max_steps.unwrap_or(DEFAULT_MAX_STEPS);
        if max_steps == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_steps",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(ProcessConfig {
            duration,
            rays_per_point,
            time_step_ratio,
            coverage_iterations: self
                .coverage_iterations
                .unwrap_or(DEFAULT_COVERAGE_ITERATIONS),
            smoothing: self.smoothing.unwrap_or(true),
            seed: self.seed.unwrap_or(0),
            max_steps,
        })
    }
}

/// Everything needed for the TEOS trench deposition pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TeosTrenchConfig {
    pub dimension: Dimension,
    pub geometry: TrenchGeometry,
    pub first_particle: TeosParticleParameters,
    pub second_particle: Option<TeosParticleParameters>,
    pub process: ProcessConfig,
}

#[derive(Default)]
pub struct TeosTrenchConfigBuilder {
    dimension: Option<Dimension>,
    geometry: Option<TrenchGeometry>,
    first_particle: Option<TeosParticleParameters>,
    second_particle: Option<TeosParticleParameters>,
    process: Option<ProcessConfig>,
}

impl TeosTrenchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }
    pub fn geometry(mut self, geometry: TrenchGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }
    pub fn first_particle(mut self, params: TeosParticleParameters) -> Self {
        self.first_particle = Some(params);
        self
    }
    pub fn second_particle(mut self, params: TeosParticleParameters) -> Self {
        self.second_particle = Some(params);
        self
    }
    pub fn process(mut self, process: ProcessConfig) -> Self {
        self.process = Some(process);
        self
    }

    pub fn build(self) -> Result<TeosTrenchConfig, ConfigError> {
        Ok(TeosTrenchConfig {
            dimension: self.dimension.unwrap_or_default(),
            geometry: self
                .geometry
                .ok_or(ConfigError::MissingParameter("geometry"))?,
            first_particle: self
                .first_particle
                .ok_or(ConfigError::MissingParameter("first_particle"))?,
            second_particle: self.second_particle,
            process: self
                .process
                .ok_or(ConfigError::MissingParameter("process"))?,
        })
    }
}
