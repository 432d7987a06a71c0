use super::process::{self, ProcessResult, model_error};
use crate::core::domain::Domain;
use crate::core::material::Material;
use crate::core::models::TeosDeposition;
use crate::core::surface::SurfacePointCloud;
use crate::engine::config::TeosTrenchConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

const MODEL_NAME: &str = "TEOSDeposition";

#[derive(Debug)]
pub struct TeosTrenchResult {
    pub initial_surface: SurfacePointCloud,
    pub final_surface: SurfacePointCloud,
    pub domain: Domain,
    pub process: ProcessResult,
}

/// Builds the trench, covers it with an SiO2 layer and runs TEOS deposition on it.
#[instrument(skip_all, name = "teos_trench_workflow", fields(dim = %config.dimension))]
pub fn run(
    config: &TeosTrenchConfig,
    reporter: &ProgressReporter,
) -> Result<TeosTrenchResult, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Geometry" });
    let mut domain = config.geometry.apply(config.dimension)?;
    domain.duplicate_top_level_set(Material::SiO2)?;
    let initial_surface = domain.surface_points()?;
    info!(
        points = initial_surface.len(),
        layers = domain.len(),
        "Trench geometry ready."
    );
    reporter.report(Progress::PhaseFinish);

    let deposition = match config.second_particle {
        Some(second) => TeosDeposition::multi(config.first_particle, second),
        None => TeosDeposition::single(config.first_particle),
    }
    .map_err(model_error(MODEL_NAME))?;
    let mut model = deposition
        .process_model()
        .map_err(model_error(MODEL_NAME))?;

    let process = process::run(&mut domain, &mut model, &config.process, reporter)?;
    let final_surface = domain.surface_points()?;

    Ok(TeosTrenchResult {
        initial_surface,
        final_surface,
        domain,
        process,
    })
}
