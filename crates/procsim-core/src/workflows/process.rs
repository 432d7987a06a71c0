use crate::core::domain::Domain;
use crate::core::models::{ModelError, PointData, ProcessModel};
use crate::core::surface::SurfacePointCloud;
use crate::engine::advection::{advect, stable_time_step};
use crate::engine::config::ProcessConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tracer::Tracer;
use tracing::{debug, info, instrument, warn};

/// Remaining process time below this fraction of the duration is considered consumed.
const TIME_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Process time actually simulated.
    pub elapsed: f64,
    pub steps: usize,
    /// Rates that drove the last step, or the initial rates for a zero duration.
    pub final_rates: PointData,
    /// Whether the process ended before its duration because nothing moved or the step limit
    /// was reached.
    pub stopped_early: bool,
}

/// Runs `model` on `domain` for `config.duration`, alternating flux estimation and surface
/// advection.
#[instrument(skip_all, name = "process_workflow", fields(model = model.name()))]
pub fn run(
    domain: &mut Domain,
    model: &mut ProcessModel,
    config: &ProcessConfig,
    reporter: &ProgressReporter,
) -> Result<ProcessResult, EngineError> {
    domain.validate()?;
    if model.particles().is_empty() {
        return Err(model_error(model.name())(ModelError::InvalidParameter {
            name: "particles",
            reason: "the process model has no particle types".to_string(),
        }));
    }

    let mut surface = domain.surface_points()?;
    if surface.is_empty() {
        return Err(EngineError::NoSurface);
    }
    info!(
        duration = config.duration,
        points = surface.len(),
        "Starting process '{}'.",
        model.name()
    );

    let mut trace_round: u64 = 0;
    let mut next_seed = || {
        let seed = config.seed.wrapping_add(trace_round);
        trace_round += 1;
        seed
    };

    model.surface_model_mut().initialize_coverages(surface.len());
    if model.has_coverages() {
        initialize_coverages(domain, &surface, model, config, reporter, &mut next_seed)?;
    }

    reporter.report(Progress::PhaseStart { name: "Process" });
    let (mut rates, mut velocities) =
        compute_rates(domain, &surface, model, config, next_seed())?;

    let mut elapsed = 0.0;
    let mut steps = 0;
    let mut stopped_early = false;
    let remaining = |elapsed: f64| config.duration - elapsed > TIME_TOLERANCE * config.duration;

    while remaining(elapsed) {
        if steps >= config.max_steps {
            warn!(
                steps,
                elapsed, "Reached the step limit before the end of the process."
            );
            stopped_early = true;
            break;
        }
        if stable_time_step(&velocities, domain.grid().delta(), config.time_step_ratio).is_none() {
            warn!(elapsed, "All surface velocities are zero; ending the process early.");
            stopped_early = true;
            break;
        }

        let old_indices = surface.grid_indices();
        let step = advect(
            domain,
            &velocities,
            config.duration - elapsed,
            config.time_step_ratio,
        )?;
        elapsed += step.time_step;
        steps += 1;
        reporter.report(Progress::TimeAdvanced {
            elapsed,
            total: config.duration,
        });

        surface = domain.surface_points()?;
        if surface.is_empty() {
            return Err(EngineError::NoSurface);
        }
        if let Some(coverages) = model.surface_model_mut().coverages_mut() {
            *coverages = coverages.remap(&old_indices, &surface.grid_indices());
        }
        debug!(step = steps, elapsed, points = surface.len(), "Process step done.");

        if remaining(elapsed) {
            (rates, velocities) = compute_rates(domain, &surface, model, config, next_seed())?;
        }
    }
    reporter.report(Progress::PhaseFinish);

    info!(elapsed, steps, "Process '{}' finished.", model.name());
    Ok(ProcessResult {
        elapsed,
        steps,
        final_rates: rates,
        stopped_early,
    })
}

fn initialize_coverages(
    domain: &Domain,
    surface: &SurfacePointCloud,
    model: &mut ProcessModel,
    config: &ProcessConfig,
    reporter: &ProgressReporter,
    next_seed: &mut impl FnMut() -> u64,
) -> Result<(), EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Coverage Initialization",
    });
    reporter.report(Progress::TaskStart {
        total_steps: config.coverage_iterations as u64,
    });

    let tracer = Tracer::new(domain.grid(), surface, config.rays_per_point, config.smoothing)?;
    let materials = surface.materials();
    for _ in 0..config.coverage_iterations {
        let rates = tracer.trace(
            model.particles(),
            model.surface_model().coverages(),
            next_seed(),
        );
        let name = model.name().to_string();
        model
            .surface_model_mut()
            .update_coverages(&rates, &materials)
            .map_err(model_error(&name))?;
        reporter.report(Progress::TaskIncrement);
    }

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    debug!(
        iterations = config.coverage_iterations,
        "Surface coverages initialized."
    );
    Ok(())
}

/// Traces all particle types on `surface` and evaluates the surface model.
fn compute_rates(
    domain: &Domain,
    surface: &SurfacePointCloud,
    model: &mut ProcessModel,
    config: &ProcessConfig,
    seed: u64,
) -> Result<(PointData, Vec<f64>), EngineError> {
    let tracer = Tracer::new(domain.grid(), surface, config.rays_per_point, config.smoothing)?;
    let rates = tracer.trace(model.particles(), model.surface_model().coverages(), seed);

    let name = model.name().to_string();
    let surface_model = model.surface_model_mut();
    surface_model
        .update_coverages(&rates, &surface.materials())
        .map_err(model_error(&name))?;
    let velocities = surface_model
        .calculate_velocities(&rates, surface)
        .map_err(model_error(&name))?;
    if velocities.len() != surface.len() {
        return Err(EngineError::Internal(format!(
            "model '{}' returned {} velocities for {} surface points",
            name,
            velocities.len(),
            surface.len()
        )));
    }
    Ok((rates, velocities))
}

pub(crate) fn model_error(name: &str) -> impl Fn(ModelError) -> EngineError + '_ {
    move |source| EngineError::Model {
        model: name.to_string(),
        source,
    }
}
