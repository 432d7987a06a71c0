//! First-order Engquist-Osher upwind integration of the level-set equation
//! `phi_t + V |grad phi| = 0` on the narrow band of the top layer.

use super::error::EngineError;
use crate::core::domain::Domain;
use crate::core::grid::GridIndex;
use crate::core::levelset::LevelSet;
use tracing::{debug, instrument};

/// The domain grows vertically once the surface comes this close to the grid bounds.
pub const EXTENSION_MARGIN_CELLS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvectionStep {
    pub time_step: f64,
    /// Whether the grid was extended after the step.
    pub extended: bool,
}

/// Largest stable time step, or `None` when nothing moves.
pub fn stable_time_step(velocities: &[f64], delta: f64, time_step_ratio: f64) -> Option<f64> {
    let max_speed = velocities.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    (max_speed > 0.0).then(|| time_step_ratio * delta / max_speed)
}

/// Moves the top surface with `velocities` (one per active point of the top layer, in the order
/// of `LevelSet::active_points`) for at most `max_time_step`.
///
/// Positive velocities grow material. After an etching step, every lower layer is clipped to
/// the new top surface.
#[instrument(skip_all, name = "advection_step")]
pub fn advect(
    domain: &mut Domain,
    velocities: &[f64],
    max_time_step: f64,
    time_step_ratio: f64,
) -> Result<AdvectionStep, EngineError> {
    let delta = domain.grid().delta();
    let top = domain.top_level_set_mut()?;
    let active = top.active_points();
    if active.len() != velocities.len() {
        return Err(EngineError::Internal(format!(
            "{} velocities supplied for {} active points",
            velocities.len(),
            active.len()
        )));
    }

    let Some(stable) = stable_time_step(velocities, delta, time_step_ratio) else {
        return Ok(AdvectionStep {
            time_step: max_time_step,
            extended: false,
        });
    };
    let time_step = stable.min(max_time_step);

    let current: &LevelSet = top;
    let updated: Vec<(usize, f64)> = active
        .iter()
        .zip(velocities)
        .map(|(index, &velocity)| {
            let linear = current.grid().linear_index(index);
            let phi = current.value_linear(linear);
            let step = time_step * velocity * upwind_gradient_norm(current, index, velocity);
            (linear, phi - step)
        })
        .collect();

    let fixed: Vec<usize> = updated.iter().map(|(linear, _)| *linear).collect();
    for (linear, value) in updated {
        top.set_linear(linear, value);
    }
    top.reinitialize_from(&fixed);

    if velocities.iter().any(|v| *v < 0.0) {
        domain.enforce_nesting()?;
    }
    let extended = domain.extend_vertical_if_needed(EXTENSION_MARGIN_CELLS)?;

    debug!(time_step, extended, "Advanced surface.");
    Ok(AdvectionStep {
        time_step,
        extended,
    })
}

/// Engquist-Osher approximation of `|grad phi|`, upwinded for the sign of the velocity.
/// Differences towards a missing neighbour count as zero.
fn upwind_gradient_norm(level_set: &LevelSet, index: &GridIndex, velocity: f64) -> f64 {
    let delta = level_set.grid().delta();
    let phi = level_set.value(index);
    let mut sum = 0.0;
    for axis in 0..level_set.grid().dim() {
        let backward = level_set
            .neighbor_value(index, axis, -1)
            .map_or(0.0, |n| (phi - n) / delta);
        let forward = level_set
            .neighbor_value(index, axis, 1)
            .map_or(0.0, |n| (n - phi) / delta);
        let (b, f) = if velocity > 0.0 {
            (backward.max(0.0), forward.min(0.0))
        } else {
            (backward.min(0.0), forward.max(0.0))
        };
        sum += b * b + f * f;
    }
    sum.sqrt()
}
