use crate::cli::CheckArgs;
use crate::config::{PartialRunConfig, ProcessOverrides};
use crate::error::Result;
use procsim::core::models::TeosParticleParameters;
use procsim::engine::config::TeosTrenchConfig;
use tracing::info;

pub fn run(args: CheckArgs) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.config.config)?;
    let final_config = partial_config.merge_with_cli(&args.config, ProcessOverrides::default())?;
    info!("Parameter file {:?} is valid.", &args.config.config);
    println!("{}", describe(&final_config));
    Ok(())
}

fn describe(config: &TeosTrenchConfig) -> String {
    let geometry = &config.geometry;
    let process = &config.process;
    let mut lines = vec![
        format!("Dimension:           {}", config.dimension),
        format!("Grid spacing:        {}", geometry.grid_delta),
        format!(
            "Extent:              {} x {}",
            geometry.x_extent, geometry.y_extent
        ),
        format!(
            "Trench:              width {}, depth {}, taper {} deg",
            geometry.trench_width, geometry.trench_depth, geometry.taper_angle
        ),
        format!("Base height:         {}", geometry.base_height),
        format!("Periodic boundaries: {}", geometry.periodic_boundary),
        describe_particle(1, &config.first_particle),
    ];
    if let Some(second) = &config.second_particle {
        lines.push(describe_particle(2, second));
    }
    lines.push(format!("Process time:        {}", process.duration));
    lines.push(format!("Rays per point:      {}", process.rays_per_point));
    lines.push(format!("Time step ratio:     {}", process.time_step_ratio));
    lines.push(format!("Random seed:         {}", process.seed));
    lines.join("\n")
}

fn describe_particle(index: usize, particle: &TeosParticleParameters) -> String {
    format!(
        "Particle {}:          sticking {}, rate {}, order {}",
        index, particle.sticking_probability, particle.rate, particle.order
    )
}
