use crate::cli::RunArgs;
use crate::config::{PartialRunConfig, ProcessOverrides};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use procsim::core::io::write_surface_to_path;
use procsim::core::surface::SurfacePointCloud;
use procsim::engine::progress::ProgressReporter;
use procsim::workflows;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.config.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let overrides = ProcessOverrides {
        rays_per_point: args.rays_per_point,
        process_time: args.process_time,
        seed: args.seed,
    };
    let final_config = partial_config.merge_with_cli(&args.config, overrides)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting {} TEOS deposition ({} particle type(s), process time {})...",
        final_config.dimension,
        if final_config.second_particle.is_some() { 2 } else { 1 },
        final_config.process.duration
    );
    info!("Invoking the TEOS trench workflow...");
    let result = workflows::teos_trench::run(&final_config, &reporter)?;

    info!(
        steps = result.process.steps,
        elapsed = result.process.elapsed,
        "Workflow finished."
    );
    if result.process.stopped_early {
        warn!(
            "Process stopped early at t = {:.4} of {:.4}.",
            result.process.elapsed, final_config.process.duration
        );
        println!(
            "Warning: the process stopped early at t = {:.4}.",
            result.process.elapsed
        );
    }

    std::fs::create_dir_all(&args.output_dir)?;
    let initial_path = output_path(&args.output_dir, &args.name, "initial");
    let final_path = output_path(&args.output_dir, &args.name, "final");
    write_surface(&result.initial_surface, &initial_path)?;
    write_surface(&result.final_surface, &final_path)?;

    println!(
        "✓ {} steps simulated. Surfaces written to: {} and {}",
        result.process.steps,
        initial_path.display(),
        final_path.display()
    );
    Ok(())
}

fn output_path(dir: &Path, name: &str, stage: &str) -> PathBuf {
    dir.join(format!("{}_{}.csv", name, stage))
}

fn write_surface(surface: &SurfacePointCloud, path: &Path) -> Result<()> {
    info!(points = surface.len(), "Writing surface to {:?}", path);
    write_surface_to_path(surface, path).map_err(|e| CliError::Output {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ConfigArgs;
    use procsim::core::io::read_surface_from_path;

    const SMALL_RUN: &str = "\
gridDelta=0.1
xExtent=1.0
trenchWidth=0.4
trenchHeight=0.4
processTime=0.2
numRaysPerPoint=20
stickingProbabilityP1=0.1
depositionRateP1=0.5
";

    #[test]
    fn output_paths_use_name_and_stage() {
        let path = output_path(Path::new("out"), "SingleTEOS", "final");
        assert_eq!(path, PathBuf::from("out/SingleTEOS_final.csv"));
    }

    #[test]
    fn run_writes_initial_and_final_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("params.txt");
        std::fs::write(&config_path, SMALL_RUN).unwrap();
        let output_dir = dir.path().join("results");

        let args = RunArgs {
            config: ConfigArgs {
                config: config_path,
                dim: None,
                set_values: vec![],
            },
            output_dir: output_dir.clone(),
            name: "Small".to_string(),
            rays_per_point: None,
            process_time: None,
            seed: Some(3),
        };
        run(args).unwrap();

        let initial = read_surface_from_path(output_dir.join("Small_initial.csv")).unwrap();
        let final_rows = read_surface_from_path(output_dir.join("Small_final.csv")).unwrap();
        assert!(!initial.is_empty());
        assert!(!final_rows.is_empty());
    }

    #[test]
    fn missing_config_file_fails_before_simulating() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            config: ConfigArgs {
                config: dir.path().join("absent.txt"),
                dim: None,
                set_values: vec![],
            },
            output_dir: dir.path().to_path_buf(),
            name: "Absent".to_string(),
            rays_per_point: None,
            process_time: None,
            seed: None,
        };
        assert!(matches!(run(args), Err(CliError::Io(_))));
        assert!(!dir.path().join("Absent_initial.csv").exists());
    }
}
