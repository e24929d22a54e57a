//! dem-synth command-line front end.
//!
//! Usage:
//!   dem-synth render    [--dem-root <dir>] [--tex-root <dir>] [--params <file>] [--output <dir>]
//!                       [--start N] [--finish N] [--repeat N] [--x-res N] [--y-res N]
//!                       [--max-load N] [--gpu | --device cpu|gpu] [--passes a,b] [--script <file>]
//!                       [--reference-sphere true|false]
//!   dem-synth occupancy --scene <spheres.json> -i <model> -o <prefix>
//!                       [-n N] [-k N] [-p RATIO] [-s SIZE] [--viz-occupancy] [--seed N]
//!   dem-synth inspect   --dataset <dir>
//!
//! `render` records the DEM loop as a host command script for replay inside the 3D
//! application. `occupancy` runs the occupancy loop against an analytic sphere scene.
//! Set `RUST_LOG=debug` for per-point progress.

use bevy::app::App;
use bevy::log::{error, info, warn, LogPlugin};
use dem_synth::analytic::AnalyticScene;
use dem_synth::catalog::AssetCatalog;
use dem_synth::cli::{
    dem_run_config_from_args, occupancy_run_config_from_args, parse_arg, require_arg,
    rng_from_args, value_or,
};
use dem_synth::dataset::Dataset;
use dem_synth::driver::SceneDriver;
use dem_synth::params::load_parameters;
use dem_synth::script_host::ScriptHost;
use dem_synth::PipelineError;
use std::path::PathBuf;

const USAGE: &str = "usage: dem-synth <render|occupancy|inspect> [options]";

fn main() {
    App::new().add_plugins(LogPlugin::default());

    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("render") => render(&args),
        Some("occupancy") => occupancy(&args),
        Some("inspect") => inspect(&args),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn render(args: &[String]) -> Result<(), PipelineError> {
    let mut config = dem_run_config_from_args(args)?;
    let dem_root = parse_arg(args, "--dem-root").unwrap_or_else(|| "tiff_files/dems/".to_string());
    let tex_root = parse_arg(args, "--tex-root").unwrap_or_else(|| "tiff_files/texs/".to_string());
    let max_load: usize = value_or(args, &["--max-load"], 0)?;
    let params_path = config
        .parameter_file
        .get_or_insert_with(|| "arrays/shader.json".to_string())
        .clone();
    let script_path = parse_arg(args, "--script")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output_dir.join("host_script.json"));

    let catalog = AssetCatalog::scan(&dem_root, &tex_root, Some(max_load))?;
    let params = load_parameters(&params_path)?;
    info!("Loaded {} parameter records from {}", params.len(), params_path);

    let mut host = ScriptHost::new();
    let summary = SceneDriver::new(&mut host).run_dem(&catalog, &params, &config)?;
    host.save(&script_path)?;

    info!(
        "Recorded {} renders for {} samples into {}",
        summary.renders,
        summary.samples,
        script_path.display()
    );
    Ok(())
}

fn occupancy(args: &[String]) -> Result<(), PipelineError> {
    let config = occupancy_run_config_from_args(args)?;
    let scene_path = require_arg(args, "--scene")?;
    let mut rng = rng_from_args(args)?;

    let mut scene = AnalyticScene::from_scene_file(&scene_path)?;
    let summary = SceneDriver::new(&mut scene).run_occupancy(&config, &mut rng)?;

    if summary.occupied_points == 0 {
        warn!("No occupied points in {} samples; check the scene file", summary.samples);
    }
    info!(
        "{} samples, {}/{} points occupied, outputs in {}",
        summary.samples,
        summary.occupied_points,
        summary.total_points,
        config.output_dir.display()
    );
    Ok(())
}

fn inspect(args: &[String]) -> Result<(), PipelineError> {
    let root = require_arg(args, "--dataset")?;
    let dataset = Dataset::load(&root)?;
    let metadata = &dataset.metadata;

    println!("=== {} ===", root);
    println!("Kind: {:?}", metadata.kind);
    println!("Objects: {}", metadata.objects.len());
    println!("Samples: {}", dataset.len());
    println!(
        "Resolution: {}x{}",
        metadata.resolution[0], metadata.resolution[1]
    );
    if let Some(file) = &metadata.parameter_file {
        println!("Parameter file: {}", file);
    }

    let missing = dataset.missing_files();
    if missing.is_empty() {
        println!("All outputs present");
    } else {
        println!("Missing {} outputs:", missing.len());
        for path in missing.iter().take(20) {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
