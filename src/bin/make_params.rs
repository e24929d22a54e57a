//! Generate the lighting/camera parameter array for `dem-synth render`
//!
//! Every record holds the sun direction and light, the camera direction and the terrain
//! rotation for one render. Records are grouped in blocks of `--n-repeat` per image; with
//! `--top-image` (on by default) the first record of every block is a straight-down top
//! view.
//!
//! Usage:
//!   cargo run --bin make_params -- [--save-path <file>] [--n-repeat N] [--n-images N]
//!       [--sun-energy-size-low 2,0.01] [--sun-energy-size-high 5,0.5]
//!       [--sun-phi-theta-low 0,-180] [--sun-phi-theta-high 70,180]
//!       [--camera-phi-theta-low 0,-180] [--camera-phi-theta-high 35,180]
//!       [--dsm-theta-low -180] [--dsm-theta-high 180] [--top-image true|false] [--seed N]
//!
//! Default output: arrays/shader.json

use bevy::app::App;
use bevy::log::{error, info, LogPlugin};
use dem_synth::cli::{parameter_config_from_args, parse_arg, rng_from_args};
use dem_synth::params::{generate_parameters, save_parameters};
use dem_synth::PipelineError;

fn main() {
    App::new().add_plugins(LogPlugin::default());

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), PipelineError> {
    let save_path = parse_arg(args, "--save-path").unwrap_or_else(|| "arrays/shader.json".to_string());
    let config = parameter_config_from_args(args)?;
    let mut rng = rng_from_args(args)?;
    let count = config.sample_count()?;

    info!(
        "Generating {} records ({} images x {} repeats, top view {})",
        count,
        config.n_images,
        config.n_repeat,
        if config.top_view { "on" } else { "off" }
    );

    let params = generate_parameters(&config, &mut rng)?;
    save_parameters(&save_path, &params)?;

    info!("Saved {} parameter records to {}", params.len(), save_path);
    Ok(())
}
