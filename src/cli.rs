//! Command-line helpers shared by the binaries.
//!
//! Flags use the `--flag value` form. Lookups are positional and forgiving (unknown flags
//! are ignored), but a value that is present and fails to parse is a
//! [`ConfigError::InvalidArgument`].

use crate::backend::{parse_device, RenderDevice, RenderSettings};
use crate::driver::{DemRunConfig, OccupancyRunConfig};
use crate::error::ConfigError;
use crate::params::{Bound, ParameterConfig, ParameterRange};
use crate::{RenderPass, Resolution};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::str::FromStr;

/// Value following `flag`, if any.
pub fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

/// Value of the first of `flags` that is present.
pub fn parse_any(args: &[String], flags: &[&str]) -> Option<(String, String)> {
    flags
        .iter()
        .find_map(|flag| parse_arg(args, flag).map(|value| (flag.to_string(), value)))
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Typed value of the first of `flags` that is present.
pub fn parse_value<T: FromStr>(args: &[String], flags: &[&str]) -> Result<Option<T>, ConfigError> {
    match parse_any(args, flags) {
        Some((flag, value)) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidArgument { flag, value }),
        None => Ok(None),
    }
}

/// Like [`parse_value`], falling back to `default`.
pub fn value_or<T: FromStr>(args: &[String], flags: &[&str], default: T) -> Result<T, ConfigError> {
    Ok(parse_value(args, flags)?.unwrap_or(default))
}

pub fn require_arg(args: &[String], flag: &str) -> Result<String, ConfigError> {
    parse_arg(args, flag).ok_or_else(|| ConfigError::MissingArgument(flag.to_string()))
}

/// Boolean flag: bare `--flag` is true, `--flag false` / `--flag 0` is false.
pub fn parse_bool(args: &[String], flag: &str, default: bool) -> Result<bool, ConfigError> {
    if !has_flag(args, flag) {
        return Ok(default);
    }
    match parse_arg(args, flag).as_deref() {
        Some("false") | Some("False") | Some("0") => Ok(false),
        Some("true") | Some("True") | Some("1") => Ok(true),
        _ => Ok(true),
    }
}

/// Comma-separated numbers, e.g. `--sun-phi-theta-low 0,-180`.
pub fn parse_list(args: &[String], flag: &str) -> Result<Option<Vec<f64>>, ConfigError> {
    let Some(value) = parse_arg(args, flag) else {
        return Ok(None);
    };
    value
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidArgument {
            flag: flag.to_string(),
            value,
        })
}

fn parse_bound(args: &[String], flag: &str) -> Result<Option<Bound>, ConfigError> {
    Ok(parse_list(args, flag)?.map(|values| match values.as_slice() {
        [single] => Bound::Scalar(*single),
        _ => Bound::List(values),
    }))
}

fn parse_range(
    args: &[String],
    low_flag: &str,
    high_flag: &str,
    default: ParameterRange,
) -> Result<ParameterRange, ConfigError> {
    Ok(ParameterRange {
        low: parse_bound(args, low_flag)?.unwrap_or(default.low),
        high: parse_bound(args, high_flag)?.unwrap_or(default.high),
    })
}

/// Seeded generator when `--seed` is given, OS entropy otherwise.
pub fn rng_from_args(args: &[String]) -> Result<StdRng, ConfigError> {
    Ok(match parse_value::<u64>(args, &["--seed"])? {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    })
}

/// `--device cpu|gpu`, or `--gpu` as a shorthand.
pub fn device_from_args(args: &[String], default: RenderDevice) -> Result<RenderDevice, ConfigError> {
    if let Some(value) = parse_arg(args, "--device") {
        return parse_device(&value).ok_or(ConfigError::UnknownDevice(value));
    }
    Ok(if parse_bool(args, "--gpu", false)? {
        RenderDevice::Gpu
    } else {
        default
    })
}

/// Bounds and counts for `make_params`.
pub fn parameter_config_from_args(args: &[String]) -> Result<ParameterConfig, ConfigError> {
    let defaults = ParameterConfig::default();
    Ok(ParameterConfig {
        sun_phi_theta: parse_range(
            args,
            "--sun-phi-theta-low",
            "--sun-phi-theta-high",
            defaults.sun_phi_theta,
        )?,
        sun_energy_size: parse_range(
            args,
            "--sun-energy-size-low",
            "--sun-energy-size-high",
            defaults.sun_energy_size,
        )?,
        camera_phi_theta: parse_range(
            args,
            "--camera-phi-theta-low",
            "--camera-phi-theta-high",
            defaults.camera_phi_theta,
        )?,
        rotation: parse_range(args, "--dsm-theta-low", "--dsm-theta-high", defaults.rotation)?,
        n_repeat: value_or(args, &["--n-repeat"], defaults.n_repeat)?,
        n_images: value_or(args, &["--n-images"], defaults.n_images)?,
        top_view: parse_bool(args, "--top-image", defaults.top_view)?,
    })
}

/// `--passes composite,albedo`; all passes when absent.
pub fn passes_from_args(args: &[String]) -> Result<Vec<RenderPass>, ConfigError> {
    match parse_arg(args, "--passes") {
        Some(value) => value.split(',').map(str::parse).collect(),
        None => Ok(RenderPass::ALL.to_vec()),
    }
}

/// Options of `dem-synth render`.
pub fn dem_run_config_from_args(args: &[String]) -> Result<DemRunConfig, ConfigError> {
    let defaults = DemRunConfig::default();
    let resolution = Resolution::new(
        value_or(args, &["--x-res"], defaults.settings.resolution.width)?,
        value_or(args, &["--y-res"], defaults.settings.resolution.height)?,
    );
    let settings = defaults
        .settings
        .clone()
        .with_device(device_from_args(args, defaults.settings.device)?)
        .with_resolution(resolution);
    Ok(DemRunConfig {
        output_dir: PathBuf::from(
            parse_arg(args, "--output").unwrap_or_else(|| "output/normals/".to_string()),
        ),
        start: value_or(args, &["--start"], 0)?,
        finish: Some(value_or(args, &["--finish"], 10)?),
        repeat: value_or(args, &["--repeat"], defaults.repeat)?,
        settings,
        passes: passes_from_args(args)?,
        parameter_file: parse_arg(args, "--params"),
        reference_sphere: parse_bool(args, "--reference-sphere", defaults.reference_sphere)?,
        ..defaults
    })
}

/// Options of `dem-synth occupancy`.
pub fn occupancy_run_config_from_args(args: &[String]) -> Result<OccupancyRunConfig, ConfigError> {
    let model = parse_any(args, &["-i", "--input"])
        .map(|(_, value)| value)
        .ok_or_else(|| ConfigError::MissingArgument("--input".to_string()))?;
    let out = parse_any(args, &["-o", "--out"])
        .map(|(_, value)| value)
        .ok_or_else(|| ConfigError::MissingArgument("--out".to_string()))?;

    let mut config = OccupancyRunConfig::new(model, out);
    config.samples = value_or(args, &["-n", "--n-samples"], config.samples)?;
    config.occupancy.samples = value_or(args, &["-k", "--k-occupancy-samples"], config.occupancy.samples)?;
    config.occupancy.pad_ratio = value_or(args, &["-p", "--bbox-pad-ratio"], config.occupancy.pad_ratio)?;
    let size: u32 = value_or(args, &["-s", "--size"], config.settings.resolution.width)?;
    config.settings = RenderSettings::model_default(size)
        .with_device(device_from_args(args, config.settings.device)?);
    config.viz_occupancy = parse_bool(args, "--viz-occupancy", false)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_arg() {
        let a = args("prog --output out/dir --start 3");
        assert_eq!(parse_arg(&a, "--output").as_deref(), Some("out/dir"));
        assert_eq!(parse_arg(&a, "--finish"), None);
        // Flag without a value
        assert_eq!(parse_arg(&args("prog --gpu"), "--gpu"), None);
    }

    #[test]
    fn test_typed_values() {
        let a = args("prog --start 3 --repeat x");
        assert_eq!(parse_value::<usize>(&a, &["--start"]).unwrap(), Some(3));
        let err = parse_value::<usize>(&a, &["--repeat"]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidArgument {
                flag: "--repeat".to_string(),
                value: "x".to_string()
            }
        );
        assert_eq!(value_or(&a, &["--finish"], 10usize).unwrap(), 10);
    }

    #[test]
    fn test_short_and_long_aliases() {
        let a = args("prog --n-samples 4");
        assert_eq!(parse_value::<usize>(&a, &["-n", "--n-samples"]).unwrap(), Some(4));
        let a = args("prog -n 2");
        assert_eq!(parse_value::<usize>(&a, &["-n", "--n-samples"]).unwrap(), Some(2));
    }

    #[test]
    fn test_bool_flags() {
        assert!(parse_bool(&args("prog --viz-occupancy"), "--viz-occupancy", false).unwrap());
        assert!(!parse_bool(&args("prog --top-image false"), "--top-image", true).unwrap());
        assert!(parse_bool(&args("prog"), "--top-image", true).unwrap());
    }

    #[test]
    fn test_list_values() {
        let a = args("prog --sun-phi-theta-low 10,-90 --bad 1,x");
        assert_eq!(parse_list(&a, "--sun-phi-theta-low").unwrap(), Some(vec![10.0, -90.0]));
        assert!(parse_list(&a, "--bad").is_err());
        assert_eq!(
            parse_list(&args("prog --b [2,0.5]"), "--b").unwrap(),
            Some(vec![2.0, 0.5])
        );
    }

    #[test]
    fn test_parameter_config_overrides() {
        let a = args("prog --n-repeat 4 --n-images 2 --dsm-theta-low -90 --sun-energy-size-high 6,0.2 --top-image false");
        let config = parameter_config_from_args(&a).unwrap();
        assert_eq!(config.sample_count(), Ok(8));
        assert_eq!(config.rotation.low, Bound::Scalar(-90.0));
        assert_eq!(config.sun_energy_size.high, Bound::List(vec![6.0, 0.2]));
        assert!(!config.top_view);
        assert_eq!(config.camera_phi_theta, ParameterConfig::default().camera_phi_theta);
    }

    #[test]
    fn test_dem_run_config_defaults() {
        let config = dem_run_config_from_args(&args("prog render")).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output/normals/"));
        assert_eq!((config.start, config.finish, config.repeat), (0, Some(10), 10));
        assert_eq!(config.settings.resolution, Resolution::square(512));
        assert_eq!(config.settings.device, RenderDevice::Cpu);
        assert!(config.reference_sphere);
    }

    #[test]
    fn test_dem_run_config_flags() {
        let a = args("prog render --x-res 256 --y-res 128 --gpu --start 2 --finish 4 --params arrays/shader.json");
        let config = dem_run_config_from_args(&a).unwrap();
        assert_eq!(config.settings.resolution, Resolution::new(256, 128));
        assert_eq!(config.settings.device, RenderDevice::Gpu);
        assert_eq!((config.start, config.finish), (2, Some(4)));
        assert_eq!(config.parameter_file.as_deref(), Some("arrays/shader.json"));

        let bare = dem_run_config_from_args(&args("prog render --reference-sphere false")).unwrap();
        assert!(!bare.reference_sphere);

        let err = dem_run_config_from_args(&args("prog render --device tpu")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDevice(_)));
    }

    #[test]
    fn test_passes_flag() {
        let passes = passes_from_args(&args("prog render --passes composite,albedo")).unwrap();
        assert_eq!(passes, vec![RenderPass::Composite, RenderPass::Albedo]);
        assert_eq!(passes_from_args(&args("prog")).unwrap().len(), 8);
        assert!(passes_from_args(&args("prog --passes composite,sky")).is_err());
    }

    #[test]
    fn test_occupancy_run_config() {
        let a = args("prog occupancy -i tree.blend -o renders/tree -n 3 -k 64 -p 0.2 -s 256 --viz-occupancy");
        let config = occupancy_run_config_from_args(&a).unwrap();
        assert_eq!(config.model, PathBuf::from("tree.blend"));
        assert_eq!(config.sample_basename(0), "tree_n0_k64");
        assert_eq!(config.samples, 3);
        assert!((config.occupancy.pad_ratio - 0.2).abs() < 1e-6);
        assert_eq!(config.settings.resolution, Resolution::square(256));
        assert!(config.viz_occupancy);

        let missing = occupancy_run_config_from_args(&args("prog occupancy -i tree.blend"));
        assert_eq!(missing.unwrap_err(), ConfigError::MissingArgument("--out".to_string()));
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let a = args("prog --seed 42");
        let x: f64 = rng_from_args(&a).unwrap().gen();
        let y: f64 = rng_from_args(&a).unwrap().gen();
        assert_eq!(x, y);
    }
}
