//! Integration test: whole pipeline without a 3D application
//!
//! Runs the DEM loop against the command-recording host and the occupancy loop against
//! the analytic sphere scene, then reads both datasets back from disk.

use dem_synth::analytic::{AnalyticScene, Sphere};
use dem_synth::catalog::AssetCatalog;
use dem_synth::dataset::{Dataset, DatasetKind, VIZ_OCCUPANCY_KEY};
use dem_synth::driver::{DemRunConfig, OccupancyRunConfig, SceneDriver};
use dem_synth::host::ObjectKind;
use dem_synth::params::{generate_parameters, load_parameters, save_parameters, ParameterConfig};
use dem_synth::script_host::{HostCommand, ScriptHost};
use dem_synth::{RenderPass, Vec3};
use image::{ImageBuffer, Rgba};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_rasters(root: &Path, count: usize) {
    let dems = root.join("dems");
    let texs = root.join("texs");
    fs::create_dir_all(&dems).unwrap();
    fs::create_dir_all(&texs).unwrap();
    for i in 0..count {
        fs::write(dems.join(format!("dem_{:03}.tif", i)), b"").unwrap();
        fs::write(texs.join(format!("tex_{:03}.tif", i)), b"").unwrap();
    }
}

#[test]
fn test_dem_pipeline_script_and_index() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_rasters(root, 3);

    let config = ParameterConfig {
        n_repeat: 2,
        n_images: 3,
        ..Default::default()
    };
    let params = generate_parameters(&config, &mut StdRng::seed_from_u64(5)).unwrap();
    let params_path = root.join("arrays").join("shader.json");
    save_parameters(&params_path, &params).unwrap();
    let params = load_parameters(&params_path).unwrap();

    let catalog = AssetCatalog::scan(root.join("dems"), root.join("texs"), Some(2)).unwrap();
    assert_eq!(catalog.len(), 2);

    let output = root.join("output");
    let run = DemRunConfig {
        output_dir: output.clone(),
        repeat: 2,
        parameter_file: Some("arrays/shader.json".to_string()),
        ..Default::default()
    };
    let mut host = ScriptHost::new();
    let summary = SceneDriver::new(&mut host)
        .run_dem(&catalog, &params, &run)
        .unwrap();
    assert_eq!(summary.samples, 4);
    assert_eq!(host.render_count(), 4 * RenderPass::ALL.len());

    let script = output.join("host_script.json");
    host.save(&script).unwrap();
    let commands = ScriptHost::load_commands(&script).unwrap();
    let imports = commands
        .iter()
        .filter(|c| matches!(c, HostCommand::ImportElevation { .. }))
        .count();
    assert_eq!(imports, 2);

    let dataset = Dataset::load(&output).unwrap();
    assert_eq!(dataset.metadata.kind, DatasetKind::Dem);
    assert_eq!(dataset.metadata.objects, vec!["dem_000", "dem_001"]);
    assert_eq!(dataset.len(), 4);
    for k in 0..4 {
        assert_eq!(dataset.parameters(k).unwrap(), params[k]);
    }
    assert!(dataset.parameters(0).unwrap().is_top_view());

    // Nothing rendered yet: every pass image is missing until the script is replayed
    assert_eq!(dataset.missing_files().len(), 4 * RenderPass::ALL.len());

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_fn(4, 4, |_, _| Rgba([10, 20, 30, 255]));
    img.save(output.join("3_albedo.png")).unwrap();
    let loaded = dataset.pass_image(3, RenderPass::Albedo).unwrap();
    assert_eq!(loaded.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
}

#[test]
fn test_occupancy_pipeline_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let mut scene = AnalyticScene::new();
    scene.register_model(
        "tree.blend",
        vec![
            Sphere::new(Vec3::new(0.0, 0.0, 5.0), 3.0),
            Sphere::new(Vec3::new(0.0, 0.0, 1.0), 1.0),
        ],
    );

    let mut config = OccupancyRunConfig::new("tree.blend", root.join("renders").join("tree"));
    config.samples = 2;
    config.occupancy.samples = 128;
    config.viz_occupancy = true;

    let mut rng = StdRng::seed_from_u64(99);
    let summary = SceneDriver::new(&mut scene)
        .run_occupancy(&config, &mut rng)
        .unwrap();
    assert_eq!(summary.samples, 2);
    assert_eq!(summary.renders, 4);
    assert!(scene.objects_of_kind(ObjectKind::Marker).is_empty());

    let dataset = Dataset::load(root.join("renders")).unwrap();
    assert_eq!(dataset.metadata.kind, DatasetKind::Occupancy);
    assert_eq!(dataset.metadata.occupancy_points, Some(128));

    let mut occupied = 0;
    for n in 0..2 {
        let table = dataset.occupancy(n).unwrap();
        assert_eq!(table.len(), 128);
        assert!(table.rows.iter().all(|row| row[3] == 0.0 || row[3] == 1.0));
        occupied += table.occupied_count();

        let record = dataset.sample(n).unwrap();
        assert_eq!(
            record.file(RenderPass::Composite.as_str()),
            Some(format!("tree_n{}_k128_render.png", n).as_str())
        );
        assert!(record.file(VIZ_OCCUPANCY_KEY).is_some());
    }
    assert_eq!(occupied, summary.occupied_points);

    // Only the occupancy tables exist on disk; the analytic host does not write images
    let missing = dataset.missing_files();
    assert_eq!(missing.len(), 4);
    assert!(missing
        .iter()
        .all(|p| p.extension().is_some_and(|ext| ext == "png")));
}
