use argh::FromArgs;
use rand::{rngs::StdRng, SeedableRng};
use std::path::{Path, PathBuf};

use photoscan::k3d::pointcloud::PointCloud;
use photoscan::registration::icp::DEFAULT_ICP_THRESHOLD;
use photoscan::registration::pipeline::{
    align_pair, load_point_cloud, validate_inputs, AlignmentConfig, DEFAULT_VERTEX_COUNT,
};
use photoscan::registration::ransac::{RansacParams, DEFAULT_VOXEL_SIZE};

#[derive(FromArgs)]
/// Align a source model onto one or more target models and print the transforms
struct Args {
    /// path of the source model (PLY or OBJ)
    #[argh(option, short = 's')]
    source: PathBuf,

    /// path of a target model, repeat the flag for several targets
    #[argh(option, short = 't')]
    targets: Vec<PathBuf>,

    /// voxel size of the coarse alignment, in model units
    #[argh(option, short = 'v', default = "DEFAULT_VOXEL_SIZE")]
    voxel_size: f64,

    /// number of points sampled on every model
    #[argh(option, short = 'n', default = "DEFAULT_VERTEX_COUNT")]
    vertex_count: usize,

    /// maximum correspondence distance of the fine alignment
    #[argh(option, default = "DEFAULT_ICP_THRESHOLD")]
    icp_threshold: f64,

    /// seed of the point sampling and RANSAC, random when omitted
    #[argh(option)]
    seed: Option<u64>,

    /// do not spawn the viewer
    #[argh(switch)]
    no_viewer: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    if args.targets.is_empty() {
        return Err("at least one target model is required".into());
    }

    // fail before any processing if a model is missing
    let mut paths = vec![args.source.clone()];
    paths.extend(args.targets.iter().cloned());
    validate_inputs(&paths)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let config = AlignmentConfig {
        voxel_size: args.voxel_size,
        vertex_count: args.vertex_count,
        icp_threshold: args.icp_threshold,
        ransac: RansacParams {
            random_seed: args.seed,
            ..Default::default()
        },
        ..Default::default()
    };

    let source = load_point_cloud(&args.source, config.vertex_count, &mut rng)?;

    // create a Rerun recording stream
    let rec = if args.no_viewer {
        None
    } else {
        Some(rerun::RecordingStreamBuilder::new("Model Alignment").spawn()?)
    };

    for target_path in args.targets.iter() {
        let target = load_point_cloud(target_path, config.vertex_count, &mut rng)?;

        let alignment = align_pair(&source, &target, &config)?;
        log::info!(
            "{}: coarse fitness {:.4}, fine fitness {:.4}, fine rmse {:.6}",
            target_path.display(),
            alignment.coarse.fitness,
            alignment.fine.fitness,
            alignment.fine.inlier_rmse
        );

        println!("{} result:", args.source.display());
        println!("{}", alignment.decomposed);

        if let Some(rec) = rec.as_ref() {
            let name = entity_name(target_path);
            let aligned = source.transformed(&alignment.fine.transformation);

            log_pointcloud(rec, &format!("{name}/original/source"), &source, "gold")?;
            log_pointcloud(rec, &format!("{name}/original/target"), &target, "marine")?;
            log_pointcloud(rec, &format!("{name}/aligned/source"), &aligned, "gold")?;
            log_pointcloud(rec, &format!("{name}/aligned/target"), &target, "marine")?;
        }
    }

    Ok(())
}

fn entity_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "model".to_string())
}

fn log_pointcloud(
    rec: &rerun::RecordingStream,
    name: &str,
    pointcloud: &PointCloud,
    color: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let points = pointcloud
        .points()
        .iter()
        .map(|p| rerun::Position3D::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect::<Vec<_>>();

    let color = match color {
        "marine" => rerun::Color::from_rgb(90, 145, 199),
        "gold" => rerun::Color::from_rgb(255, 215, 0),
        _ => rerun::Color::from_rgb(255, 255, 255),
    };
    let colors = vec![color; points.len()];

    rec.log(name, &rerun::Points3D::new(points).with_colors(colors))?;

    Ok(())
}
