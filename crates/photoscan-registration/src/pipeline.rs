use std::path::Path;

use glam::DMat4;
use rand::Rng;

use photoscan_3d::{
    decompose::{decompose_transform, DecomposedTransform},
    io::read_triangle_mesh,
    pointcloud::PointCloud,
};

use crate::icp::{FineAligner, IcpConvergenceCriteria, DEFAULT_ICP_THRESHOLD};
use crate::ransac::{CoarseAligner, RansacParams, DEFAULT_VOXEL_SIZE};
use crate::{Registration, RegistrationError, RegistrationResult};

/// Default number of points sampled on every model.
pub const DEFAULT_VERTEX_COUNT: usize = 100_000;

/// Settings of the coarse-to-fine alignment of a model pair.
#[derive(Debug, Clone)]
pub struct AlignmentConfig {
    /// Voxel size of the coarse stage.
    pub voxel_size: f64,
    /// Number of points sampled on every model.
    pub vertex_count: usize,
    /// Maximum correspondence distance of the fine stage.
    pub icp_threshold: f64,
    /// Parameters of the coarse stage.
    pub ransac: RansacParams,
    /// Stopping rules of the fine stage.
    pub icp: IcpConvergenceCriteria,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            voxel_size: DEFAULT_VOXEL_SIZE,
            vertex_count: DEFAULT_VERTEX_COUNT,
            icp_threshold: DEFAULT_ICP_THRESHOLD,
            ransac: RansacParams::default(),
            icp: IcpConvergenceCriteria::default(),
        }
    }
}

/// Outcome of the alignment of one model pair.
#[derive(Debug, Clone)]
pub struct PairAlignment {
    /// Result of the coarse stage.
    pub coarse: RegistrationResult,
    /// Result of the fine stage, seeded with the coarse transform.
    pub fine: RegistrationResult,
    /// The fine transform split into rotation, translation and scale.
    pub decomposed: DecomposedTransform,
}

/// Check that every input path exists before any processing starts.
pub fn validate_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<(), RegistrationError> {
    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RegistrationError::FileNotFound(path.to_path_buf()));
        }
    }
    Ok(())
}

/// Read a mesh and sample `vertex_count` points uniformly on its surface.
pub fn load_point_cloud<R: Rng + ?Sized>(
    path: impl AsRef<Path>,
    vertex_count: usize,
    rng: &mut R,
) -> Result<PointCloud, RegistrationError> {
    let path = path.as_ref();
    let mesh = read_triangle_mesh(path)?;
    let point_cloud = mesh.sample_points_uniformly(vertex_count, rng)?;
    log::info!(
        "Sampled {} points from {}",
        point_cloud.len(),
        path.display()
    );
    Ok(point_cloud)
}

/// Run registration stages in order, each one seeded with the transform of the previous one.
pub fn run_stages(
    stages: &[&dyn Registration],
    source: &PointCloud,
    target: &PointCloud,
) -> Result<Vec<RegistrationResult>, RegistrationError> {
    let mut results: Vec<RegistrationResult> = Vec::with_capacity(stages.len());
    for stage in stages {
        let init = results
            .last()
            .map_or(DMat4::IDENTITY, |r| r.transformation);
        results.push(stage.register(source, target, &init)?);
    }
    Ok(results)
}

/// Align a source point cloud onto a target point cloud.
///
/// The coarse stage (RANSAC over FPFH matches on the downsampled clouds) seeds the fine
/// stage (ICP with scaling on the full clouds). The final transform is decomposed into
/// rotation, translation and scale.
///
/// # Errors
///
/// Fails if a stage fails or if the final transform is not a similarity.
pub fn align_pair(
    source: &PointCloud,
    target: &PointCloud,
    config: &AlignmentConfig,
) -> Result<PairAlignment, RegistrationError> {
    let coarse = CoarseAligner {
        voxel_size: config.voxel_size,
        params: config.ransac.clone(),
    };
    let fine = FineAligner {
        max_correspondence_distance: config.icp_threshold,
        with_scaling: true,
        criteria: config.icp.clone(),
    };

    let [coarse, fine] = <[RegistrationResult; 2]>::try_from(run_stages(
        &[&coarse, &fine],
        source,
        target,
    )?)
    .map_err(|results| {
        RegistrationError::InvalidParameter(format!("expected 2 results, got {}", results.len()))
    })?;

    let decomposed = decompose_transform(&fine.transformation)?;

    Ok(PairAlignment {
        coarse,
        fine,
        decomposed,
    })
}
