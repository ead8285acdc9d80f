use std::collections::BTreeMap;

use glam::DVec3;

use crate::pointcloud::PointCloud;

/// Accumulated point sum, normal sum and point count of one occupied voxel.
type VoxelData = (DVec3, DVec3, usize);

/// A 3D voxel grid for downsampling point clouds.
///
/// Every occupied cell is replaced by the centroid of the points it contains. The grid is
/// anchored half a voxel below the minimum bound of the input cloud.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    /// The edge length of a cubic voxel.
    voxel_size: f64,
    /// Minimum number of points required per voxel.
    min_points_per_voxel: usize,
}

impl VoxelGrid {
    /// Creates a new `VoxelGrid` with the specified voxel size.
    ///
    /// # Panics
    ///
    /// Panics if `voxel_size` is not strictly positive.
    pub fn new(voxel_size: f64) -> Self {
        assert!(voxel_size > 0.0, "Voxel size must be positive");
        Self {
            voxel_size,
            min_points_per_voxel: 1,
        }
    }

    /// Gets the voxel size.
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Sets the minimum number of points required per voxel.
    pub fn set_min_points_per_voxel(&mut self, min_points: usize) {
        self.min_points_per_voxel = min_points;
    }

    /// Computes the voxel index of a point relative to the grid origin.
    pub fn voxel_index(&self, origin: DVec3, point: &[f64; 3]) -> (i64, i64, i64) {
        let coord = (DVec3::from_array(*point) - origin) / self.voxel_size;
        (
            coord.x.floor() as i64,
            coord.y.floor() as i64,
            coord.z.floor() as i64,
        )
    }

    /// Downsamples the input point cloud by grouping points into voxels and computing centroids.
    ///
    /// Normals, when present, are averaged per voxel and re-normalized. The output order is
    /// deterministic (sorted by voxel index).
    pub fn downsample(&self, point_cloud: &PointCloud) -> PointCloud {
        if point_cloud.is_empty() {
            return PointCloud::default();
        }

        let origin = point_cloud.get_min_bound() - DVec3::splat(self.voxel_size * 0.5);
        let normals = point_cloud.normals().filter(|_| point_cloud.has_normals());

        let mut grid: BTreeMap<(i64, i64, i64), VoxelData> = BTreeMap::new();
        for (i, point) in point_cloud.points().iter().enumerate() {
            let entry = grid
                .entry(self.voxel_index(origin, point))
                .or_insert((DVec3::ZERO, DVec3::ZERO, 0));
            entry.0 += DVec3::from_array(*point);
            if let Some(normals) = normals {
                entry.1 += DVec3::from_array(normals[i]);
            }
            entry.2 += 1;
        }

        let mut points = Vec::with_capacity(grid.len());
        let mut out_normals = normals.map(|_| Vec::with_capacity(grid.len()));

        for (sum, normal_sum, count) in grid.into_values() {
            if count < self.min_points_per_voxel {
                continue;
            }
            points.push((sum / count as f64).to_array());
            if let Some(ref mut out_normals) = out_normals {
                out_normals.push(normal_sum.normalize_or_zero().to_array());
            }
        }

        log::debug!(
            "Voxel downsampling {} -> {} points (voxel size {})",
            point_cloud.len(),
            points.len(),
            self.voxel_size
        );

        PointCloud::new(points, out_normals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_points_only() {
        let point_cloud = PointCloud::new(vec![[1.0, 1.0, 1.0], [1.1, 1.1, 1.1]], None);
        let voxel_grid = VoxelGrid::new(1.0);

        let downsampled = voxel_grid.downsample(&point_cloud);
        assert_eq!(downsampled.len(), 1);
        let centroid = downsampled.points()[0];
        assert!((centroid[0] - 1.05).abs() < 0.01);
        assert!((centroid[1] - 1.05).abs() < 0.01);
        assert!((centroid[2] - 1.05).abs() < 0.01);
        assert!(downsampled.normals().is_none());
    }

    #[test]
    fn test_downsample_with_normals() {
        let point_cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [5.0, 0.0, 0.0]],
            Some(vec![[0.0, 2.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
        );
        let downsampled = VoxelGrid::new(1.0).downsample(&point_cloud);
        assert_eq!(downsampled.len(), 2);

        let normals = downsampled.normals().map(|n| n.to_vec()).unwrap_or_default();
        assert_eq!(normals, vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_min_points_per_voxel() {
        let point_cloud = PointCloud::new(vec![[1.0, 1.0, 1.0]], None);
        let mut voxel_grid = VoxelGrid::new(1.0);
        voxel_grid.set_min_points_per_voxel(2);
        assert_eq!(voxel_grid.downsample(&point_cloud).len(), 0);
    }

    #[test]
    fn test_downsample_is_deterministic() {
        let points = (0..200)
            .map(|i| {
                let t = i as f64 * 0.013;
                [t.sin(), t.cos(), t]
            })
            .collect::<Vec<_>>();
        let point_cloud = PointCloud::new(points, None);
        let voxel_grid = VoxelGrid::new(0.1);
        assert_eq!(
            voxel_grid.downsample(&point_cloud).points(),
            voxel_grid.downsample(&point_cloud).points()
        );
    }

    #[test]
    #[should_panic]
    fn test_invalid_voxel_size() {
        VoxelGrid::new(0.0);
    }
}
