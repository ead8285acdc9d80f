use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

/// Parameters of a hybrid neighbor search: all points within `radius`, capped to the
/// `max_nn` closest ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridSearchParams {
    /// Search radius, in the units of the point cloud.
    pub radius: f64,
    /// Maximum number of neighbors to return.
    pub max_nn: usize,
}

impl HybridSearchParams {
    /// Create new search parameters.
    pub fn new(radius: f64, max_nn: usize) -> Self {
        Self { radius, max_nn }
    }
}

/// A neighbor returned by the search: the point index and its squared distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the point in the indexed slice.
    pub index: usize,
    /// Squared euclidean distance to the query.
    pub distance_sq: f64,
}

/// An immutable KD-tree over a set of 3D points.
pub struct PointIndex {
    // None when built from an empty slice
    tree: Option<ImmutableKdTree<f64, u32, 3, 32>>,
}

impl PointIndex {
    /// Build the index over the given points.
    pub fn new(points: &[[f64; 3]]) -> Self {
        let tree = (!points.is_empty()).then(|| ImmutableKdTree::new_from_slice(points));
        Self { tree }
    }

    /// Find the closest indexed point to the query.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<Neighbor> {
        let tree = self.tree.as_ref()?;
        let nn = tree.nearest_one::<SquaredEuclidean>(query);
        Some(Neighbor {
            index: nn.item as usize,
            distance_sq: nn.distance,
        })
    }

    /// Find the neighbors of the query within the search radius, closest first.
    ///
    /// The query point itself is returned when it belongs to the indexed set.
    pub fn search_hybrid(&self, query: &[f64; 3], params: &HybridSearchParams) -> Vec<Neighbor> {
        let Some(tree) = self.tree.as_ref() else {
            return Vec::new();
        };

        let mut neighbors = tree
            .within::<SquaredEuclidean>(query, params.radius * params.radius)
            .into_iter()
            .map(|nn| Neighbor {
                index: nn.item as usize,
                distance_sq: nn.distance,
            })
            .collect::<Vec<_>>();

        neighbors.sort_by(|a, b| {
            a.distance_sq
                .total_cmp(&b.distance_sq)
                .then(a.index.cmp(&b.index))
        });
        neighbors.truncate(params.max_nn);
        neighbors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_points() -> Vec<[f64; 3]> {
        (0..10).map(|i| [i as f64, 0.0, 0.0]).collect()
    }

    #[test]
    fn test_nearest() {
        let index = PointIndex::new(&line_points());
        let nn = index.nearest(&[3.2, 0.0, 0.0]);
        assert_eq!(nn.map(|n| n.index), Some(3));

        let empty = PointIndex::new(&[]);
        assert!(empty.nearest(&[0.0; 3]).is_none());
    }

    #[test]
    fn test_search_hybrid_radius() {
        let index = PointIndex::new(&line_points());
        let neighbors = index.search_hybrid(&[5.0, 0.0, 0.0], &HybridSearchParams::new(1.5, 30));
        let indices = neighbors.iter().map(|n| n.index).collect::<Vec<_>>();
        assert_eq!(indices[0], 5);
        assert_eq!(indices.len(), 3);
        assert!(indices.contains(&4) && indices.contains(&6));
    }

    #[test]
    fn test_search_hybrid_max_nn() {
        let index = PointIndex::new(&line_points());
        let neighbors = index.search_hybrid(&[0.0, 0.0, 0.0], &HybridSearchParams::new(100.0, 4));
        let indices = neighbors.iter().map(|n| n.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
