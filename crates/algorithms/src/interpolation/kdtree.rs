//! k-d tree over the unit sphere for geographic neighbour search
//!
//! Points are embedded as 3D unit vectors (ECEF on a unit sphere). The
//! straight-line chord between two unit vectors is a monotone function of
//! the great-circle angle, so nearest-by-chord is nearest-by-geodesic and
//! the usual Euclidean k-d tree pruning stays exact. Reported distances
//! are haversine metres.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use geokrige_core::geodesy::{distance_m_to_chord, haversine_m};
use geokrige_core::GeoCoord;

/// A 3D k-d tree for neighbour queries on geographic points.
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    coords: Vec<GeoCoord>,
    /// Unit vectors, same order as `coords`
    points: Vec<[f64; 3]>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split axis: 0 = x, 1 = y, 2 = z
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A neighbour found by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the coordinates the tree was built from
    pub index: usize,
    /// Great-circle distance to the query, metres
    pub distance_m: f64,
}

impl KdTree {
    /// Build a k-d tree from geographic coordinates.
    ///
    /// Construction is O(n log n) using median splitting.
    pub fn build(coords: &[GeoCoord]) -> Self {
        let points: Vec<[f64; 3]> = coords.iter().map(GeoCoord::to_unit_vector).collect();
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_recursive(&points, &mut indices, 0, &mut nodes);
        }
        Self {
            nodes,
            coords: coords.to_vec(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Coordinate of the point at `index`.
    pub fn coord(&self, index: usize) -> GeoCoord {
        self.coords[index]
    }

    /// The single nearest point, or `None` for an empty tree.
    pub fn nearest(&self, query: GeoCoord) -> Option<Neighbor> {
        self.k_nearest(query, 1).into_iter().next()
    }

    /// The k nearest points sorted by ascending distance.
    ///
    /// Returns fewer than k results when the tree holds fewer points.
    pub fn k_nearest(&self, query: GeoCoord, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        let q = query.to_unit_vector();

        // Sorted descending by chord², so heap[0] is the farthest kept
        let mut heap: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, &q, k, &mut heap);
        heap.reverse();

        heap.into_iter()
            .map(|(_, idx)| self.neighbor(query, idx))
            .collect()
    }

    /// All points within `radius_m` metres, sorted by ascending distance.
    pub fn within_radius(&self, query: GeoCoord, radius_m: f64) -> Vec<Neighbor> {
        if self.nodes.is_empty() || !(radius_m > 0.0) {
            return Vec::new();
        }
        let q = query.to_unit_vector();
        let chord = distance_m_to_chord(radius_m);
        let mut found = Vec::new();
        self.radius_recursive(0, &q, chord * chord, &mut found);

        let mut results: Vec<Neighbor> = found
            .into_iter()
            .map(|idx| self.neighbor(query, idx))
            .filter(|n| n.distance_m <= radius_m)
            .collect();
        results.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        results
    }

    fn neighbor(&self, query: GeoCoord, index: usize) -> Neighbor {
        Neighbor {
            index,
            distance_m: haversine_m(query, self.coords[index]),
        }
    }

    fn knn_recursive(&self, node_idx: usize, q: &[f64; 3], k: usize, heap: &mut Vec<(f64, usize)>) {
        let node = &self.nodes[node_idx];
        let dist_sq = chord_sq(q, &self.points[node.point_idx]);

        if heap.len() < k || dist_sq < heap[0].0 {
            if heap.len() >= k {
                heap.remove(0);
            }
            let pos = heap
                .binary_search_by(|entry| entry.0.total_cmp(&dist_sq).reverse())
                .unwrap_or_else(|e| e);
            heap.insert(pos, (dist_sq, node.point_idx));
        }

        let axis = node.split_dim as usize;
        let diff = q[axis] - self.points[node.point_idx][axis];
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, q, k, heap);
        }

        let threshold = if heap.len() >= k { heap[0].0 } else { f64::MAX };
        if diff * diff < threshold {
            if let Some(child) = second {
                self.knn_recursive(child, q, k, heap);
            }
        }
    }

    fn radius_recursive(&self, node_idx: usize, q: &[f64; 3], radius_sq: f64, found: &mut Vec<usize>) {
        let node = &self.nodes[node_idx];
        let p = &self.points[node.point_idx];

        if chord_sq(q, p) <= radius_sq {
            found.push(node.point_idx);
        }

        let axis = node.split_dim as usize;
        let diff = q[axis] - p[axis];

        if let Some(left) = node.left {
            if diff <= 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(left, q, radius_sq, found);
            }
        }
        if let Some(right) = node.right {
            if diff >= 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(right, q, radius_sq, found);
            }
        }
    }
}

fn chord_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

fn build_recursive(points: &[[f64; 3]], indices: &mut [usize], depth: usize, nodes: &mut Vec<KdNode>) -> usize {
    let n = indices.len();
    let split_dim = (depth % 3) as u8;
    let axis = split_dim as usize;

    let median = n / 2;
    indices.select_nth_unstable_by(median, |&a, &b| points[a][axis].total_cmp(&points[b][axis]));
    let point_idx = indices[median];

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx,
        split_dim,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    if !left.is_empty() {
        let left_idx = build_recursive(points, left, depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }
    let right = &mut rest[1..];
    if !right.is_empty() {
        let right_idx = build_recursive(points, right, depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_coords() -> Vec<GeoCoord> {
        vec![
            GeoCoord::new(2.0, 3.0),
            GeoCoord::new(5.0, 4.0),
            GeoCoord::new(9.0, 6.0),
            GeoCoord::new(4.0, 7.0),
            GeoCoord::new(8.0, 1.0),
            GeoCoord::new(7.0, 2.0),
            GeoCoord::new(1.0, 8.0),
            GeoCoord::new(6.0, 5.0),
        ]
    }

    fn brute_force(coords: &[GeoCoord], q: GeoCoord) -> Vec<(f64, usize)> {
        let mut d: Vec<(f64, usize)> = coords
            .iter()
            .enumerate()
            .map(|(i, c)| (haversine_m(q, *c), i))
            .collect();
        d.sort_by(|a, b| a.0.total_cmp(&b.0));
        d
    }

    #[test]
    fn test_build_and_size() {
        let tree = KdTree::build(&sample_coords());
        assert_eq!(tree.len(), 8);
        assert!(!tree.is_empty());
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[]);
        let q = GeoCoord::new(0.0, 0.0);
        assert!(tree.is_empty());
        assert!(tree.nearest(q).is_none());
        assert!(tree.k_nearest(q, 3).is_empty());
        assert!(tree.within_radius(q, 1e6).is_empty());
    }

    #[test]
    fn test_nearest_exact() {
        let tree = KdTree::build(&sample_coords());
        let result = tree.nearest(GeoCoord::new(5.0, 4.0)).unwrap();
        assert_eq!(result.index, 1);
        assert!(result.distance_m < 1e-6);
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let coords = sample_coords();
        let tree = KdTree::build(&coords);
        for qx in 0..10 {
            for qy in 0..10 {
                let q = GeoCoord::new(qx as f64 + 0.5, qy as f64 + 0.5);
                let got = tree.nearest(q).unwrap();
                let bf = brute_force(&coords, q)[0];
                assert!(
                    (got.distance_m - bf.0).abs() < 1e-6,
                    "Mismatch at {:?}: tree={:.3}, bf={:.3}",
                    q,
                    got.distance_m,
                    bf.0
                );
            }
        }
    }

    #[test]
    fn test_k_nearest_sorted_and_exact() {
        let coords = sample_coords();
        let tree = KdTree::build(&coords);
        let q = GeoCoord::new(5.0, 5.0);

        let results = tree.k_nearest(q, 3);
        assert_eq!(results.len(), 3);
        for w in results.windows(2) {
            assert!(w[1].distance_m >= w[0].distance_m);
        }
        let bf = brute_force(&coords, q);
        for (r, (d, _)) in results.iter().zip(&bf) {
            assert!((r.distance_m - d).abs() < 1e-6, "tree={:.3}, bf={:.3}", r.distance_m, d);
        }
    }

    #[test]
    fn test_k_nearest_more_than_points() {
        let coords = sample_coords();
        let tree = KdTree::build(&coords);
        assert_eq!(tree.k_nearest(GeoCoord::new(5.0, 5.0), 100).len(), coords.len());
    }

    #[test]
    fn test_antimeridian_neighbours() {
        // 179.9°E and 179.9°W are ~22 km apart, not 40 000 km
        let coords = vec![GeoCoord::new(179.9, 0.0), GeoCoord::new(0.0, 0.0), GeoCoord::new(-179.9, 0.0)];
        let tree = KdTree::build(&coords);
        let near = tree.k_nearest(GeoCoord::new(-179.95, 0.0), 2);
        let idx: Vec<usize> = near.iter().map(|n| n.index).collect();
        assert!(idx.contains(&0) && idx.contains(&2), "got {:?}", idx);
        assert!(near[1].distance_m < 20_000.0);
    }

    #[test]
    fn test_within_radius() {
        let coords = sample_coords();
        let tree = KdTree::build(&coords);
        let q = GeoCoord::new(5.0, 5.0);
        let radius = 250_000.0;

        let results = tree.within_radius(q, radius);
        assert!(results.iter().all(|r| r.distance_m <= radius));
        let bf_count = brute_force(&coords, q).iter().filter(|(d, _)| *d <= radius).count();
        assert_eq!(results.len(), bf_count);
        assert!(results.len() >= 2);
    }

    #[test]
    fn test_within_radius_zero() {
        let tree = KdTree::build(&sample_coords());
        assert!(tree.within_radius(GeoCoord::new(5.0, 5.0), 0.0).is_empty());
    }

    #[test]
    fn test_large_dataset() {
        let coords: Vec<GeoCoord> = (0..1000)
            .map(|i| {
                let lon = ((i * 7 + 13) % 100) as f64 * 0.1;
                let lat = ((i * 11 + 37) % 100) as f64 * 0.1;
                GeoCoord::new(lon, lat)
            })
            .collect();
        let tree = KdTree::build(&coords);
        assert_eq!(tree.len(), 1000);

        let q = GeoCoord::new(5.05, 5.05);
        let knn = tree.k_nearest(q, 10);
        let bf = brute_force(&coords, q);
        for (r, (d, _)) in knn.iter().zip(&bf) {
            assert!((r.distance_m - d).abs() < 1e-6);
        }
    }
}
