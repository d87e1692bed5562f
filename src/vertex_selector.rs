//! Uniform discrete selection of one light vertex from across the whole
//! cache (spec.md §4.6, §4.7 `SelectBidirPath`).

use crate::float::Float;
use crate::path_cache::PathCache;
use crate::sampling::Rng;

/// A selected cache vertex and the probability density with which it was
/// drawn (spec.md §4.7: "the effective selection density per sample is
/// `(1/CacheSize) * NumConnections * NumLightPaths`").
#[derive(Clone, Copy, Debug)]
pub struct SelectedVertex {
    pub path: usize,
    pub index: u32,
    /// `1 / CacheSize`; zero if the cache is empty.
    pub select_prob: Float,
}

/// Picks one vertex uniformly across every populated slot in the cache.
/// Returns `None` when the cache holds no vertices at all (spec.md §7
/// "Empty vertex cache on connection attempt").
pub fn select_vertex(cache: &PathCache, rng: &mut Rng) -> Option<SelectedVertex> {
    let total = cache.total_vertex_count();
    if total == 0 {
        return None;
    }
    let global_index = rng.next_int(0, total);
    let (path, index) = cache.locate(global_index);
    Some(SelectedVertex { path, index, select_prob: 1.0 / total as Float })
}

/// `(1/CacheSize) * NumConnections * NumLightPaths`, exactly zero when the
/// cache is empty (spec.md §4.8 "bidir-select-density").
pub fn bidir_select_density(cache: &PathCache, num_connections: u32, num_light_paths: u32) -> Float {
    let total = cache.total_vertex_count();
    if total == 0 {
        0.0
    } else {
        (num_connections as Float * num_light_paths as Float) / total as Float
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::SurfacePoint;
    use crate::path_cache::PathVertex;
    use cgmath::{Point2, Point3, Vector3};

    fn point() -> SurfacePoint {
        SurfacePoint {
            p: Point3::new(0.0, 0.0, 0.0),
            ng: Vector3::new(0.0, 0.0, 1.0),
            ns: Vector3::new(0.0, 0.0, 1.0),
            uv: Point2::new(0.0, 0.0),
            primitive_id: 0,
            t_hit: 1.0,
            error_bound: 1e-4,
        }
    }

    #[test]
    fn empty_cache_selects_nothing() {
        let cache = PathCache::new(4, 3);
        let mut rng = Rng::new(1, 0, 0);
        assert!(select_vertex(&cache, &mut rng).is_none());
        assert_eq!(bidir_select_density(&cache, 4, 16), 0.0);
    }

    #[test]
    fn selection_always_lands_on_a_populated_slot() {
        let mut cache = PathCache::new(2, 3);
        cache.push(
            0,
            PathVertex {
                point: point(),
                material: 0,
                depth: 1,
                pdf_from_ancestor: 1.0,
                pdf_to_ancestor: 0.0,
                throughput: Color::white(),
                ancestor: 0,
                next_event_pdf_ancestor: None,
            },
        );
        let mut rng = Rng::new(2, 1, 0);
        for _ in 0..16 {
            let sel = select_vertex(&cache, &mut rng).unwrap();
            assert_eq!(sel.path, 0);
            assert_eq!(sel.index, 0);
            assert_eq!(sel.select_prob, 1.0);
        }
    }
}
