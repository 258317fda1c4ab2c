//! Pick candidate types and deterministic resolution.
//!
//! The pick pass appends candidates through an atomic counter, so their
//! order depends on GPU scheduling. Resolution happens on the CPU with a
//! total order so repeated picks of the same scene return the same vertex.

use glam::{Mat4, Vec3};

/// A candidate from the ray-intersection path (triangle topologies).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub vertex: u32,
    /// Intersection point in world space.
    pub hit: Vec3,
}

/// A candidate from the screen-distance path (points, lines, patches).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenHit {
    pub vertex: u32,
    /// Screen-space distance from the cursor, in pixels.
    pub distance: f32,
    /// NDC depth of the projected vertex.
    pub depth: f32,
}

/// Selects the triangle hit closest to the ray origin. Exact distance ties
/// fall back to the lower vertex id so coincident geometry picks stably.
#[must_use]
pub fn closest_triangle_hit(hits: &[TriangleHit], ray_origin: Vec3) -> Option<u32> {
    hits.iter()
        .min_by(|a, b| {
            let da = a.hit.distance_squared(ray_origin);
            let db = b.hit.distance_squared(ray_origin);
            da.total_cmp(&db).then(a.vertex.cmp(&b.vertex))
        })
        .map(|h| h.vertex)
}

/// Selects the screen hit by ascending (distance, depth, vertex id).
///
/// Distance and depth ties rely on exact float equality and are fragile
/// across devices; the vertex id is the disambiguator of last resort, not a
/// correctness guarantee.
#[must_use]
pub fn closest_screen_hit(hits: &[ScreenHit]) -> Option<u32> {
    hits.iter()
        .min_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.depth.total_cmp(&b.depth))
                .then(a.vertex.cmp(&b.vertex))
        })
        .map(|h| h.vertex)
}

/// View-side inputs for building the pick ray.
#[derive(Debug, Clone, Copy)]
pub struct ViewInfo {
    /// The inspected draw's view (camera) matrix.
    pub view: Mat4,
    /// The original projection is not recoverable; substitute a guess.
    pub unproject: bool,
    /// Vertical field of view for the guessed projection, degrees.
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near_plane: f32,
    /// `f32::INFINITY` selects the reverse-perspective guess.
    pub far_plane: f32,
    /// Guess an orthographic projection instead.
    pub ortho: bool,
}

impl Default for ViewInfo {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            unproject: false,
            fov_y_deg: 45.0,
            aspect: 1.0,
            near_plane: 0.1,
            far_plane: 100_000.0,
            ortho: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_hit_picks_nearest_to_origin() {
        let origin = Vec3::ZERO;
        let hits = [
            TriangleHit {
                vertex: 10,
                hit: Vec3::new(0.0, 0.0, 5.0),
            },
            TriangleHit {
                vertex: 4,
                hit: Vec3::new(0.0, 0.0, 2.0),
            },
            TriangleHit {
                vertex: 8,
                hit: Vec3::new(0.0, 0.0, 9.0),
            },
        ];
        assert_eq!(closest_triangle_hit(&hits, origin), Some(4));
    }

    #[test]
    fn triangle_tie_prefers_lower_vertex() {
        let origin = Vec3::ZERO;
        let p = Vec3::new(1.0, 2.0, 3.0);
        let hits = [
            TriangleHit { vertex: 7, hit: p },
            TriangleHit { vertex: 3, hit: p },
            TriangleHit { vertex: 5, hit: p },
        ];
        assert_eq!(closest_triangle_hit(&hits, origin), Some(3));
    }

    #[test]
    fn screen_hit_orders_by_distance_then_depth_then_id() {
        let hits = [
            ScreenHit {
                vertex: 2,
                distance: 4.0,
                depth: 0.1,
            },
            ScreenHit {
                vertex: 1,
                distance: 3.0,
                depth: 0.9,
            },
        ];
        assert_eq!(closest_screen_hit(&hits), Some(1));

        let tied_distance = [
            ScreenHit {
                vertex: 2,
                distance: 3.0,
                depth: 0.5,
            },
            ScreenHit {
                vertex: 1,
                distance: 3.0,
                depth: 0.2,
            },
        ];
        assert_eq!(closest_screen_hit(&tied_distance), Some(1));
    }

    #[test]
    fn coincident_vertices_resolve_to_lower_id_every_time() {
        // Identical position and depth; only the id may break the tie, and
        // the outcome must not depend on candidate order.
        let a = ScreenHit {
            vertex: 42,
            distance: 1.5,
            depth: 0.25,
        };
        let b = ScreenHit { vertex: 7, ..a };
        assert_eq!(closest_screen_hit(&[a, b]), Some(7));
        assert_eq!(closest_screen_hit(&[b, a]), Some(7));
    }

    #[test]
    fn empty_candidates_yield_none() {
        assert_eq!(closest_screen_hit(&[]), None);
        assert_eq!(closest_triangle_hit(&[], Vec3::ZERO), None);
    }
}
