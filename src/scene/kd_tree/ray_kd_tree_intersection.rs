use crate::{
    geometry::{FloatType, Ray, RayIntersectionExt as _, TriangleHit},
    scene::mesh::{Mesh, TriangleIdx, Vertex},
};

use super::{KdTree, LeafId, NodeLink};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KdTreeHit {
    /// Distance along the ray
    pub distance: FloatType,
    /// Hit position and interpolated normal, in the mesh coordinates
    pub vertex: Vertex,
    pub leaf_id: LeafId,
    pub triangle: TriangleIdx,
}

impl KdTree {
    /// Finds the nearest triangle hit closer than `max_distance`.
    /// `mesh` must be the mesh the tree was built from.
    pub fn intersects_ray(
        &self,
        mesh: &Mesh,
        ray: &Ray,
        max_distance: FloatType,
    ) -> Option<KdTreeHit> {
        debug_assert!(mesh.triangles().len() == self.triangle_count);

        let best = self.intersect_node(mesh, self.root, ray, max_distance)?;

        Some(KdTreeHit {
            distance: best.hit.t,
            vertex: mesh.hit_vertex(best.triangle, ray, &best.hit),
            leaf_id: best.leaf_id,
            triangle: best.triangle,
        })
    }

    fn intersect_node(
        &self,
        mesh: &Mesh,
        link: NodeLink,
        ray: &Ray,
        max_t: FloatType,
    ) -> Option<LeafHitRecord> {
        let entry_t = self.node_box(link).intersect_ray(ray)?;
        if entry_t > max_t {
            // Everything in this node is further away than what we already have
            return None;
        }

        match link {
            NodeLink::Leaf(leaf_id) => self.intersect_leaf(mesh, leaf_id, ray, max_t),
            NodeLink::Inner(index) => {
                let node = &self.inner_nodes[index];
                let (near, far) = if ray.origin[node.axis.index()] <= node.split {
                    (node.left, node.right)
                } else {
                    (node.right, node.left)
                };

                let near_hit = self.intersect_node(mesh, near, ray, max_t);
                let far_max_t = near_hit.as_ref().map_or(max_t, |record| record.hit.t);
                // Anything returned from the far child is strictly closer than near_hit
                let far_hit = self.intersect_node(mesh, far, ray, far_max_t);

                far_hit.or(near_hit)
            }
        }
    }

    fn intersect_leaf(
        &self,
        mesh: &Mesh,
        leaf_id: LeafId,
        ray: &Ray,
        max_t: FloatType,
    ) -> Option<LeafHitRecord> {
        let mut best: Option<LeafHitRecord> = None;
        let mut best_t = max_t;

        for &triangle in self.leaf_triangles(&self.leaves[leaf_id]) {
            let Some(hit) = mesh.triangle_positions(triangle).intersect_ray(ray) else {
                continue;
            };
            if hit.t < best_t {
                best_t = hit.t;
                best = Some(LeafHitRecord {
                    hit,
                    triangle,
                    leaf_id,
                });
            }
        }

        best
    }
}

#[derive(Clone, Debug)]
struct LeafHitRecord {
    hit: TriangleHit,
    triangle: TriangleIdx,
    leaf_id: LeafId,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{
            EPSILON, Triangle, WorldPoint, WorldVector,
            test::{NonzeroWorldVectorWrapper, WorldPointWrapper},
        },
        scene::{
            kd_tree::{KdTreeSettings, test::settings_strategy},
            mesh::test::{heightfield, soup, soup_strategy, stacked_triangles},
        },
    };

    use assert2::{assert, let_assert};
    use proptest::prop_assume;
    use test_case::{test_case, test_matrix};
    use test_strategy::proptest;

    fn down() -> WorldVector {
        WorldVector::new(0.0, 0.0, -1.0)
    }

    fn deep_settings() -> KdTreeSettings {
        KdTreeSettings::builder()
            .depth_max(20)
            .minimal_leaf_size(2)
            .build()
    }

    /// A triangle at z = 1 partially covering a larger triangle at z = 0,
    /// plus a row of filler triangles so that the tree has to split.
    fn overlapping_triangles() -> Mesh {
        let mut triangles = vec![
            Triangle::new(
                WorldPoint::new(0.0, 0.0, 1.0),
                WorldPoint::new(1.0, 0.0, 1.0),
                WorldPoint::new(0.0, 1.0, 1.0),
            ),
            Triangle::new(
                WorldPoint::new(0.5, 0.0, 0.0),
                WorldPoint::new(2.5, 0.0, 0.0),
                WorldPoint::new(0.5, 2.0, 0.0),
            ),
        ];
        for i in 0..30 {
            let x = 5.0 + i as FloatType;
            triangles.push(Triangle::new(
                WorldPoint::new(x, 0.0, -3.0),
                WorldPoint::new(x + 0.5, 0.0, -3.0),
                WorldPoint::new(x, 0.5, -2.0),
            ));
        }
        soup(&triangles)
    }

    #[test]
    fn nearer_of_two_stacked_triangles() {
        let mesh = stacked_triangles();
        let_assert!(Ok(tree) = KdTree::build(&mesh, KdTreeSettings::default()));
        let ray = Ray::new(WorldPoint::new(0.5, 0.5, 10.0), down());

        let_assert!(Some(hit) = tree.intersects_ray(&mesh, &ray, FloatType::INFINITY));

        assert!((hit.distance - 9.0).abs() < 1e-5);
        assert!(hit.triangle == TriangleIdx::from_usize(0));
        assert!((hit.vertex.position - WorldPoint::new(0.5, 0.5, 1.0)).norm() < 1e-5);
        assert!(hit.vertex.normal == WorldVector::new(0.0, 0.0, 1.0));
        assert!(hit.leaf_id == LeafId::from_raw(0));
    }

    #[test]
    fn max_distance_limits_hits() {
        let mesh = stacked_triangles();
        let_assert!(Ok(tree) = KdTree::build(&mesh, KdTreeSettings::default()));
        let ray = Ray::new(WorldPoint::new(0.25, 0.25, 10.0), down());

        assert!(tree.intersects_ray(&mesh, &ray, 8.5).is_none());
        let_assert!(Some(hit) = tree.intersects_ray(&mesh, &ray, 9.5));
        assert!(hit.triangle == TriangleIdx::from_usize(0));
    }

    #[test]
    fn miss() {
        let mesh = stacked_triangles();
        let_assert!(Ok(tree) = KdTree::build(&mesh, KdTreeSettings::default()));
        let ray = Ray::new(WorldPoint::new(0.75, 0.75, 10.0), down());

        assert!(tree.intersects_ray(&mesh, &ray, FloatType::INFINITY).is_none());
    }

    /// Rays hitting only the nearer triangle, only the farther one (the nearer one is out of the way),
    /// and both of them, with different tree shapes.
    #[test_matrix(
        [(0.1, 0.1, 9.0, 0), (1.5, 0.2, 10.0, 1), (0.6, 0.1, 9.0, 0)],
        [0, 1, 4, 20]
    )]
    fn matches_brute_force(case: (FloatType, FloatType, FloatType, usize), depth_max: u32) {
        let (x, y, expected_t, expected_triangle) = case;
        let mesh = overlapping_triangles();
        let settings = KdTreeSettings::builder()
            .depth_max(depth_max)
            .minimal_leaf_size(2)
            .build();
        let_assert!(Ok(tree) = KdTree::build(&mesh, settings));
        let ray = Ray::new(WorldPoint::new(x, y, 10.0), down());

        let_assert!(Some(hit) = tree.intersects_ray(&mesh, &ray, FloatType::INFINITY));
        let_assert!(Some((brute_triangle, brute_hit)) =
            mesh.intersect_ray_brute_force(&ray, FloatType::INFINITY));

        assert!(hit.triangle == brute_triangle);
        assert!(hit.distance == brute_hit.t);
        assert!((hit.distance - expected_t).abs() < 1e-5);
        assert!(hit.triangle == TriangleIdx::from_usize(expected_triangle));
    }

    #[test]
    fn deep_tree_has_several_leaves() {
        let mesh = overlapping_triangles();
        let_assert!(Ok(tree) = KdTree::build(&mesh, deep_settings()));
        assert!(tree.leaf_count() > 1);
    }

    /// Rays aimed at half-unit lattice points of a terrain with shared vertices.
    /// Split planes land on centroid coordinates, so many of these rays enter node
    /// boxes exactly through an edge or a corner.
    #[test_case(4, 2)]
    #[test_case(8, 2)]
    #[test_case(10, 4)]
    #[test_case(20, 3)]
    fn lattice_rays_over_heightfield_match_brute_force(depth_max: u32, minimal_leaf_size: usize) {
        let mesh = heightfield(16);
        let settings = KdTreeSettings::builder()
            .depth_max(depth_max)
            .minimal_leaf_size(minimal_leaf_size)
            .build();
        let_assert!(Ok(tree) = KdTree::build(&mesh, settings));

        let origins = [
            WorldPoint::new(-5.0, 8.0, 5.0),
            WorldPoint::new(20.0, -3.0, 2.0),
            WorldPoint::new(8.0, 8.0, 10.0),
            WorldPoint::new(-3.0, -3.0, 1.0),
            WorldPoint::new(19.0, 19.0, 3.0),
        ];
        let targets: Vec<WorldPoint> = itertools::iproduct!(0..=32, 0..=32)
            .map(|(i, j)| WorldPoint::new(i as FloatType * 0.5, j as FloatType * 0.5, 0.2))
            .collect();

        let aimed = itertools::iproduct!(origins, targets.iter())
            .map(|(origin, target)| Ray::new(origin, *target - origin));
        let vertical = targets
            .iter()
            .map(|target| Ray::new(*target + WorldVector::new(0.0, 0.0, 5.0), down()));

        let mut ray_count = 0;
        let mismatches: Vec<_> = aimed
            .chain(vertical)
            .inspect(|_| ray_count += 1)
            .filter_map(|ray| {
                let hit = tree.intersects_ray(&mesh, &ray, FloatType::INFINITY);
                let brute = mesh.intersect_ray_brute_force(&ray, FloatType::INFINITY);
                let matching = match (&hit, &brute) {
                    (None, None) => true,
                    (Some(hit), Some((_, brute_hit))) => (hit.distance - brute_hit.t).abs() < 1e-5,
                    _ => false,
                };
                (!matching).then(|| (ray, hit.map(|h| h.distance), brute.map(|(_, b)| b.t)))
            })
            .collect();

        assert!(ray_count == 6 * 33 * 33);
        assert!(mismatches.is_empty(), "{} mismatches: {:?}", mismatches.len(), mismatches.first());
    }

    #[proptest]
    fn random_rays_match_brute_force(
        #[strategy(soup_strategy(60))] mesh: Mesh,
        #[strategy(settings_strategy())] settings: KdTreeSettings,
        origin: WorldPointWrapper,
        direction: NonzeroWorldVectorWrapper,
    ) {
        let tree = KdTree::build(&mesh, settings).unwrap();
        let ray = Ray::new(*origin, *direction);

        let hit = tree.intersects_ray(&mesh, &ray, FloatType::INFINITY);
        let brute = mesh.intersect_ray_brute_force(&ray, FloatType::INFINITY);

        match (hit, brute) {
            (None, None) => {}
            (Some(hit), Some((_, brute_hit))) => {
                assert!((hit.distance - brute_hit.t).abs() < 1e-5);
                assert!(hit.distance > EPSILON);
                let leaf = &tree.leaves[hit.leaf_id];
                assert!(tree.leaf_triangles(leaf).contains(&hit.triangle));
            }
            (hit, brute) => panic!("k-d tree found {hit:?}, brute force found {brute:?}"),
        }
    }

    /// Ray fired again from a hit point doesn't hit the same triangle
    #[proptest]
    fn no_self_intersection(
        direction: NonzeroWorldVectorWrapper,
        target: NonzeroWorldVectorWrapper,
        outgoing: NonzeroWorldVectorWrapper,
    ) {
        let mesh = Mesh::uv_sphere(2.0, 12, 6);
        let tree = KdTree::build(&mesh, deep_settings()).unwrap();

        let origin = WorldPoint::from(direction.normalize() * 10.0);
        let ray = Ray::new(origin, WorldPoint::from(*target) - origin);
        let_assert!(Some(first) = tree.intersects_ray(&mesh, &ray, FloatType::INFINITY));

        let geometric_normal = mesh.triangle_positions(first.triangle).normal().normalize();
        prop_assume!(outgoing.normalize().dot(&geometric_normal).abs() > 0.1);

        let second_ray = Ray::new(first.vertex.position, *outgoing);
        if let Some(second) = tree.intersects_ray(&mesh, &second_ray, FloatType::INFINITY) {
            assert!(second.triangle != first.triangle);
            assert!(second.distance > EPSILON);
        }
    }
}
