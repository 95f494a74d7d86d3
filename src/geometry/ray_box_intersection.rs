use crate::geometry::{EPSILON, FloatType, Ray, WorldBox, WorldVector};

pub trait RayIntersectionExt {
    /// Distance along the ray to the point where it enters the box.
    /// Zero if the ray starts inside (or on the surface of) the box, None if it misses.
    /// Rays passing within a rounding error of an edge count as hits.
    fn intersect_ray(&self, ray: &Ray) -> Option<FloatType>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Quadrant {
    Left,
    Middle,
    Right,
}

impl RayIntersectionExt for WorldBox {
    /// Classifies the origin against each slab, then tries the farthest of the
    /// candidate planes the ray has to cross to get in.
    fn intersect_ray(&self, ray: &Ray) -> Option<FloatType> {
        let mut quadrant = [Quadrant::Middle; 3];
        let mut candidate_plane = [0.0; 3];
        for axis in 0..3 {
            if ray.origin[axis] < self.min[axis] {
                quadrant[axis] = Quadrant::Left;
                candidate_plane[axis] = self.min[axis];
            } else if ray.origin[axis] > self.max[axis] {
                quadrant[axis] = Quadrant::Right;
                candidate_plane[axis] = self.max[axis];
            }
        }

        if quadrant.iter().all(|q| *q == Quadrant::Middle) {
            return Some(0.0);
        }

        // Axes where the origin is inside the slab or that the ray runs parallel to
        // get -1, they can never be chosen over a real crossing.
        let plane_distances = WorldVector::from_fn(|axis, _| {
            if quadrant[axis] != Quadrant::Middle && ray.direction[axis] != 0.0 {
                (candidate_plane[axis] - ray.origin[axis]) / ray.direction[axis]
            } else {
                -1.0
            }
        });

        let which_plane = plane_distances.imax();
        let t = plane_distances[which_plane];
        if t < 0.0 {
            return None;
        }

        // Entering through an edge makes two plane distances almost equal, the
        // crossing point can then land a few ulps outside the other slab.
        for axis in (0..3).filter(|axis| *axis != which_plane) {
            let coordinate = ray.origin[axis] + t * ray.direction[axis];
            let tolerance =
                EPSILON * self.min[axis].abs().max(self.max[axis].abs()).max(1.0);
            if coordinate < self.min[axis] - tolerance || coordinate > self.max[axis] + tolerance {
                return None;
            }
        }

        Some(t)
    }
}
