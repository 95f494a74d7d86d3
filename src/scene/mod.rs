pub mod kd_tree;
pub mod material;
pub mod mesh;
pub mod object;

use crate::geometry::{FloatType, Ray, WorldBox};

pub use material::Material;
pub use mesh::{Mesh, Vertex};
pub use object::{Object, ObjectHit};

#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub objects: Vec<Object>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SceneHit {
    pub object_index: usize,
    pub hit: ObjectHit,
}

impl Scene {
    pub fn new(objects: Vec<Object>) -> Scene {
        Scene { objects }
    }

    /// Nearest hit over all objects
    pub fn intersect(&self, ray: &Ray) -> Option<SceneHit> {
        let mut best: Option<SceneHit> = None;
        for (object_index, object) in self.objects.iter().enumerate() {
            let max_distance = best.map_or(FloatType::INFINITY, |b| b.hit.distance);
            if let Some(hit) = object.intersects_ray(ray, max_distance) {
                best = Some(SceneHit { object_index, hit });
            }
        }
        best
    }

    /// Box around all objects, None for an empty scene
    pub fn bounding_box(&self) -> Option<WorldBox> {
        self.objects
            .iter()
            .map(Object::bounding_box)
            .reduce(|mut a, b| {
                a.extend_to_box(&b);
                a
            })
    }

    pub fn set_time(&mut self, t: FloatType) {
        for object in &mut self.objects {
            object.set_time(t);
        }
    }
}
