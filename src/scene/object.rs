use std::{fmt, sync::Arc};

use crate::geometry::{FloatType, Ray, WorldBox, WorldVector};

use super::{
    kd_tree::{KdTree, KdTreeError, KdTreeSettings, LeafId},
    material::Material,
    mesh::{Mesh, Vertex},
};

/// Translation of an object at a given time, given its base translation.
pub type Animation = dyn Fn(&WorldVector, FloatType) -> WorldVector + Send + Sync;

/// Mesh placed in the scene.
/// The mesh is never modified, moving the object only changes its translation.
#[derive(Clone)]
pub struct Object {
    mesh: Arc<Mesh>,
    material: Material,
    kd_tree: KdTree,

    base_translation: WorldVector,
    translation: WorldVector,
    animation: Option<Arc<Animation>>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ObjectHit {
    /// Distance along the ray
    pub distance: FloatType,
    /// Hit position (in world coordinates) and normal
    pub vertex: Vertex,
    pub leaf_id: LeafId,
}

impl Object {
    #[tracing::instrument(skip_all)]
    pub fn new(
        mesh: Arc<Mesh>,
        material: Material,
        settings: KdTreeSettings,
    ) -> Result<Object, KdTreeError> {
        let kd_tree = KdTree::build(&mesh, settings)?;
        Ok(Object {
            mesh,
            material,
            kd_tree,
            base_translation: WorldVector::zeros(),
            translation: WorldVector::zeros(),
            animation: None,
        })
    }

    pub fn with_translation(mut self, translation: WorldVector) -> Object {
        self.base_translation = translation;
        self.translation = translation;
        self
    }

    /// Sets a function that moves the object over time, see `set_time`.
    pub fn with_animation(
        mut self,
        animation: impl Fn(&WorldVector, FloatType) -> WorldVector + Send + Sync + 'static,
    ) -> Object {
        self.animation = Some(Arc::new(animation));
        self
    }

    /// Moves an animated object to its position at time `t`.
    /// Objects without animation stay where they are.
    pub fn set_time(&mut self, t: FloatType) {
        if let Some(animation) = &self.animation {
            self.translation = animation(&self.base_translation, t);
        }
    }

    /// Replaces the mesh, the k-d tree is built again from scratch with the same settings.
    /// The object is left unchanged on error.
    pub fn set_mesh(&mut self, mesh: Arc<Mesh>) -> Result<(), KdTreeError> {
        self.kd_tree = KdTree::build(&mesh, *self.kd_tree.settings())?;
        self.mesh = mesh;
        Ok(())
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn kd_tree(&self) -> &KdTree {
        &self.kd_tree
    }

    pub fn translation(&self) -> &WorldVector {
        &self.translation
    }

    /// Bounding box in world coordinates
    pub fn bounding_box(&self) -> WorldBox {
        self.kd_tree
            .bounding_box()
            .map(|p| p + self.translation)
    }

    /// Finds the nearest hit closer than `max_distance`.
    /// To find the nearest hit over several objects, pass the distance of the best hit so far.
    pub fn intersects_ray(&self, ray: &Ray, max_distance: FloatType) -> Option<ObjectHit> {
        let local_ray = ray.translated(&-self.translation);
        let hit = self
            .kd_tree
            .intersects_ray(&self.mesh, &local_ray, max_distance)?;

        Some(ObjectHit {
            distance: hit.distance,
            vertex: Vertex::new(hit.vertex.position + self.translation, hit.vertex.normal),
            leaf_id: hit.leaf_id,
        })
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("triangles", &self.mesh.triangles().len())
            .field("material", &self.material)
            .field("translation", &self.translation)
            .field("animated", &self.animation.is_some())
            .finish()
    }
}
