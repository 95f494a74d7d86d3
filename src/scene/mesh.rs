use std::{f32::consts::PI, fs, path::Path};

use index_vec::{IndexSlice, IndexVec};
use indexmap::IndexMap;
use thiserror::Error;

use crate::geometry::{
    FloatType, Ray, Triangle, TriangleHit, WorldBox, WorldPoint, WorldVector,
};

index_vec::define_index_type! {
    pub struct TriangleIdx = u32;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: WorldPoint,
    /// Shading normal, zero if the vertex has none
    pub normal: WorldVector,
}

impl Vertex {
    pub fn new(position: WorldPoint, normal: WorldVector) -> Vertex {
        Vertex { position, normal }
    }
}

/// Indexed triangle mesh.
/// Every index is checked on construction, the mesh is never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    triangles: IndexVec<TriangleIdx, Triangle<usize>>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, triangles: Vec<Triangle<usize>>) -> Result<Mesh, MeshError> {
        for (triangle_index, triangle) in triangles.iter().enumerate() {
            if let Some(vertex) = triangle.iter().find(|i| **i >= vertices.len()) {
                return Err(MeshError::VertexIndexOutOfRange {
                    triangle: triangle_index,
                    vertex: *vertex,
                    vertex_count: vertices.len(),
                });
            }
        }

        Ok(Mesh {
            vertices,
            triangles: IndexVec::from_vec(triangles),
        })
    }

    pub fn with_obj(p: impl AsRef<Path>) -> Result<Mesh, MeshError> {
        let content = fs::read_to_string(p)?;
        let parsed = wavefront_obj::obj::parse(content)?;

        let (vertices, triangles) = load_obj(parsed);
        tracing::debug!(
            vertices = vertices.len(),
            triangles = triangles.len(),
            "Loaded mesh"
        );

        Self::new(vertices, triangles)
    }

    /// Sphere around the origin, poles on the Z axis.
    /// Panics if there are less than 3 segments or 2 rings.
    pub fn uv_sphere(radius: FloatType, segments: usize, rings: usize) -> Mesh {
        assert!(segments >= 3);
        assert!(rings >= 2);

        let pole = |z: FloatType| {
            let normal = WorldVector::new(0.0, 0.0, z);
            Vertex::new((normal * radius).into(), normal)
        };

        let mut vertices = vec![pole(1.0)];
        for ring in 1..rings {
            let theta = PI * (ring as FloatType) / (rings as FloatType);
            for segment in 0..segments {
                let phi = 2.0 * PI * (segment as FloatType) / (segments as FloatType);
                let normal = WorldVector::new(
                    theta.sin() * phi.cos(),
                    theta.sin() * phi.sin(),
                    theta.cos(),
                );
                vertices.push(Vertex::new((normal * radius).into(), normal));
            }
        }
        vertices.push(pole(-1.0));

        let ring_vertex = |ring: usize, segment: usize| 1 + (ring - 1) * segments + segment % segments;
        let bottom = vertices.len() - 1;

        let mut triangles = Vec::with_capacity(2 * segments * (rings - 1));
        for segment in 0..segments {
            triangles.push(Triangle::new(
                0,
                ring_vertex(1, segment),
                ring_vertex(1, segment + 1),
            ));
        }
        for ring in 1..(rings - 1) {
            for segment in 0..segments {
                let a = ring_vertex(ring, segment);
                let b = ring_vertex(ring + 1, segment);
                let c = ring_vertex(ring + 1, segment + 1);
                let d = ring_vertex(ring, segment + 1);
                triangles.push(Triangle::new(a, b, c));
                triangles.push(Triangle::new(a, c, d));
            }
        }
        for segment in 0..segments {
            triangles.push(Triangle::new(
                ring_vertex(rings - 1, segment),
                bottom,
                ring_vertex(rings - 1, segment + 1),
            ));
        }

        Mesh {
            vertices,
            triangles: IndexVec::from_vec(triangles),
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &IndexSlice<TriangleIdx, [Triangle<usize>]> {
        &self.triangles
    }

    pub fn triangle_positions(&self, index: TriangleIdx) -> Triangle<WorldPoint> {
        self.triangles[index].map(|i| self.vertices[*i].position)
    }

    pub fn triangle_normals(&self, index: TriangleIdx) -> Triangle<WorldVector> {
        self.triangles[index].map(|i| self.vertices[*i].normal)
    }

    /// Box around all vertices that are used by some triangle, None for a mesh without triangles.
    pub fn bounding_box(&self) -> Option<WorldBox> {
        WorldBox::from_points(
            self.triangles
                .iter()
                .flat_map(|t| t.iter())
                .map(|i| &self.vertices[*i].position),
        )
    }

    /// Surface point of a triangle hit.
    /// The normal is interpolated from the vertex normals, the geometric normal is used
    /// if that comes out as zero.
    pub fn hit_vertex(&self, index: TriangleIdx, ray: &Ray, hit: &TriangleHit) -> Vertex {
        let interpolated = hit.uv.interpolate_triangle(&self.triangle_normals(index));
        let normal = interpolated
            .try_normalize(0.0)
            .or_else(|| self.triangle_positions(index).normal().try_normalize(0.0))
            .unwrap_or_else(WorldVector::zeros);

        Vertex::new(ray.point_at(hit.t), normal)
    }

    /// Tests every triangle, returns the nearest hit closer than `max_distance`.
    pub fn intersect_ray_brute_force(
        &self,
        ray: &Ray,
        max_distance: FloatType,
    ) -> Option<(TriangleIdx, TriangleHit)> {
        self.triangles
            .indices()
            .filter_map(|index| {
                self.triangle_positions(index)
                    .intersect_ray(ray)
                    .map(|hit| (index, hit))
            })
            .filter(|(_, hit)| hit.t < max_distance)
            .min_by(|(_, a), (_, b)| a.t.total_cmp(&b.t))
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),

    #[error("Triangle {triangle} uses vertex {vertex}, but there are only {vertex_count} vertices")]
    VertexIndexOutOfRange {
        triangle: usize,
        vertex: usize,
        vertex_count: usize,
    },
}

/// Flattens all objects of the file into a single vertex and triangle list.
/// Vertices are deduplicated on their position and normal indices, vertices without a normal
/// get an average of the adjacent face normals.
fn load_obj(obj: wavefront_obj::obj::ObjSet) -> (Vec<Vertex>, Vec<Triangle<usize>>) {
    let mut triangles = Vec::new();
    let mut vertices = IndexMap::new();
    let mut skipped_primitives = 0usize;

    for (object_index, o) in obj.objects.into_iter().enumerate() {
        for geometry in o.geometry {
            for shape in geometry.shapes {
                let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                    skipped_primitives += 1;
                    continue;
                };

                let mut handle_vertex = |vtindex: wavefront_obj::obj::VTNIndex| {
                    let key = (object_index, vtindex.0, vtindex.2);
                    let entry = vertices.entry(key);
                    let index = entry.index();
                    entry.or_insert_with(|| {
                        let vertex = &o.vertices[vtindex.0];
                        let normal = vtindex.2.map(|i| &o.normals[i]);
                        Vertex {
                            position: WorldPoint::new(
                                vertex.x as FloatType,
                                vertex.y as FloatType,
                                vertex.z as FloatType,
                            ),
                            normal: normal.map_or_else(WorldVector::zeros, |v| {
                                WorldVector::new(
                                    v.x as FloatType,
                                    v.y as FloatType,
                                    v.z as FloatType,
                                )
                                .try_normalize(0.0)
                                .unwrap_or_else(WorldVector::zeros)
                            }),
                        }
                    });
                    index
                };

                let a = handle_vertex(a);
                let b = handle_vertex(b);
                let c = handle_vertex(c);

                triangles.push(Triangle::new(a, b, c));
            }
        }
    }

    if skipped_primitives > 0 {
        tracing::warn!(count = skipped_primitives, "Skipped non-triangle primitives");
    }

    let mut vertices: Vec<Vertex> = vertices.into_values().collect();
    fill_missing_normals(&mut vertices, &triangles);

    (vertices, triangles)
}

/// Vertices with zero normal get a sum of the adjacent face normals, weighted by face area.
fn fill_missing_normals(vertices: &mut [Vertex], triangles: &[Triangle<usize>]) {
    let missing: Vec<bool> = vertices
        .iter()
        .map(|v| v.normal == WorldVector::zeros())
        .collect();
    if !missing.iter().any(|m| *m) {
        return;
    }

    let mut accumulated = vec![WorldVector::zeros(); vertices.len()];
    for triangle in triangles {
        let face_normal = triangle.map(|i| vertices[*i].position).normal();
        for i in triangle.iter().filter(|i| missing[**i]) {
            accumulated[*i] += face_normal;
        }
    }

    for ((vertex, normal), _) in vertices
        .iter_mut()
        .zip(accumulated)
        .zip(missing)
        .filter(|(_, missing)| *missing)
    {
        vertex.normal = normal.try_normalize(0.0).unwrap_or_else(WorldVector::zeros);
    }
}
