mod building;
mod printing;
mod ray_kd_tree_intersection;

use std::ops::Range;

use index_vec::IndexVec;

use crate::geometry::{Axis, FloatType, WorldBox};

use super::mesh::TriangleIdx;

pub use building::KdTreeError;
pub use printing::TreeStatistics;
pub use ray_kd_tree_intersection::KdTreeHit;

pub const DEFAULT_DEPTH_MAX: u32 = 10;
pub const DEFAULT_MINIMAL_LEAF_SIZE: usize = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq, bon::Builder)]
pub struct KdTreeSettings {
    /// Nodes at this depth always become leaves
    #[builder(default = DEFAULT_DEPTH_MAX)]
    pub depth_max: u32,

    /// Nodes with this many triangles or less become leaves. Must be at least 2.
    #[builder(default = DEFAULT_MINIMAL_LEAF_SIZE)]
    pub minimal_leaf_size: usize,
}

impl Default for KdTreeSettings {
    fn default() -> Self {
        KdTreeSettings::builder().build()
    }
}

/// Median split k-d tree over triangles of a single mesh.
/// The tree only stores triangle indices, the mesh is passed in for every query.
#[derive(Clone, Debug, PartialEq)]
pub struct KdTree {
    settings: KdTreeSettings,
    bounding_box: WorldBox,
    root: NodeLink,
    triangle_count: usize,

    inner_nodes: IndexVec<InnerNodeIdx, InnerNode>,
    leaves: IndexVec<LeafId, Leaf>,
    leaf_triangles: Vec<TriangleIdx>,
}

impl KdTree {
    pub fn settings(&self) -> &KdTreeSettings {
        &self.settings
    }

    pub fn bounding_box(&self) -> &WorldBox {
        &self.bounding_box
    }

    /// Number of triangles of the mesh the tree was built from
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    fn leaf_triangles(&self, leaf: &Leaf) -> &[TriangleIdx] {
        &self.leaf_triangles[leaf.triangles.clone()]
    }

    fn node_box(&self, link: NodeLink) -> &WorldBox {
        match link {
            NodeLink::Inner(index) => &self.inner_nodes[index].bounding_box,
            NodeLink::Leaf(index) => &self.leaves[index].bounding_box,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NodeLink {
    Inner(InnerNodeIdx),
    Leaf(LeafId),
}

#[derive(Clone, Debug, PartialEq)]
struct InnerNode {
    bounding_box: WorldBox,
    axis: Axis,
    split: FloatType,
    left: NodeLink,
    right: NodeLink,
}

#[derive(Clone, Debug, PartialEq)]
struct Leaf {
    bounding_box: WorldBox,
    depth: u32,
    /// Range in `KdTree::leaf_triangles`
    triangles: Range<usize>,
}

index_vec::define_index_type! {
    struct InnerNodeIdx = u32;
}

index_vec::define_index_type! {
    /// Identifier of a leaf, unique within a tree.
    /// Leaves are numbered in the order they are created (depth first, left child first).
    pub struct LeafId = u32;
    IMPL_RAW_CONVERSIONS = true;
}
