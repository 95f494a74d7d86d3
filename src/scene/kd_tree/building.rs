use std::time::Instant;

use index_vec::IndexVec;
use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::{
    geometry::{Axis, FloatType, WorldBox},
    scene::mesh::{Mesh, TriangleIdx},
};

use super::{InnerNode, KdTree, KdTreeSettings, Leaf, LeafId, NodeLink};

impl KdTree {
    #[tracing::instrument(skip_all, fields(triangles = mesh.triangles().len()))]
    pub fn build(mesh: &Mesh, settings: KdTreeSettings) -> Result<KdTree, KdTreeError> {
        if settings.minimal_leaf_size < 2 {
            return Err(KdTreeError::MinimalLeafSizeTooSmall(
                settings.minimal_leaf_size,
            ));
        }
        let bounding_box = mesh.bounding_box().ok_or(KdTreeError::EmptyMesh)?;

        let start = Instant::now();

        let mut tree = KdTree {
            settings,
            bounding_box: bounding_box.clone(),
            // Replaced once the whole tree is built
            root: NodeLink::Leaf(LeafId::from_raw(0)),
            triangle_count: mesh.triangles().len(),

            inner_nodes: IndexVec::new(),
            leaves: IndexVec::new(),
            leaf_triangles: Vec::new(),
        };

        let triangles = mesh.triangles().indices().collect();
        tree.root = tree.build_node(mesh, bounding_box, triangles, 0);

        tracing::debug!(
            inner_nodes = tree.inner_nodes.len(),
            leaves = tree.leaves.len(),
            leaf_triangles = tree.leaf_triangles.len(),
            elapsed = ?start.elapsed(),
            "Built k-d tree"
        );

        Ok(tree)
    }

    fn build_node(
        &mut self,
        mesh: &Mesh,
        bounding_box: WorldBox,
        triangles: Vec<TriangleIdx>,
        depth: u32,
    ) -> NodeLink {
        if depth >= self.settings.depth_max || triangles.len() <= self.settings.minimal_leaf_size {
            return self.build_leaf(bounding_box, &triangles, depth);
        }

        let axis = bounding_box.widest_axis();
        // Barycenters of straddling triangles may lie outside of this node,
        // the split must not.
        let split = median_barycenter(mesh, &triangles, axis)
            .clamp(bounding_box.min[axis.index()], bounding_box.max[axis.index()]);

        let (left_box, right_box) = bounding_box.split(axis.index(), split);
        let (left_triangles, right_triangles) = split_triangles(mesh, &triangles, axis, split);
        drop(triangles);

        let left = self.build_node(mesh, left_box, left_triangles, depth + 1);
        let right = self.build_node(mesh, right_box, right_triangles, depth + 1);

        NodeLink::Inner(self.inner_nodes.push(InnerNode {
            bounding_box,
            axis,
            split,
            left,
            right,
        }))
    }

    fn build_leaf(&mut self, bounding_box: WorldBox, triangles: &[TriangleIdx], depth: u32) -> NodeLink {
        let first = self.leaf_triangles.len();
        self.leaf_triangles.extend_from_slice(triangles);

        NodeLink::Leaf(self.leaves.push(Leaf {
            bounding_box,
            depth,
            triangles: first..self.leaf_triangles.len(),
        }))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KdTreeError {
    #[error("Mesh has no triangles")]
    EmptyMesh,

    #[error("Minimal leaf size must be at least 2, got {0}")]
    MinimalLeafSizeTooSmall(usize),
}

/// Lower median of triangle barycenters along the axis.
/// Selection works on the values only, so the result doesn't depend on the order of `triangles`.
fn median_barycenter(mesh: &Mesh, triangles: &[TriangleIdx], axis: Axis) -> FloatType {
    debug_assert!(!triangles.is_empty());

    let mut barycenters: Vec<OrderedFloat<FloatType>> = triangles
        .iter()
        .map(|index| OrderedFloat(mesh.triangle_positions(*index).centroid()[axis.index()]))
        .collect();
    let median_index = (barycenters.len() - 1) / 2;
    let (_, median, _) = barycenters.select_nth_unstable(median_index);

    median.0
}

/// Sorts triangles to the sides of the splitting plane.
/// Vertices on the plane count as left, a triangle with vertices on both sides goes to both.
fn split_triangles(
    mesh: &Mesh,
    triangles: &[TriangleIdx],
    axis: Axis,
    split: FloatType,
) -> (Vec<TriangleIdx>, Vec<TriangleIdx>) {
    let mut left = Vec::new();
    let mut right = Vec::new();

    for &index in triangles {
        let mut on_left = false;
        let mut on_right = false;
        for position in mesh.triangle_positions(index).iter() {
            if position[axis.index()] <= split {
                on_left = true;
            } else {
                on_right = true;
            }
            if on_left && on_right {
                break;
            }
        }

        if on_left {
            left.push(index);
        }
        if on_right {
            right.push(index);
        }
    }

    (left, right)
}
