use crate::util::Stats;

use super::{KdTree, NodeLink};

#[derive(Clone, Debug, PartialEq)]
pub struct TreeStatistics {
    pub inner_node_count: usize,
    pub leaf_count: usize,
    pub leaf_depth: Stats,
    pub leaf_size: Stats,
    /// Number of extra triangle references created by splitting straddling triangles
    pub duplicated_triangles: usize,
}

impl KdTree {
    pub fn statistics(&self) -> TreeStatistics {
        TreeStatistics {
            inner_node_count: self.inner_nodes.len(),
            leaf_count: self.leaves.len(),
            leaf_depth: self.leaves.iter().map(|leaf| leaf.depth as usize).collect(),
            leaf_size: self.leaves.iter().map(|leaf| leaf.triangles.len()).collect(),
            duplicated_triangles: self.leaf_triangles.len() - self.triangle_count,
        }
    }

    pub fn print_statistics(&self) {
        let stats = self.statistics();
        println!("Triangles: {}", self.triangle_count);
        println!(
            "Nodes: {} inner, {} leaves",
            stats.inner_node_count, stats.leaf_count
        );
        println!("Leaf depth: {}", stats.leaf_depth);
        println!("Leaf size: {}", stats.leaf_size);
        println!("Duplicated triangles: {}", stats.duplicated_triangles);
    }

    pub fn print_tree(&self) {
        self.print_recursive(0, self.root);
    }

    fn print_recursive(&self, indent: usize, link: NodeLink) {
        let bounding_box = self.node_box(link);
        let indent_str = "  ".repeat(indent);

        match link {
            NodeLink::Inner(index) => {
                let node = &self.inner_nodes[index];
                println!(
                    "{}- I{}: {:?}-{:?}, split {:?} at {}",
                    indent_str,
                    index.index(),
                    bounding_box.min,
                    bounding_box.max,
                    node.axis,
                    node.split,
                );
                self.print_recursive(indent + 1, node.left);
                self.print_recursive(indent + 1, node.right);
            }
            NodeLink::Leaf(index) => {
                let leaf = &self.leaves[index];
                println!(
                    "{}- L{}: {:?}-{:?}",
                    indent_str,
                    index.index(),
                    bounding_box.min,
                    bounding_box.max,
                );
                println!(
                    "{}  [{}]",
                    indent_str,
                    itertools::join(self.leaf_triangles(leaf).iter().map(|i| i.index()), ", ")
                );
            }
        }
    }
}
