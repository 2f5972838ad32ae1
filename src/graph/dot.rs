//! Graphviz rendering of the graph structure.

use petgraph::dot::Dot;

use crate::graph::{EdgeProperty, FrameProperty, Graph};

impl<F: FrameProperty, E: EdgeProperty> Graph<F, E> {
    /// Renders the graph in graphviz dot format, labeling vertices and edges
    /// with their property's string rendering. Both directions of each edge
    /// pair are drawn.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(self.storage()))
    }
}
