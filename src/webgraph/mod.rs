//! The BVGraph format: random access, sequential decoding and compression.

pub mod bvgraph;
pub mod compress;
pub mod iter;

pub use bvgraph::BVGraph;
pub use compress::{BVComp, CompressedGraph};
pub use iter::{ArcIterator, BVGraphNodeIterator};

/// Returns all the arcs of `graph` as `(source, target)` pairs, in order.
pub fn enumerate_edges(graph: &BVGraph) -> ArcIterator<'_> {
    graph.arcs()
}

#[cfg(test)]
mod tests;
