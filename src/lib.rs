pub mod webgraph;
pub mod bitstreams;
pub mod arc_list_graph;
pub mod offsets;
pub mod properties;
pub mod utils;

mod error;

pub use error::{GraphError, Result};
pub use properties::Properties;
pub use utils::{EncodingType, int2nat, nat2int};

/// A directed graph whose nodes are numbered from *0* to *n - 1*.
pub trait ImmutableGraph {
    fn num_nodes(&self) -> usize;
    fn num_arcs(&self) -> usize;
    fn outdegree(&self, x: usize) -> Result<usize>;
    fn successors(&self, x: usize) -> Result<Box<[usize]>>;
}
