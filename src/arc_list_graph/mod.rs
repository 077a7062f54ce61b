//! Uncompressed graphs read from text arc lists.

use std::{
    fs::File,
    io::{BufRead, BufReader},
};

use log::debug;

use crate::properties::MAX_NODES;
use crate::{GraphError, ImmutableGraph, Result};

/// A graph held as plain successor lists, built from a list of arcs.
///
/// Successors are sorted and deduplicated, so the graph can be fed to
/// [`crate::webgraph::BVComp`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ArcListGraph {
    n: usize,
    m: usize,
    // Successors of all nodes, one list after the other
    graph_memory: Vec<usize>,
    // Node x has successors graph_memory[offsets[x]..offsets[x + 1]]
    offsets: Vec<usize>,
}

impl ImmutableGraph for ArcListGraph {
    #[inline(always)]
    fn num_nodes(&self) -> usize {
        self.n
    }

    #[inline(always)]
    fn num_arcs(&self) -> usize {
        self.m
    }

    fn outdegree(&self, x: usize) -> Result<usize> {
        Ok(self.successor_slice(x)?.len())
    }

    fn successors(&self, x: usize) -> Result<Box<[usize]>> {
        Ok(self.successor_slice(x)?.into())
    }
}

impl ArcListGraph {
    /// Returns the successors of `x` without copying them.
    pub fn successor_slice(&self, x: usize) -> Result<&[usize]> {
        if x >= self.n {
            return Err(GraphError::OutOfRange {
                what: "Node",
                value: x as u64,
                limit: self.n as u64,
            });
        }

        Ok(&self.graph_memory[self.offsets[x]..self.offsets[x + 1]])
    }

    /// Iterates on all the arcs in lexicographic order.
    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n).flat_map(move |x| {
            self.graph_memory[self.offsets[x]..self.offsets[x + 1]]
                .iter()
                .map(move |&y| (x, y))
        })
    }
}

#[derive(Default)]
pub struct ArcListGraphBuilder {
    num_nodes: Option<usize>,
    arcs: Vec<(usize, usize)>,
}

impl ArcListGraphBuilder {
    pub fn new() -> ArcListGraphBuilder {
        Self::default()
    }

    /// Fixes the number of nodes. Without it, the graph has as many nodes as
    /// needed to contain the largest node id mentioned in an arc.
    pub fn set_num_nodes(mut self, num_nodes: usize) -> Self {
        self.num_nodes = Some(num_nodes);
        self
    }

    pub fn add_arcs(mut self, arcs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        self.arcs.extend(arcs);
        self
    }

    /// Loads a text file where each line contains a source and a target
    /// separated by whitespace.
    ///
    /// Blank lines and lines starting with `#` or `%` are ignored, as are
    /// fields after the second one.
    pub fn load_arcs(self, path: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| GraphError::from_io(e, path))?;
        let builder = self.read_arcs(BufReader::new(file))?;
        debug!("Read {} arcs from {}", builder.arcs.len(), path);

        Ok(builder)
    }

    /// Like [`Self::load_arcs`], from any buffered reader.
    pub fn read_arcs(mut self, reader: impl BufRead) -> Result<Self> {
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let mut next_node = || -> Result<usize> {
                let field = fields
                    .next()
                    .ok_or_else(|| GraphError::format(format!("Line {}: expected two node ids", i + 1)))?;
                field
                    .parse()
                    .map_err(|_| GraphError::format(format!("Line {}: invalid node id {:?}", i + 1, field)))
            };

            let source = next_node()?;
            let target = next_node()?;
            self.arcs.push((source, target));
        }

        Ok(self)
    }

    /// Sorts and deduplicates the arcs and builds the graph.
    pub fn build(mut self) -> Result<ArcListGraph> {
        self.arcs.sort_unstable();
        self.arcs.dedup();

        let needed = self.arcs.iter().map(|&(x, y)| x.max(y).saturating_add(1)).max().unwrap_or(0);
        let limit = self.num_nodes.map_or(MAX_NODES, |n| n as u64);
        if needed as u64 > limit {
            return Err(GraphError::OutOfRange {
                what: "Node",
                value: needed as u64 - 1,
                limit,
            });
        }
        let n = self.num_nodes.unwrap_or(needed);
        if n as u64 > MAX_NODES {
            return Err(GraphError::format(format!("{} nodes exceed the limit of {}", n, MAX_NODES)));
        }

        let mut offsets = Vec::with_capacity(n + 1);
        let mut graph_memory = Vec::with_capacity(self.arcs.len());
        let mut arcs = self.arcs.iter().peekable();

        for x in 0..n {
            offsets.push(graph_memory.len());
            while let Some(&(_, y)) = arcs.next_if(|&&(source, _)| source == x) {
                graph_memory.push(y);
            }
        }
        offsets.push(graph_memory.len());

        Ok(ArcListGraph {
            n,
            m: graph_memory.len(),
            graph_memory,
            offsets,
        })
    }
}
