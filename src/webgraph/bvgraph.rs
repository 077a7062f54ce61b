use std::{fs, sync::Arc};

use log::{debug, info, warn};

use crate::bitstreams::BinaryReader;
use crate::offsets::OffsetIndex;
use crate::properties::Properties;
use crate::webgraph::iter::{ArcIterator, BVGraphNodeIterator};
use crate::{nat2int, GraphError, ImmutableGraph, Result};

/// A compressed, immutable graph in the BVGraph format, fully loaded in memory.
///
/// The bitstream and the offsets are never modified after loading, so a
/// `BVGraph` can be shared between threads: every query works on its own
/// [`BinaryReader`].
#[derive(Clone, Debug)]
pub struct BVGraph {
    props: Properties,
    graph_memory: Arc<[u8]>,
    offsets: OffsetIndex,
}

/// Where the list a node refers to comes from.
pub(crate) enum References<'a> {
    /// The cyclic buffer of the last decoded lists, indexed by node modulo its length.
    Window(&'a [Vec<usize>]),
    /// Random access to the graph; `depth` is the length of the reference chain so far.
    Graph { graph: &'a BVGraph, depth: usize },
}

impl BVGraph {
    /// Loads `<basename>.properties`, `<basename>.graph` and the offsets
    /// (`<basename>.offsets.ef` or `<basename>.offsets`).
    ///
    /// A trailing `.graph` in `basename` is ignored.
    pub fn load(basename: &str) -> Result<Self> {
        let basename = basename.strip_suffix(".graph").unwrap_or(basename);

        let props = Properties::load(basename)?;

        let path = format!("{}.graph", basename);
        let graph_memory = fs::read(&path).map_err(|e| GraphError::from_io(e, &path))?;
        debug!("Read {} bytes from {}", graph_memory.len(), path);

        let offsets = OffsetIndex::load(basename, props.nodes)?;

        let graph = Self::from_parts(props, Arc::from(graph_memory), offsets)?;
        info!(
            "Loaded {} ({} nodes, {} arcs, {} bits)",
            basename,
            graph.num_nodes(),
            graph.num_arcs(),
            graph.offsets.end()
        );

        Ok(graph)
    }

    /// Assembles a graph from its three components, checking that they agree.
    pub fn from_parts(props: Properties, graph_memory: Arc<[u8]>, offsets: OffsetIndex) -> Result<Self> {
        props.check_parameters()?;
        if offsets.num_nodes() != props.nodes {
            return Err(GraphError::format(format!(
                "The offsets describe {} nodes, the header declares {}",
                offsets.num_nodes(),
                props.nodes
            )));
        }

        // Records past the end of a truncated bitstream fail when decoded
        let len_bits = graph_memory.len() as u64 * 8;
        if offsets.end() > len_bits {
            warn!(
                "The offsets end at bit {} but the bitstream has only {} bits",
                offsets.end(),
                len_bits
            );
        }

        Ok(Self { props, graph_memory, offsets })
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.props.nodes
    }

    #[inline]
    pub fn num_arcs(&self) -> usize {
        self.props.arcs
    }

    pub fn properties(&self) -> &Properties {
        &self.props
    }

    pub fn offsets(&self) -> &OffsetIndex {
        &self.offsets
    }

    /// Returns a new cursor at the start of the bitstream.
    pub fn reader(&self) -> BinaryReader {
        BinaryReader::new(self.graph_memory.clone())
    }

    /// Returns the outdegree of `x`, decoding only the first field of its record.
    pub fn outdegree(&self, x: usize) -> Result<usize> {
        let mut reader = self.reader();
        self.seek(x, &mut reader)?;
        read_outdegree(&self.props, x, &mut reader)
    }

    #[inline(always)]
    fn seek(&self, x: usize, reader: &mut BinaryReader) -> Result<()> {
        let offset = self.offsets.offset_of(x)?;
        if offset > reader.len_bits() {
            return Err(GraphError::TruncatedStream {
                position: offset,
                len: reader.len_bits(),
            });
        }
        reader.position(offset)
    }

    /// Returns the successors of `x` in increasing order.
    pub fn successors(&self, x: usize) -> Result<Box<[usize]>> {
        self.successors_with(x, &mut self.reader())
    }

    /// Like [`Self::successors`], using a cursor owned by the caller.
    pub fn successors_with(&self, x: usize, reader: &mut BinaryReader) -> Result<Box<[usize]>> {
        self.successors_at_depth(x, reader, 0).map(Vec::into_boxed_slice)
    }

    fn successors_at_depth(&self, x: usize, reader: &mut BinaryReader, depth: usize) -> Result<Vec<usize>> {
        self.seek(x, reader)?;
        let list = decode_list(&self.props, x, reader, References::Graph { graph: self, depth })?;
        check_record_end(&self.offsets, x, reader.get_position())?;
        Ok(list)
    }

    /// Returns an iterator on the nodes which decodes the records sequentially.
    pub fn iter(&self) -> BVGraphNodeIterator<'_> {
        BVGraphNodeIterator::new(&self.props, self.reader(), Some(&self.offsets))
    }

    /// Returns an iterator on all the arcs, grouped by source in increasing order.
    pub fn arcs(&self) -> ArcIterator<'_> {
        ArcIterator::new(self.iter())
    }
}

impl ImmutableGraph for BVGraph {
    fn num_nodes(&self) -> usize {
        BVGraph::num_nodes(self)
    }

    fn num_arcs(&self) -> usize {
        BVGraph::num_arcs(self)
    }

    fn outdegree(&self, x: usize) -> Result<usize> {
        BVGraph::outdegree(self, x)
    }

    fn successors(&self, x: usize) -> Result<Box<[usize]>> {
        BVGraph::successors(self, x)
    }
}

/// Fails unless the record of `x` ended exactly where the next one starts.
#[inline(always)]
pub(crate) fn check_record_end(offsets: &OffsetIndex, x: usize, position: u64) -> Result<()> {
    let expected = offsets.as_slice()[x + 1];
    if position != expected {
        return Err(GraphError::format(format!(
            "The record of node {} ends at bit {}, the offsets say {}",
            x, position, expected
        )));
    }
    Ok(())
}

#[inline(always)]
fn read_outdegree(props: &Properties, x: usize, decoder: &mut BinaryReader) -> Result<usize> {
    let d = props.outdegree_coding.read_next(decoder, props.zeta_k)?;
    if d > props.nodes as u64 {
        return Err(GraphError::format(format!(
            "Node {} has outdegree {} in a graph with {} nodes",
            x, d, props.nodes
        )));
    }
    Ok(d as usize)
}

/// Checks that `v`, a successor of `x`, is a node of the graph.
#[inline(always)]
fn check_successor(props: &Properties, x: usize, v: i64) -> Result<usize> {
    if v < 0 || v as u64 >= props.nodes as u64 {
        return Err(GraphError::format(format!(
            "Node {} has successor {} outside [0, {})",
            x, v, props.nodes
        )));
    }
    Ok(v as usize)
}

/// Merges two increasing lists.
fn merge(a: &[usize], b: &[usize], out: &mut Vec<usize>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] <= b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
}

/// Decodes the record of node `x` starting at the current position of `decoder`.
///
/// A record is made of the outdegree, then (if the window is not empty) a
/// reference to a previous list with the copy blocks applied to it, then
/// (if intervals are enabled) a list of intervals, then the residuals, that
/// is, the first successor not covered by the previous parts relative to `x`
/// followed by the gaps minus one between consecutive ones.
pub(crate) fn decode_list(
    props: &Properties,
    x: usize,
    decoder: &mut BinaryReader,
    references: References<'_>,
) -> Result<Vec<usize>> {
    let zk = props.zeta_k;
    let degree = read_outdegree(props, x, decoder)?;

    if degree == 0 {
        return Ok(Vec::new());
    }

    let mut reference = 0;
    if props.window_size > 0 {
        reference = props.reference_coding.read_next(decoder, zk)?;
        if reference > props.window_size as u64 || reference > x as u64 {
            return Err(GraphError::format(format!(
                "Node {} refers {} nodes back (window size {})",
                x, reference, props.window_size
            )));
        }
    }
    let reference = reference as usize;

    // Successors copied from the referenced list
    let mut block_list = Vec::new();

    if reference > 0 {
        let cyclic_buffer_size = props.window_size + 1;
        let owned;
        let reference_list: &[usize] = match references {
            References::Window(window) => &window[(x - reference) % cyclic_buffer_size],
            References::Graph { graph, depth } => {
                if depth >= props.max_ref_count.max(1) {
                    return Err(GraphError::format(format!(
                        "Node {} has a reference chain longer than {}",
                        x, props.max_ref_count
                    )));
                }
                owned = graph.successors_at_depth(x - reference, &mut graph.reader(), depth + 1)?;
                &owned
            }
        };

        let block_count = props.block_count_coding.read_next(decoder, zk)?;
        if block_count > reference_list.len() as u64 + 1 {
            return Err(GraphError::format(format!(
                "Node {} has {} copy blocks for a list of {} successors",
                x,
                block_count,
                reference_list.len()
            )));
        }

        block_list.reserve(degree.min(reference_list.len()));
        let mut k = 0; // next index in the referenced list
        for i in 0..block_count as usize {
            let blk = props.block_coding.read_next(decoder, zk)? + (i != 0) as u64;
            let end = k as u64 + blk;
            if end > reference_list.len() as u64 {
                return Err(GraphError::format(format!(
                    "The copy blocks of node {} exceed the {} successors of node {}",
                    x,
                    reference_list.len(),
                    x - reference
                )));
            }
            // Even blocks are copied, odd blocks are skipped
            if i % 2 == 0 {
                block_list.extend_from_slice(&reference_list[k..end as usize]);
            }
            k = end as usize;
        }

        // After an even number of blocks the rest of the list is copied
        if block_count % 2 == 0 {
            block_list.extend_from_slice(&reference_list[k..]);
        }
    }

    let mut extra_count = degree.checked_sub(block_list.len()).ok_or_else(|| {
        GraphError::format(format!(
            "Node {} copies {} successors but has outdegree {}",
            x,
            block_list.len(),
            degree
        ))
    })?;

    // Successors covered by intervals, already expanded
    let mut interval_list = Vec::new();

    if extra_count > 0 && props.min_interval_len != 0 {
        let interval_count = decoder.read_gamma()?;

        let mut prev = 0i64;
        for i in 0..interval_count {
            let left = if i == 0 {
                nat2int(props.interval_coding.read_next(decoder, zk)?).checked_add(x as i64)
            } else {
                (props.interval_coding.read_next(decoder, zk)? as i64).checked_add(prev + 1)
            };
            let len = (props.interval_coding.read_next(decoder, zk)? as usize).saturating_add(props.min_interval_len);

            let left = left.ok_or_else(|| GraphError::format(format!("Interval of node {} overflows", x)))?;
            if len > extra_count {
                return Err(GraphError::format(format!(
                    "The intervals of node {} exceed its outdegree {}",
                    x, degree
                )));
            }
            let first = check_successor(props, x, left)?;
            check_successor(props, x, left + len as i64 - 1)?;

            interval_list.extend(first..first + len);
            prev = left + len as i64;
            extra_count -= len;
        }
    }

    // Every residual takes at least one bit
    if extra_count as u64 > decoder.remaining() {
        return Err(GraphError::TruncatedStream {
            position: decoder.get_position(),
            len: decoder.len_bits(),
        });
    }
    let mut residual_list = Vec::with_capacity(extra_count);
    if extra_count > 0 {
        let first = nat2int(props.residual_coding.read_next(decoder, zk)?)
            .checked_add(x as i64)
            .ok_or_else(|| GraphError::format(format!("First residual of node {} overflows", x)))?;
        let mut prev = check_successor(props, x, first)?;
        residual_list.push(prev);

        for _ in 1..extra_count {
            let gap = props.residual_coding.read_next(decoder, zk)?;
            let next = (prev as u64)
                .checked_add(gap + 1)
                .filter(|&v| v <= i64::MAX as u64)
                .ok_or_else(|| GraphError::format(format!("Residual of node {} overflows", x)))?;
            prev = check_successor(props, x, next as i64)?;
            residual_list.push(prev);
        }
    }

    let mut successors = Vec::with_capacity(block_list.len() + interval_list.len() + residual_list.len());
    if block_list.is_empty() {
        merge(&interval_list, &residual_list, &mut successors);
    } else if interval_list.is_empty() {
        merge(&block_list, &residual_list, &mut successors);
    } else {
        let mut extra_list = Vec::with_capacity(interval_list.len() + residual_list.len());
        merge(&interval_list, &residual_list, &mut extra_list);
        merge(&block_list, &extra_list, &mut successors);
    }

    debug_assert_eq!(successors.len(), degree);

    Ok(successors)
}
