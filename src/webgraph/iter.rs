use crate::bitstreams::BinaryReader;
use crate::offsets::OffsetIndex;
use crate::properties::Properties;
use crate::webgraph::bvgraph::{check_record_end, decode_list, References};
use crate::Result;

/// Decodes the records of a graph one after the other, from node 0.
///
/// The last `window_size + 1` lists are kept in a cyclic buffer, so
/// references are resolved without going back in the bitstream. When the
/// offsets are known, every record is checked to end where the next one
/// begins.
///
/// After the first error the iterator is exhausted.
pub struct BVGraphNodeIterator<'a> {
    props: &'a Properties,
    offsets: Option<&'a OffsetIndex>,
    // The input bit stream
    pub ibs: BinaryReader,
    // The size of the cyclic buffer
    cyclic_buffer_size: usize,
    // Lists of the last decoded nodes, indexed by node modulo `cyclic_buffer_size`
    window: Vec<Vec<usize>>,
    // The last node returned
    curr: Option<usize>,
    failed: bool,
}

impl<'a> BVGraphNodeIterator<'a> {
    /// Creates an iterator reading records from the current position of `ibs`.
    ///
    /// Without `offsets` the records cannot be validated against their
    /// boundaries; this is what allows rebuilding the offsets of a graph.
    /// Callers check `props` with [`Properties::check_parameters`] first.
    pub(crate) fn new(props: &'a Properties, ibs: BinaryReader, offsets: Option<&'a OffsetIndex>) -> Self {
        let cyclic_buffer_size = props.window_size + 1;

        Self {
            props,
            offsets,
            ibs,
            cyclic_buffer_size,
            window: vec![Vec::new(); cyclic_buffer_size],
            curr: None,
            failed: false,
        }
    }

    #[inline(always)]
    pub fn has_next(&self) -> bool {
        !self.failed && self.next_node() < self.props.nodes
    }

    #[inline(always)]
    fn next_node(&self) -> usize {
        self.curr.map_or(0, |x| x + 1)
    }

    /// The outdegree of the node last returned by `next`, or zero before the first call.
    #[inline(always)]
    pub fn outdegree(&self) -> usize {
        self.successor_array().len()
    }

    /// The successors of the node last returned by `next`.
    #[inline(always)]
    pub fn successor_array(&self) -> &[usize] {
        match self.curr {
            Some(x) => self.window[x % self.cyclic_buffer_size].as_slice(),
            None => &[],
        }
    }
}

impl<'a> Iterator for BVGraphNodeIterator<'a> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }

        let x = self.next_node();
        let decoded = decode_list(self.props, x, &mut self.ibs, References::Window(&self.window)).and_then(|list| {
            if let Some(offsets) = self.offsets {
                check_record_end(offsets, x, self.ibs.get_position())?;
            }
            Ok(list)
        });

        match decoded {
            Ok(list) => {
                self.window[x % self.cyclic_buffer_size] = list;
                self.curr = Some(x);
                Some(Ok(x))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Enumerates the arcs of a graph as `(source, target)` pairs: sources in
/// increasing order, and for each source its successors in increasing order.
///
/// A decoding error is yielded once, then the iterator is exhausted. The
/// pairs yielded before the error are all valid.
pub struct ArcIterator<'a> {
    nodes: BVGraphNodeIterator<'a>,
    // Source of the pairs being yielded
    node: Option<usize>,
    // Index of the next successor of `node`
    next_succ: usize,
}

impl<'a> ArcIterator<'a> {
    pub fn new(nodes: BVGraphNodeIterator<'a>) -> Self {
        Self { nodes, node: None, next_succ: 0 }
    }
}

impl<'a> Iterator for ArcIterator<'a> {
    type Item = Result<(usize, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(u) = self.node {
                if let Some(&v) = self.nodes.successor_array().get(self.next_succ) {
                    self.next_succ += 1;
                    return Some(Ok((u, v)));
                }
            }

            match self.nodes.next()? {
                Ok(u) => {
                    self.node = Some(u);
                    self.next_succ = 0;
                }
                Err(e) => {
                    self.node = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<'a> std::iter::FusedIterator for ArcIterator<'a> {}
