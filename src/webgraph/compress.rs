use std::{cmp::Ordering, fs, sync::Arc};

use log::{debug, info};

use crate::bitstreams::{BinaryWriter, BinaryWriterBuilder};
use crate::offsets::OffsetIndex;
use crate::properties::Properties;
use crate::utils::encodings::{GammaCode, UniversalCode};
use crate::webgraph::BVGraph;
use crate::{int2nat, EncodingType, GraphError, ImmutableGraph, Result};

/// The output of [`BVComp::compress`].
#[derive(Clone, Debug)]
pub struct CompressedGraph {
    pub graph: BinaryWriter,
    pub offsets: OffsetIndex,
    pub properties: Properties,
}

impl CompressedGraph {
    /// Writes `<basename>.graph`, `<basename>.offsets` and `<basename>.properties`.
    pub fn store(&self, basename: &str) -> Result<()> {
        fs::write(format!("{}.graph", basename), &self.graph.os)?;
        self.offsets.store(basename)?;
        fs::write(format!("{}.properties", basename), String::from(&self.properties))?;

        Ok(())
    }

    /// Turns the compressed data into a queryable graph without going through the disk.
    pub fn into_graph(self) -> Result<BVGraph> {
        BVGraph::from_parts(self.properties, Arc::from(self.graph.os), self.offsets)
    }
}

#[derive(Default)]
struct CompressionVectors {
    blocks: Vec<usize>,
    extras: Vec<usize>,
    left: Vec<usize>,
    len: Vec<usize>,
    residuals: Vec<usize>,
}

/// Compresses graphs in the BVGraph format.
///
/// The window size, the maximum reference chain length, the minimum interval
/// length, the shrinking factor and the codes are taken from the
/// [`Properties`] given at construction; node and arc counts are filled in
/// from the compressed graph.
pub struct BVComp {
    props: Properties,
    compression_vectors: CompressionVectors,
}

impl Default for BVComp {
    fn default() -> Self {
        Self::new(Properties::default())
    }
}

impl BVComp {
    pub fn new(props: Properties) -> Self {
        Self {
            props,
            compression_vectors: CompressionVectors::default(),
        }
    }

    /// Compresses `graph` and stores the result under `basename`, returning its header.
    pub fn store<G: ImmutableGraph + ?Sized>(&mut self, graph: &G, basename: &str) -> Result<Properties> {
        let compressed = self.compress(graph)?;
        compressed.store(basename)?;
        info!(
            "Stored {} ({} nodes, {} arcs, {} bits)",
            basename,
            compressed.properties.nodes,
            compressed.properties.arcs,
            compressed.graph.written_bits
        );

        Ok(compressed.properties)
    }

    /// Compresses `graph`, whose successor lists must be strictly increasing.
    pub fn compress<G: ImmutableGraph + ?Sized>(&mut self, graph: &G) -> Result<CompressedGraph> {
        let p = &self.props;
        let codes = [
            p.outdegree_coding,
            p.reference_coding,
            p.block_count_coding,
            p.block_coding,
            p.interval_coding,
            p.residual_coding,
        ];
        if codes.contains(&EncodingType::ZETA) && !matches!(p.zeta_k, Some(1..=7)) {
            return Err(GraphError::format("Zeta codes need a shrinking factor between 1 and 7"));
        }
        p.check_parameters()?;

        let n = graph.num_nodes();
        let mut graph_obs = BinaryWriterBuilder::new();
        let mut lengths = Vec::with_capacity(n);
        let mut arcs = 0;

        let cyclic_buffer_size = self.props.window_size + 1;
        // Cyclic array of previous lists
        let mut list: Vec<Box<[usize]>> = vec![Box::default(); cyclic_buffer_size];
        // The depth of the references of each list
        let mut ref_count = vec![0usize; cyclic_buffer_size];

        for curr_node in 0..n {
            let successors = graph.successors(curr_node)?;
            check_successors(curr_node, &successors, n)?;

            let curr_idx = curr_node % cyclic_buffer_size;
            let outd = successors.len();
            let bit_offset = graph_obs.written_bits;
            arcs += outd;

            self.props
                .outdegree_coding
                .write_next(&mut graph_obs, outd as u64, self.props.zeta_k);

            list[curr_idx] = successors;

            if outd > 0 {
                let mut best_comp = u64::MAX;
                let mut best_cand = curr_idx;
                let mut best_ref = 0;

                // r == 0 always qualifies: it means no reference
                for r in 0..cyclic_buffer_size.min(curr_node + 1) {
                    let cand = (curr_node + cyclic_buffer_size - r) % cyclic_buffer_size;
                    if r > 0 && (ref_count[cand] >= self.props.max_ref_count || list[cand].is_empty()) {
                        continue;
                    }

                    let mut bit_count = BinaryWriterBuilder::new();
                    let diff_comp = self.diff_comp(&mut bit_count, curr_node, r, &list[cand], &list[curr_idx]);
                    if diff_comp < best_comp {
                        best_comp = diff_comp;
                        best_cand = cand;
                        best_ref = r;
                    }
                }

                ref_count[curr_idx] = if best_ref == 0 { 0 } else { ref_count[best_cand] + 1 };
                self.diff_comp(&mut graph_obs, curr_node, best_ref, &list[best_cand], &list[curr_idx]);
            }

            lengths.push((graph_obs.written_bits - bit_offset) as u64);
        }

        let graph_written = graph_obs.build();
        let offsets = OffsetIndex::build(lengths);
        debug!("Compressed {} nodes in {} bits", n, graph_written.written_bits);

        let properties = Properties {
            nodes: n,
            arcs,
            ..self.props.clone()
        };

        Ok(CompressedGraph {
            graph: graph_written,
            offsets,
            properties,
        })
    }

    /// Splits `extras` into intervals of at least `min_interval_len`
    /// consecutive integers and residuals. Returns the number of intervals.
    #[inline(always)]
    fn intervalize(
        min_interval_len: usize,
        extras: &[usize],
        left: &mut Vec<usize>,
        len: &mut Vec<usize>,
        residuals: &mut Vec<usize>,
    ) -> usize {
        let mut n_interval = 0;
        let v_len = extras.len();

        let mut j;

        left.clear();
        len.clear();
        residuals.clear();

        let mut i = 0;

        while i < v_len {
            j = 0;
            if i < v_len - 1 && extras[i] + 1 == extras[i + 1] {
                j += 1;
                while i + j < v_len - 1 && extras[i + j] + 1 == extras[i + j + 1] {
                    j += 1;
                }
                j += 1;

                // Now j is the number of integers in the interval
                if j >= min_interval_len {
                    left.push(extras[i]);
                    len.push(j);
                    n_interval += 1;
                    i += j - 1;
                }
            }

            if j < min_interval_len {
                residuals.push(extras[i]);
            }

            i += 1;
        }

        n_interval
    }

    /// Writes the record of `curr_node` (outdegree excluded) using `ref_list`
    /// as reference, `reference` nodes back. Returns the number of written bits.
    fn diff_comp(
        &mut self,
        graph_obs: &mut BinaryWriterBuilder,
        curr_node: usize,
        reference: usize,
        ref_list: &[usize],
        curr_list: &[usize],
    ) -> u64 {
        let props = &self.props;
        let zk = props.zeta_k;
        let CompressionVectors {
            blocks,
            extras,
            left,
            len,
            residuals,
        } = &mut self.compression_vectors;

        blocks.clear();
        extras.clear();

        let written_data_at_start = graph_obs.written_bits;

        let curr_len = curr_list.len();
        let ref_len = if reference == 0 { 0 } else { ref_list.len() };

        let mut j = 0; // index of the next successor of the current node we must examine
        let mut k = 0; // index of the next successor of the reference node we must examine
        let mut curr_block_len = 0; // entries of the reference list copied or skipped in the current block

        let mut copying = true; // true iff we are producing a copy block

        while j < curr_len && k < ref_len {
            if copying {
                match curr_list[j].cmp(&ref_list[k]) {
                    Ordering::Greater => {
                        // We went past the current element of the reference list: the copy block ends
                        blocks.push(curr_block_len);
                        copying = false;
                        curr_block_len = 0;
                    }
                    Ordering::Less => {
                        extras.push(curr_list[j]);
                        j += 1;
                    }
                    Ordering::Equal => {
                        j += 1;
                        k += 1;
                        curr_block_len += 1;
                    }
                }
            } else if curr_list[j] < ref_list[k] {
                extras.push(curr_list[j]);
                j += 1;
            } else if curr_list[j] > ref_list[k] {
                k += 1;
                curr_block_len += 1;
            } else {
                // A match: the skip block ends and a new copy block starts
                blocks.push(curr_block_len);
                copying = true;
                curr_block_len = 0;
            }
        }

        // The last block is written only if it is a copy block that stops before the end
        if copying && k < ref_len {
            blocks.push(curr_block_len);
        }

        extras.extend_from_slice(&curr_list[j..]);

        if props.window_size > 0 {
            props.reference_coding.write_next(graph_obs, reference as u64, zk);
        }

        if reference != 0 {
            props.block_count_coding.write_next(graph_obs, blocks.len() as u64, zk);

            // All block lengths except the first one are decremented
            for (i, &blk) in blocks.iter().enumerate() {
                let blk = if i == 0 { blk } else { blk - 1 };
                props.block_coding.write_next(graph_obs, blk as u64, zk);
            }
        }

        if !extras.is_empty() {
            let residual: &[usize] = if props.min_interval_len != 0 {
                let interval_count = Self::intervalize(props.min_interval_len, extras, left, len, residuals);
                GammaCode::write_next(graph_obs, interval_count as u64, zk);

                let mut prev = 0;
                for i in 0..interval_count {
                    if i == 0 {
                        let gap = int2nat(left[i] as i64 - curr_node as i64);
                        props.interval_coding.write_next(graph_obs, gap, zk);
                    } else {
                        props.interval_coding.write_next(graph_obs, (left[i] - prev - 1) as u64, zk);
                    }
                    prev = left[i] + len[i];
                    props
                        .interval_coding
                        .write_next(graph_obs, (len[i] - props.min_interval_len) as u64, zk);
                }

                residuals
            } else {
                extras
            };

            if let Some((&first, rest)) = residual.split_first() {
                props
                    .residual_coding
                    .write_next(graph_obs, int2nat(first as i64 - curr_node as i64), zk);
                let mut prev = first;
                for &r in rest {
                    props.residual_coding.write_next(graph_obs, (r - prev - 1) as u64, zk);
                    prev = r;
                }
            }
        }

        (graph_obs.written_bits - written_data_at_start) as u64
    }
}

fn check_successors(x: usize, successors: &[usize], n: usize) -> Result<()> {
    if let Some(w) = successors.windows(2).find(|w| w[0] >= w[1]) {
        return Err(GraphError::format(format!(
            "Successors of node {} are not strictly increasing ({} then {})",
            x, w[0], w[1]
        )));
    }
    if let Some(&last) = successors.last() {
        if last >= n {
            return Err(GraphError::OutOfRange {
                what: "Successor",
                value: last as u64,
                limit: n as u64,
            });
        }
    }

    Ok(())
}
