//! Node id to bit offset translation.
//!
//! On disk the offsets are stored as in WebGraph: `<basename>.offsets` holds
//! *n + 1* γ-coded gaps, the first one being the offset of node 0. An optional
//! `<basename>.offsets.ef` holds the same sequence as an Elias-Fano list
//! serialized with `sucds`.

use std::{fs, path::Path, sync::Arc};

use log::debug;
use sucds::{mii_sequences::{EliasFano, EliasFanoBuilder}, Serializable};

use crate::bitstreams::{BinaryReader, BinaryWriterBuilder};
use crate::properties::Properties;
use crate::utils::encodings::{GammaCode, UniversalCode};
use crate::webgraph::BVGraphNodeIterator;
use crate::{GraphError, Result};

/// The bit offsets of the records of a graph: *n + 1* non-decreasing values,
/// the last one being the number of bits used by all the records.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct OffsetIndex {
    offsets: Box<[u64]>,
}

impl OffsetIndex {
    /// Builds the index from the length in bits of each record, in node order.
    pub fn build(lengths: impl IntoIterator<Item = u64>) -> Self {
        let lengths = lengths.into_iter();
        let mut offsets = Vec::with_capacity(lengths.size_hint().0 + 1);
        let mut curr = 0;
        offsets.push(curr);
        for len in lengths {
            curr += len;
            offsets.push(curr);
        }

        Self { offsets: offsets.into_boxed_slice() }
    }

    /// Wraps an explicit table, checking that it is non-decreasing and non-empty.
    pub fn from_offsets(offsets: Vec<u64>) -> Result<Self> {
        if offsets.is_empty() {
            return Err(GraphError::format("The offsets table must contain at least one entry"));
        }
        if let Some(i) = offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(GraphError::format(format!(
                "Offsets decrease at node {}: {} > {}",
                i + 1,
                offsets[i],
                offsets[i + 1]
            )));
        }

        Ok(Self { offsets: offsets.into_boxed_slice() })
    }

    /// Reads `num_nodes + 1` γ-coded gaps.
    pub fn from_gaps(bytes: Arc<[u8]>, num_nodes: usize) -> Result<Self> {
        // Every gap takes at least one bit
        let mut offsets = Vec::with_capacity(num_nodes.saturating_add(1).min(bytes.len() * 8));
        let mut ibs = BinaryReader::new(bytes);
        let mut curr = 0u64;

        for node in 0..=num_nodes {
            let gap = ibs.read_gamma().map_err(|e| match e {
                GraphError::TruncatedStream { .. } => GraphError::format(format!(
                    "The offsets file ends after {} entries, {} nodes declared",
                    node, num_nodes
                )),
                e => e,
            })?;
            curr = curr
                .checked_add(gap)
                .ok_or_else(|| GraphError::format(format!("Offset of node {} overflows", node)))?;
            offsets.push(curr);
        }

        Ok(Self { offsets: offsets.into_boxed_slice() })
    }

    /// Recomputes the offsets of a graph by decoding all its records in order.
    pub fn scan(graph_memory: Arc<[u8]>, props: &Properties) -> Result<Self> {
        props.check_parameters()?;
        let mut lengths = Vec::with_capacity(props.nodes.min(graph_memory.len() * 8));
        let mut nodes = BVGraphNodeIterator::new(props, BinaryReader::new(graph_memory), None);
        let mut last = 0;

        while let Some(node) = nodes.next() {
            node?;
            let position = nodes.ibs.get_position();
            lengths.push(position - last);
            last = position;
        }

        Ok(Self::build(lengths))
    }

    /// Reads `<basename>.offsets.ef` if it exists, `<basename>.offsets` otherwise.
    pub fn load(basename: &str, num_nodes: usize) -> Result<Self> {
        let ef_path = format!("{}.offsets.ef", basename);
        if Path::new(&ef_path).exists() {
            debug!("Loading Elias-Fano offsets from {}", ef_path);
            let index = Self::load_elias_fano(&ef_path)?;
            if index.num_nodes() != num_nodes {
                return Err(GraphError::format(format!(
                    "{} holds the offsets of {} nodes, expected {}",
                    ef_path,
                    index.num_nodes(),
                    num_nodes
                )));
            }
            return Ok(index);
        }

        let path = format!("{}.offsets", basename);
        debug!("Loading γ-coded offsets from {}", path);
        let bytes = fs::read(&path).map_err(|e| GraphError::from_io(e, &path))?;
        Self::from_gaps(Arc::from(bytes), num_nodes)
    }

    fn load_elias_fano(path: &str) -> Result<Self> {
        let content = fs::read(path).map_err(|e| GraphError::from_io(e, path))?;
        let ef = EliasFano::deserialize_from(content.as_slice())
            .map_err(|e| GraphError::format(format!("Could not read Elias-Fano offsets from {}: {}", path, e)))?;

        Self::from_offsets(ef.iter(0).map(|x| x as u64).collect())
    }

    /// The number of nodes covered by the index.
    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns the bit offset of the record of node `x`.
    #[inline(always)]
    pub fn offset_of(&self, x: usize) -> Result<u64> {
        if x >= self.num_nodes() {
            return Err(GraphError::OutOfRange {
                what: "Node",
                value: x as u64,
                limit: self.num_nodes() as u64,
            });
        }

        Ok(self.offsets[x])
    }

    /// Returns the number of bits of the record of node `x`.
    #[inline(always)]
    pub fn record_len(&self, x: usize) -> Result<u64> {
        let start = self.offset_of(x)?;
        Ok(self.offsets[x + 1] - start)
    }

    /// The offset one past the last record.
    #[inline(always)]
    pub fn end(&self) -> u64 {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.offsets
    }

    /// Encodes the index as γ-coded gaps.
    pub fn to_gaps(&self) -> Box<[u8]> {
        let mut offsets_obs = BinaryWriterBuilder::new();
        let mut last = 0;
        for &offset in self.offsets.iter() {
            GammaCode::write_next(&mut offsets_obs, offset - last, None);
            last = offset;
        }

        offsets_obs.build().os
    }

    /// Writes `<basename>.offsets`.
    pub fn store(&self, basename: &str) -> Result<()> {
        fs::write(format!("{}.offsets", basename), self.to_gaps())?;
        Ok(())
    }

    /// Writes `<basename>.offsets.ef`.
    pub fn store_elias_fano(&self, basename: &str) -> Result<()> {
        let to_format = |e: anyhow::Error| GraphError::format(format!("Elias-Fano encoding failed: {}", e));

        let mut efb = EliasFanoBuilder::new(self.end() as usize + 1, self.offsets.len()).map_err(to_format)?;
        for &offset in self.offsets.iter() {
            efb.push(offset as usize).map_err(to_format)?;
        }
        let ef = efb.build();

        let mut bytes = Vec::new();
        ef.serialize_into(&mut bytes).map_err(to_format)?;
        fs::write(format!("{}.offsets.ef", basename), bytes)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prefix_sums() {
        let index = OffsetIndex::build([5, 0, 12, 1]);

        assert_eq!(index.as_slice(), &[0, 5, 5, 17, 18]);
        assert_eq!(index.num_nodes(), 4);
        assert_eq!(index.offset_of(2).unwrap(), 5);
        assert_eq!(index.record_len(2).unwrap(), 12);
        assert_eq!(index.end(), 18);
    }

    #[test]
    fn test_empty_graph_index() {
        let index = OffsetIndex::build(std::iter::empty());

        assert_eq!(index.num_nodes(), 0);
        assert!(matches!(index.offset_of(0), Err(GraphError::OutOfRange { value: 0, limit: 0, .. })));
    }

    #[test]
    fn test_offset_of_out_of_range() {
        let index = OffsetIndex::build([1, 1, 1]);

        assert!(index.offset_of(2).is_ok());
        assert!(matches!(index.offset_of(3), Err(GraphError::OutOfRange { .. })));
        assert!(matches!(index.offset_of(usize::MAX), Err(GraphError::OutOfRange { .. })));
    }

    #[test]
    fn test_gaps_round_trip() {
        let index = OffsetIndex::build([3, 7, 1, 1, 0, 200]);
        let decoded = OffsetIndex::from_gaps(Arc::from(index.to_gaps()), 6).unwrap();

        assert_eq!(decoded, index);
    }

    #[test]
    fn test_short_gaps_file() {
        let index = OffsetIndex::build([3, 7]);

        assert!(matches!(
            OffsetIndex::from_gaps(Arc::from(index.to_gaps()), 5),
            Err(GraphError::Format(_))
        ));
    }

    #[test]
    fn test_decreasing_offsets_are_rejected() {
        assert!(matches!(OffsetIndex::from_offsets(vec![0, 4, 3]), Err(GraphError::Format(_))));
        assert!(matches!(OffsetIndex::from_offsets(vec![]), Err(GraphError::Format(_))));
        assert!(OffsetIndex::from_offsets(vec![0, 4, 4]).is_ok());
    }

    #[test]
    fn test_elias_fano_file_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let basename = dir.path().join("g");
        let basename = basename.to_str().unwrap();

        let index = OffsetIndex::build([9, 2, 0, 31]);
        index.store_elias_fano(basename).unwrap();

        assert_eq!(OffsetIndex::load(basename, 4).unwrap(), index);
        assert!(matches!(OffsetIndex::load(basename, 3), Err(GraphError::Format(_))));
    }

    #[test]
    fn test_missing_offsets_file() {
        let dir = tempfile::tempdir().unwrap();
        let basename = dir.path().join("g");

        assert!(matches!(
            OffsetIndex::load(basename.to_str().unwrap(), 1),
            Err(GraphError::NotFound { .. })
        ));
    }
}
