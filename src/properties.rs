use std::{collections::HashMap, fs::File, io::BufReader, str::FromStr};

use log::debug;
use serde::Serialize;

use crate::{EncodingType, GraphError, Result};

/// The header of a BVGraph, stored in `<basename>.properties`.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Properties {
    pub nodes: usize,
    pub arcs: usize,
    pub window_size: usize,
    pub max_ref_count: usize,
    pub min_interval_len: usize,
    pub zeta_k: Option<u64>,
    pub outdegree_coding: EncodingType,
    pub block_coding: EncodingType,
    pub interval_coding: EncodingType,
    pub residual_coding: EncodingType,
    pub reference_coding: EncodingType,
    pub block_count_coding: EncodingType,
    pub offset_coding: EncodingType,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            nodes: 0,
            arcs: 0,
            window_size: 7,
            max_ref_count: 3,
            min_interval_len: 4,
            zeta_k: Some(3),
            outdegree_coding: EncodingType::GAMMA,
            block_coding: EncodingType::GAMMA,
            interval_coding: EncodingType::GAMMA,
            residual_coding: EncodingType::ZETA,
            reference_coding: EncodingType::UNARY,
            block_count_coding: EncodingType::GAMMA,
            offset_coding: EncodingType::GAMMA,
        }
    }
}

/// The largest node count accepted from a header: the N + 1 offsets must fit
/// in a single allocation.
pub const MAX_NODES: u64 = (isize::MAX as u64) / 8 - 1;

/// The largest window accepted, in nodes. Decoders keep `window_size + 1`
/// successor lists alive.
pub const MAX_WINDOW_SIZE: usize = 1 << 16;

/// The longest reference chain accepted. Random access recurses once per link.
pub const MAX_REF_COUNT: usize = 1 << 10;

fn parse_required<T: FromStr>(map: &HashMap<String, String>, key: &'static str, expected: &str) -> Result<T> {
    let value = map
        .get(key)
        .ok_or_else(|| GraphError::format(format!("Missing '{}' property", key)))?;
    parse_value(value, key, expected)
}

fn parse_value<T: FromStr>(value: &str, key: &'static str, expected: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        GraphError::format(format!("Could not parse '{}' property ({:?}) as {}", key, value, expected))
    })
}

impl Properties {
    /// Reads and validates `<basename>.properties`.
    pub fn load(basename: &str) -> Result<Self> {
        let path = format!("{}.properties", basename);
        let file = File::open(&path).map_err(|e| GraphError::from_io(e, &path))?;
        let map = java_properties::read(BufReader::new(file))
            .map_err(|e| GraphError::format(format!("Failed parsing {}: {}", path, e)))?;
        debug!("Read {} properties from {}", map.len(), path);

        Properties::try_from(map)
    }

    fn set_coding(&mut self, flag: &str) -> Result<()> {
        let s: Vec<_> = flag.split('_').map(str::trim).collect();
        let unknown = || GraphError::format(format!("Unknown compression flag {}", flag));

        let (slot, code) = match s.as_slice() {
            ["OUTDEGREES", code] => (&mut self.outdegree_coding, *code),
            ["REFERENCES", code] => (&mut self.reference_coding, *code),
            ["BLOCKS", code] => (&mut self.block_coding, *code),
            ["INTERVALS", code] => (&mut self.interval_coding, *code),
            ["RESIDUALS", code] => (&mut self.residual_coding, *code),
            ["OFFSETS", code] => (&mut self.offset_coding, *code),
            ["BLOCK", "COUNT", code] => (&mut self.block_count_coding, *code),
            _ => return Err(unknown()),
        };
        *slot = code.parse().map_err(|_| unknown())?;

        Ok(())
    }

    /// Checks the compression parameters that size the decoder state.
    pub fn check_parameters(&self) -> Result<()> {
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(GraphError::format(format!(
                "Window size {} exceeds {}",
                self.window_size, MAX_WINDOW_SIZE
            )));
        }
        if self.max_ref_count > MAX_REF_COUNT {
            return Err(GraphError::format(format!(
                "Maximum reference count {} exceeds {}",
                self.max_ref_count, MAX_REF_COUNT
            )));
        }
        Ok(())
    }
}

impl TryFrom<HashMap<String, String>> for Properties {
    type Error = GraphError;

    fn try_from(value: HashMap<String, String>) -> Result<Self> {
        if let Some(class) = value.get("graphclass") {
            if !class.to_lowercase().ends_with("bvgraph") {
                return Err(GraphError::format(format!("Unsupported graph class {}", class)));
            }
        }
        if let Some(endianness) = value.get("endianness") {
            if endianness.trim() != "big" {
                return Err(GraphError::format(format!("Unsupported endianness {}", endianness)));
            }
        }

        let nodes: u64 = parse_required(&value, "nodes", "a non-negative integer")?;
        if nodes > MAX_NODES {
            return Err(GraphError::format(format!("Declared node count {} exceeds {}", nodes, MAX_NODES)));
        }
        let arcs: u64 = parse_required(&value, "arcs", "a non-negative integer")?;

        let mut props = Properties {
            nodes: nodes as usize,
            arcs: usize::try_from(arcs)
                .map_err(|_| GraphError::format(format!("Declared arc count {} does not fit in memory", arcs)))?,
            ..Default::default()
        };

        if let Some(v) = value.get("windowsize") {
            props.window_size = parse_value(v, "windowsize", "a non-negative integer")?;
        }
        if let Some(v) = value.get("maxrefcount") {
            props.max_ref_count = parse_value(v, "maxrefcount", "a non-negative integer")?;
        }
        if let Some(v) = value.get("minintervallength") {
            props.min_interval_len = parse_value(v, "minintervallength", "a non-negative integer")?;
        }
        if let Some(v) = value.get("zetak") {
            let k: u64 = parse_value(v, "zetak", "a positive integer")?;
            if !(1..=7).contains(&k) {
                return Err(GraphError::format(format!("zetak must be between 1 and 7, got {}", k)));
            }
            props.zeta_k = Some(k);
        }

        if let Some(compression_flags) = value.get("compressionflags") {
            for flag in compression_flags.split('|').map(str::trim).filter(|f| !f.is_empty()) {
                props.set_coding(&flag.to_uppercase())?;
            }
        }

        if props.offset_coding != EncodingType::GAMMA {
            return Err(GraphError::format("Only GAMMA is supported for offsets"));
        }
        props.check_parameters()?;

        Ok(props)
    }
}

impl From<&Properties> for String {
    fn from(val: &Properties) -> Self {
        let mut s = String::new();

        s.push_str("#BVGraph properties\n");
        s.push_str("version=0\n");
        s.push_str("graphclass=it.unimi.dsi.webgraph.BVGraph\n");
        s.push_str(&format!("nodes={}\n", val.nodes));
        s.push_str(&format!("arcs={}\n", val.arcs));
        s.push_str(&format!("minintervallength={}\n", val.min_interval_len));
        s.push_str(&format!("maxrefcount={}\n", val.max_ref_count));
        s.push_str(&format!("windowsize={}\n", val.window_size));
        s.push_str(&format!("zetak={}\n", val.zeta_k.unwrap_or(3)));

        let defaults = Properties::default();
        let mut flags = Vec::new();

        if val.outdegree_coding != defaults.outdegree_coding {
            flags.push(format!("OUTDEGREES_{}", val.outdegree_coding));
        }
        if val.reference_coding != defaults.reference_coding {
            flags.push(format!("REFERENCES_{}", val.reference_coding));
        }
        if val.block_coding != defaults.block_coding {
            flags.push(format!("BLOCKS_{}", val.block_coding));
        }
        if val.block_count_coding != defaults.block_count_coding {
            flags.push(format!("BLOCK_COUNT_{}", val.block_count_coding));
        }
        if val.interval_coding != defaults.interval_coding {
            flags.push(format!("INTERVALS_{}", val.interval_coding));
        }
        if val.residual_coding != defaults.residual_coding {
            flags.push(format!("RESIDUALS_{}", val.residual_coding));
        }
        if val.offset_coding != defaults.offset_coding {
            flags.push(format!("OFFSETS_{}", val.offset_coding));
        }

        s.push_str(&format!("compressionflags={}\n", flags.join("|")));

        s
    }
}
