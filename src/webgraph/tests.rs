use std::{fs, sync::Arc, thread};

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::*;
use crate::arc_list_graph::{ArcListGraph, ArcListGraphBuilder};
use crate::bitstreams::BinaryWriterBuilder;
use crate::offsets::OffsetIndex;
use crate::{int2nat, EncodingType, GraphError, ImmutableGraph, Properties};

fn arc_list(n: usize, arcs: &[(usize, usize)]) -> ArcListGraph {
    ArcListGraphBuilder::new()
        .set_num_nodes(n)
        .add_arcs(arcs.iter().copied())
        .build()
        .unwrap()
}

/// A graph with the structure compression is meant for: successor lists
/// similar to the previous ones, runs of consecutive ids and a few random arcs.
fn random_graph(seed: u64, n: usize) -> ArcListGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut arcs = Vec::new();
    let mut prev: Vec<usize> = Vec::new();

    for x in 0..n {
        let mut succ: Vec<usize> = prev.iter().copied().filter(|_| rng.gen_bool(0.7)).collect();

        if rng.gen_bool(0.3) {
            let start = rng.gen_range(0..n);
            let len = rng.gen_range(1..12);
            succ.extend((start..start + len).filter(|&y| y < n));
        }
        for _ in 0..rng.gen_range(0..4) {
            succ.push(rng.gen_range(0..n));
        }
        if rng.gen_bool(0.1) {
            succ.clear();
        }

        arcs.extend(succ.iter().map(|&y| (x, y)));
        succ.sort_unstable();
        succ.dedup();
        prev = succ;
    }

    ArcListGraphBuilder::new().set_num_nodes(n).add_arcs(arcs).build().unwrap()
}

fn compress_with(graph: &ArcListGraph, props: Properties) -> BVGraph {
    BVComp::new(props).compress(graph).unwrap().into_graph().unwrap()
}

fn parameter_sets() -> Vec<Properties> {
    vec![
        Properties::default(),
        Properties {
            window_size: 0,
            min_interval_len: 0,
            ..Default::default()
        },
        Properties {
            window_size: 2,
            max_ref_count: 1,
            min_interval_len: 2,
            zeta_k: Some(5),
            outdegree_coding: EncodingType::DELTA,
            reference_coding: EncodingType::GAMMA,
            block_coding: EncodingType::ZETA,
            residual_coding: EncodingType::GAMMA,
            ..Default::default()
        },
        Properties {
            window_size: 12,
            max_ref_count: 50,
            min_interval_len: 1,
            zeta_k: Some(1),
            block_count_coding: EncodingType::UNARY,
            interval_coding: EncodingType::DELTA,
            ..Default::default()
        },
        Properties {
            max_ref_count: 0,
            ..Default::default()
        },
    ]
}

fn assert_same_graph(bvgraph: &BVGraph, graph: &ArcListGraph) {
    assert_eq!(bvgraph.num_nodes(), graph.num_nodes());
    assert_eq!(bvgraph.num_arcs(), graph.num_arcs());
    for x in 0..graph.num_nodes() {
        let expected = graph.successors(x).unwrap();
        assert_eq!(bvgraph.successors(x).unwrap(), expected, "node {}", x);
        assert_eq!(bvgraph.outdegree(x).unwrap(), expected.len(), "node {}", x);
    }
}

#[test]
fn test_three_nodes_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("three");
    let basename = basename.to_str().unwrap();

    let graph = arc_list(3, &[(0, 1), (0, 2), (1, 2)]);
    BVComp::default().store(&graph, basename).unwrap();

    let bvgraph = BVGraph::load(&format!("{}.graph", basename)).unwrap();
    assert_eq!(bvgraph.num_nodes(), 3);
    assert_eq!(bvgraph.num_arcs(), 3);
    assert_eq!(&*bvgraph.successors(0).unwrap(), &[1, 2]);
    assert_eq!(&*bvgraph.successors(1).unwrap(), &[2]);
    assert!(bvgraph.successors(2).unwrap().is_empty());

    let edges: Vec<_> = enumerate_edges(&bvgraph).map(Result::unwrap).collect();
    assert_eq!(edges, vec![(0, 1), (0, 2), (1, 2)]);
}

#[test]
fn test_empty_graph() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("empty");
    let basename = basename.to_str().unwrap();

    BVComp::default().store(&arc_list(0, &[]), basename).unwrap();
    let bvgraph = BVGraph::load(basename).unwrap();

    assert_eq!(bvgraph.num_nodes(), 0);
    assert_eq!(bvgraph.num_arcs(), 0);
    assert_eq!(bvgraph.iter().count(), 0);
    assert_eq!(enumerate_edges(&bvgraph).count(), 0);
    assert!(matches!(bvgraph.successors(0), Err(GraphError::OutOfRange { value: 0, limit: 0, .. })));
}

#[test]
fn test_nodes_without_successors() {
    let graph = arc_list(6, &[(1, 4), (4, 1)]);
    let bvgraph = compress_with(&graph, Properties::default());

    for x in [0, 2, 3, 5] {
        assert!(bvgraph.successors(x).unwrap().is_empty());
        assert_eq!(bvgraph.outdegree(x).unwrap(), 0);
    }
    let edges: Vec<_> = bvgraph.arcs().map(Result::unwrap).collect();
    assert_eq!(edges, vec![(1, 4), (4, 1)]);
}

#[test]
fn test_successors_out_of_bounds() {
    let bvgraph = compress_with(&random_graph(1, 20), Properties::default());

    for x in [20, 21, usize::MAX] {
        assert!(matches!(bvgraph.successors(x), Err(GraphError::OutOfRange { .. })), "node {}", x);
        assert!(matches!(bvgraph.outdegree(x), Err(GraphError::OutOfRange { .. })), "node {}", x);
    }
}

#[test]
fn test_random_round_trips() {
    for (i, props) in parameter_sets().into_iter().enumerate() {
        let graph = random_graph(i as u64, 300);
        let bvgraph = compress_with(&graph, props.clone());

        assert_eq!(bvgraph.properties().window_size, props.window_size);
        assert_same_graph(&bvgraph, &graph);
    }
}

#[test]
fn test_reference_chains_respect_max_ref_count() {
    // All the lists are equal, so every node would like to refer to the previous one
    let n = 40;
    let arcs: Vec<_> = (0..n).flat_map(|x| [(x, 1), (x, 5), (x, 9), (x, 30)]).collect();
    let graph = arc_list(n, &arcs);

    for max_ref_count in [0, 1, 3] {
        let bvgraph = compress_with(
            &graph,
            Properties {
                max_ref_count,
                ..Default::default()
            },
        );
        assert_same_graph(&bvgraph, &graph);
    }
}

#[test]
fn test_sequential_matches_random_access() {
    let graph = random_graph(7, 500);
    let bvgraph = compress_with(&graph, Properties::default());

    let mut nodes = bvgraph.iter();
    let mut expected_node = 0;
    while let Some(x) = nodes.next() {
        let x = x.unwrap();
        assert_eq!(x, expected_node);
        assert_eq!(nodes.successor_array(), &*bvgraph.successors(x).unwrap());
        assert_eq!(nodes.outdegree(), bvgraph.outdegree(x).unwrap());
        expected_node += 1;
    }
    assert_eq!(expected_node, 500);

    let edges: Vec<_> = bvgraph.arcs().map(Result::unwrap).collect();
    let expected: Vec<_> = graph.arcs().collect();
    assert_eq!(edges, expected);
}

#[test]
fn test_repeated_queries_are_identical() {
    let bvgraph = compress_with(&random_graph(3, 100), Properties::default());
    let mut reader = bvgraph.reader();

    for x in [57, 3, 57, 99, 0, 57] {
        let first = bvgraph.successors(x).unwrap();
        assert_eq!(bvgraph.successors(x).unwrap(), first);
        assert_eq!(bvgraph.successors_with(x, &mut reader).unwrap(), first);
    }
}

#[test]
fn test_concurrent_queries() {
    let graph = random_graph(11, 400);
    let bvgraph = compress_with(&graph, Properties::default());
    let expected: Vec<_> = (0..400).map(|x| bvgraph.successors(x).unwrap()).collect();

    thread::scope(|s| {
        for t in 0..4 {
            let (bvgraph, expected) = (&bvgraph, &expected);
            s.spawn(move || {
                let mut reader = bvgraph.reader();
                for x in (t..400).step_by(3) {
                    assert_eq!(bvgraph.successors_with(x, &mut reader).unwrap(), expected[x]);
                }
            });
        }
    });
}

#[test]
fn test_store_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("random");
    let basename = basename.to_str().unwrap();

    let graph = random_graph(5, 250);
    let props = Properties {
        zeta_k: Some(4),
        residual_coding: EncodingType::DELTA,
        ..Default::default()
    };
    let stored = BVComp::new(props).store(&graph, basename).unwrap();

    let bvgraph = BVGraph::load(basename).unwrap();
    assert_eq!(bvgraph.properties(), &stored);
    assert_same_graph(&bvgraph, &graph);
}

#[test]
fn test_scan_matches_compressor_offsets() {
    for (i, props) in parameter_sets().into_iter().enumerate() {
        let compressed = BVComp::new(props).compress(&random_graph(100 + i as u64, 200)).unwrap();

        let scanned = OffsetIndex::scan(Arc::from(compressed.graph.os.clone()), &compressed.properties).unwrap();
        assert_eq!(scanned, compressed.offsets);
    }
}

#[test]
fn test_elias_fano_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("ef");
    let basename = basename.to_str().unwrap();

    let graph = random_graph(21, 150);
    let compressed = BVComp::default().compress(&graph).unwrap();
    compressed.store(basename).unwrap();
    compressed.offsets.store_elias_fano(basename).unwrap();
    // The γ-coded offsets are not needed when the Elias-Fano ones exist
    fs::remove_file(format!("{}.offsets", basename)).unwrap();

    let bvgraph = BVGraph::load(basename).unwrap();
    assert_eq!(bvgraph.offsets(), &compressed.offsets);
    assert_same_graph(&bvgraph, &graph);
}

#[test]
fn test_missing_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("g");
    let basename = basename.to_str().unwrap();

    assert!(matches!(BVGraph::load(basename), Err(GraphError::NotFound { .. })));

    BVComp::default().store(&random_graph(2, 10), basename).unwrap();
    fs::remove_file(format!("{}.offsets", basename)).unwrap();
    assert!(matches!(BVGraph::load(basename), Err(GraphError::NotFound { .. })));

    BVComp::default().store(&random_graph(2, 10), basename).unwrap();
    fs::remove_file(format!("{}.graph", basename)).unwrap();
    assert!(matches!(BVGraph::load(basename), Err(GraphError::NotFound { .. })));
}

#[test]
fn test_truncated_bitstream() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("cut");
    let basename = basename.to_str().unwrap();

    let graph = random_graph(8, 200);
    BVComp::default().store(&graph, basename).unwrap();
    let path = format!("{}.graph", basename);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let bvgraph = BVGraph::load(basename).unwrap();
    assert!(matches!(bvgraph.successors(199), Err(GraphError::TruncatedStream { .. })));

    let results: Vec<_> = enumerate_edges(&bvgraph).collect();
    assert!(matches!(results.last(), Some(Err(GraphError::TruncatedStream { .. }))));
    assert!(results[..results.len() - 1].iter().all(|r| r.is_ok()));
}

#[test]
fn test_header_and_offsets_must_agree() {
    let compressed = BVComp::default().compress(&random_graph(4, 30)).unwrap();
    let props = Properties {
        nodes: 31,
        ..compressed.properties.clone()
    };

    assert!(matches!(
        BVGraph::from_parts(props, Arc::from(compressed.graph.os.clone()), compressed.offsets.clone()),
        Err(GraphError::Format(_))
    ));
}

/// Props for hand-written records: no references, no intervals, γ residuals.
fn plain_props(nodes: usize) -> Properties {
    Properties {
        nodes,
        window_size: 0,
        min_interval_len: 0,
        residual_coding: EncodingType::GAMMA,
        ..Default::default()
    }
}

#[test]
fn test_successor_out_of_range_is_format_error() {
    // Node 0 has a single successor, 5, in a graph with two nodes
    let mut writer = BinaryWriterBuilder::new();
    let mut lengths = Vec::new();
    let len = EncodingType::GAMMA.write_next(&mut writer, 1, None) + EncodingType::GAMMA.write_next(&mut writer, int2nat(5), None);
    lengths.push(len);
    lengths.push(EncodingType::GAMMA.write_next(&mut writer, 0, None));
    let written = writer.build();

    let bvgraph = BVGraph::from_parts(plain_props(2), Arc::from(written.os), OffsetIndex::build(lengths)).unwrap();

    assert!(matches!(bvgraph.successors(0), Err(GraphError::Format(_))));
    assert!(bvgraph.successors(1).unwrap().is_empty());
    assert!(matches!(bvgraph.arcs().next(), Some(Err(GraphError::Format(_)))));
}

#[test]
fn test_record_length_mismatch_is_format_error() {
    // Node 0 -> [1], but the offsets claim the record is one bit longer
    let mut writer = BinaryWriterBuilder::new();
    let len = EncodingType::GAMMA.write_next(&mut writer, 1, None) + EncodingType::GAMMA.write_next(&mut writer, int2nat(1), None);
    EncodingType::GAMMA.write_next(&mut writer, 0, None);
    let written = writer.build();

    let bvgraph = BVGraph::from_parts(plain_props(2), Arc::from(written.os), OffsetIndex::build([len + 1, 0])).unwrap();

    assert!(matches!(bvgraph.successors(0), Err(GraphError::Format(_))));
    assert!(matches!(bvgraph.iter().next(), Some(Err(GraphError::Format(_)))));
}

#[test]
fn test_reference_outside_window_is_format_error() {
    // Window of 1, but node 1 refers 2 nodes back
    let props = Properties {
        window_size: 1,
        ..plain_props(2)
    };
    let mut writer = BinaryWriterBuilder::new();
    let first = EncodingType::GAMMA.write_next(&mut writer, 0, None);
    let second = EncodingType::GAMMA.write_next(&mut writer, 1, None) + EncodingType::UNARY.write_next(&mut writer, 2, None);
    let written = writer.build();

    let bvgraph = BVGraph::from_parts(props, Arc::from(written.os), OffsetIndex::build([first, second])).unwrap();

    assert!(matches!(bvgraph.successors(1), Err(GraphError::Format(_))));
}

#[test]
fn test_unsorted_input_is_rejected() {
    struct Unsorted;

    impl ImmutableGraph for Unsorted {
        fn num_nodes(&self) -> usize {
            2
        }
        fn num_arcs(&self) -> usize {
            2
        }
        fn outdegree(&self, _x: usize) -> crate::Result<usize> {
            Ok(2)
        }
        fn successors(&self, _x: usize) -> crate::Result<Box<[usize]>> {
            Ok(vec![1, 0].into_boxed_slice())
        }
    }

    assert!(matches!(BVComp::default().compress(&Unsorted), Err(GraphError::Format(_))));
}

#[test]
fn test_oversized_window_in_header() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("wide");
    let basename = basename.to_str().unwrap();

    let graph = arc_list(3, &[(0, 1), (0, 2), (1, 2)]);
    BVComp::default().store(&graph, basename).unwrap();
    let path = format!("{}.properties", basename);
    let header = fs::read_to_string(&path).unwrap();

    for window in ["1000000000000", "18446744073709551615"] {
        let rewritten = header.replace("windowsize=7", &format!("windowsize={}", window));
        assert_ne!(rewritten, header);
        fs::write(&path, rewritten).unwrap();
        assert!(matches!(BVGraph::load(basename), Err(GraphError::Format(_))), "windowsize={}", window);
    }

    let rewritten = header.replace("maxrefcount=3", "maxrefcount=1000000000");
    fs::write(&path, rewritten).unwrap();
    assert!(matches!(BVGraph::load(basename), Err(GraphError::Format(_))));
}

#[test]
fn test_oversized_window_is_rejected() {
    let compressed = BVComp::default().compress(&random_graph(5, 20)).unwrap();
    let wide = Properties {
        window_size: usize::MAX,
        ..compressed.properties.clone()
    };
    assert!(matches!(
        BVGraph::from_parts(wide.clone(), Arc::from(compressed.graph.os.clone()), compressed.offsets.clone()),
        Err(GraphError::Format(_))
    ));
    assert!(matches!(
        OffsetIndex::scan(Arc::from(compressed.graph.os.clone()), &wide),
        Err(GraphError::Format(_))
    ));

    let deep = Properties {
        max_ref_count: usize::MAX,
        ..Default::default()
    };
    assert!(matches!(BVComp::new(wide).compress(&random_graph(5, 20)), Err(GraphError::Format(_))));
    assert!(matches!(BVComp::new(deep).compress(&random_graph(5, 20)), Err(GraphError::Format(_))));
}

#[test]
fn test_huge_node_count_with_short_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("huge");
    let basename = basename.to_str().unwrap();

    let mut writer = BinaryWriterBuilder::new();
    EncodingType::GAMMA.write_next(&mut writer, 0, None);
    let one_byte = writer.build().os;
    assert_eq!(one_byte.len(), 1);

    fs::write(
        format!("{}.properties", basename),
        format!("nodes={}\narcs=0\n", crate::properties::MAX_NODES),
    )
    .unwrap();
    fs::write(format!("{}.graph", basename), &one_byte).unwrap();
    fs::write(format!("{}.offsets", basename), &one_byte).unwrap();

    assert!(matches!(BVGraph::load(basename), Err(GraphError::Format(_))));
    assert!(matches!(
        OffsetIndex::from_gaps(Arc::from(one_byte), usize::MAX),
        Err(GraphError::Format(_))
    ));
}

#[test]
fn test_outdegree_larger_than_stream() {
    // Node 0 claims 999 successors, but its record stops after the outdegree
    let mut writer = BinaryWriterBuilder::new();
    let mut lengths = vec![EncodingType::GAMMA.write_next(&mut writer, 999, None)];
    lengths.resize(1000, 0);
    let written = writer.build();

    let bvgraph = BVGraph::from_parts(plain_props(1000), Arc::from(written.os), OffsetIndex::build(lengths)).unwrap();

    assert!(matches!(bvgraph.successors(0), Err(GraphError::TruncatedStream { .. })));
    assert_eq!(bvgraph.outdegree(0).unwrap(), 999);
    assert!(matches!(bvgraph.iter().next(), Some(Err(GraphError::TruncatedStream { .. }))));
}

#[test]
fn test_outdegree_of_a_billion_is_not_preallocated() {
    let props = plain_props(1_000_000_000);
    let mut writer = BinaryWriterBuilder::new();
    EncodingType::GAMMA.write_next(&mut writer, 1_000_000_000, None);
    EncodingType::GAMMA.write_next(&mut writer, int2nat(1), None);
    let written = writer.build();

    let mut nodes = BVGraphNodeIterator::new(&props, crate::bitstreams::BinaryReader::new(Arc::from(written.os)), None);
    assert!(matches!(nodes.next(), Some(Err(GraphError::TruncatedStream { .. }))));
    assert!(nodes.next().is_none());
}
