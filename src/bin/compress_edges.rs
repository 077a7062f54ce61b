use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use webgraph_lite::{
    arc_list_graph::ArcListGraphBuilder, webgraph::BVComp, EncodingType, ImmutableGraph, Properties,
};

#[derive(Parser, Debug)]
#[command(about = "Compresses a text list of arcs into a BVGraph")]
struct Args {
    /// The arc list: one "source target" pair per line, # starts a comment
    source_name: String,
    /// The basename of the compressed graph
    dest_name: String,
    /// The size of the window
    #[arg(long, default_value_t = 7)]
    window_size: usize,
    /// The maximum reference chain length
    #[arg(long, default_value_t = 3)]
    max_ref_count: usize,
    /// The minimum length of an interval (0 disables intervals)
    #[arg(long, default_value_t = 4)]
    min_interval_length: usize,
    /// The shrinking factor of the zeta code used for residuals
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..=7))]
    zeta_k: u64,
    /// The code used for residuals
    #[arg(long, default_value_t = EncodingType::ZETA)]
    residuals: EncodingType,
    /// The number of nodes, if larger than the largest id in the arcs
    #[arg(long)]
    nodes: Option<usize>,
    /// Also write the offsets as an Elias-Fano list (.offsets.ef)
    #[arg(long)]
    elias_fano: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = ArcListGraphBuilder::new();
    if let Some(nodes) = args.nodes {
        builder = builder.set_num_nodes(nodes);
    }
    let graph = builder
        .load_arcs(&args.source_name)
        .and_then(|b| b.build())
        .with_context(|| format!("Could not read the arcs in {}", args.source_name))?;
    info!("Read {} nodes and {} arcs", graph.num_nodes(), graph.num_arcs());

    let props = Properties {
        window_size: args.window_size,
        max_ref_count: args.max_ref_count,
        min_interval_len: args.min_interval_length,
        zeta_k: Some(args.zeta_k),
        residual_coding: args.residuals,
        ..Default::default()
    };

    let mut comp = BVComp::new(props);
    let compressed = comp
        .compress(&graph)
        .with_context(|| format!("Could not compress {}", args.source_name))?;
    compressed
        .store(&args.dest_name)
        .with_context(|| format!("Could not store {}", args.dest_name))?;

    if args.elias_fano {
        compressed
            .offsets
            .store_elias_fano(&args.dest_name)
            .context("Failed storing the Elias-Fano offsets file")?;
    }

    info!(
        "Compressed to {} bits ({:.3} bits/arc)",
        compressed.graph.written_bits,
        compressed.graph.written_bits as f64 / graph.num_arcs().max(1) as f64
    );

    Ok(())
}
