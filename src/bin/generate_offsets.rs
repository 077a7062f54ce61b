use std::{fs, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use webgraph_lite::{offsets::OffsetIndex, Properties};

#[derive(Parser, Debug)]
#[command(about = "Generate the gamma-encoded .offsets file for a graph")]
struct Args {
    /// The basename of the graph file
    source_name: String,
    /// Also write the offsets as an Elias-Fano list (.offsets.ef)
    #[arg(long)]
    elias_fano: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let basename = args.source_name.strip_suffix(".graph").unwrap_or(&args.source_name);

    let props = Properties::load(basename).with_context(|| format!("Could not read the header of {}", basename))?;

    let path = format!("{}.graph", basename);
    let graph_memory = fs::read(&path).with_context(|| format!("Could not read {}", path))?;

    let offsets = OffsetIndex::scan(Arc::from(graph_memory), &props)
        .with_context(|| format!("Could not decode the records of {}", path))?;

    offsets.store(basename).context("Failed storing the offsets file")?;
    if args.elias_fano {
        offsets
            .store_elias_fano(basename)
            .context("Failed storing the Elias-Fano offsets file")?;
    }

    info!("Wrote the offsets of {} nodes ({} bits)", offsets.num_nodes(), offsets.end());

    Ok(())
}
