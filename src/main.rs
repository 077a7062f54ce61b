use std::{
    fs::File,
    io::{self, BufWriter, Write},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use webgraph_lite::webgraph::{enumerate_edges, BVGraph};

#[derive(Parser, Debug)]
#[command(about = "Dumps the arcs of a BVGraph as text, one \"source target\" pair per line")]
struct Args {
    /// The basename of the graph (a trailing .graph is ignored)
    basename: String,
    /// The output file, or - for the standard output
    output: String,
}

fn dump(graph: &BVGraph, out: impl Write) -> Result<usize> {
    let mut out = out;
    let mut count = 0;

    for arc in enumerate_edges(graph) {
        let (u, v) = arc?;
        writeln!(out, "{} {}", u, v)?;
        count += 1;
    }
    out.flush()?;

    Ok(count)
}

/// Opens the standard output for `-`, otherwise creates the file `output`.
fn open_output(output: &str) -> Result<Box<dyn Write>> {
    if output == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    let file = File::create(output).with_context(|| format!("Could not create {}", output))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let graph = BVGraph::load(&args.basename).with_context(|| format!("Could not load {}", args.basename))?;

    let out = open_output(&args.output)?;
    let count = dump(&graph, out).with_context(|| format!("Failed dumping the arcs of {}", args.basename))?;

    info!("Wrote {} arcs", count);

    Ok(())
}
