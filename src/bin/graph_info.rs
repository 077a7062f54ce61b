use anyhow::{Context, Result};
use clap::Parser;
use webgraph_lite::Properties;

#[derive(Parser, Debug)]
#[command(about = "Prints the header of a BVGraph")]
struct Args {
    /// The basename of the graph (a trailing .graph is ignored)
    basename: String,
    /// Print the header as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let basename = args.basename.strip_suffix(".graph").unwrap_or(&args.basename);

    let props = Properties::load(basename).with_context(|| format!("Could not read the header of {}", basename))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&props)?);
    } else {
        print!("{}", String::from(&props));
    }

    Ok(())
}
