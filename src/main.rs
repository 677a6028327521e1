use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use waygraph::consolidate::{self, ConsolidateConfig, Containers, DEFAULT_SORT_MEMORY};
use waygraph::formats::{GraphFile, NamesFile, RestrictionsFile};

#[derive(Parser)]
#[command(name = "waygraph")]
#[command(about = "Consolidate parsed OpenStreetMap primitives into routing graph artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the consolidation over a parser working directory
    Consolidate {
        /// Directory holding the raw containers left by the parsing stage
        workdir: PathBuf,
        /// Output node+edge graph file
        #[arg(long, short)]
        output: PathBuf,
        /// Output turn restrictions file
        #[arg(long, short)]
        restrictions: PathBuf,
        /// Output street name index
        #[arg(long, short)]
        names: PathBuf,
        /// Byte budget for each external sort pass
        #[arg(long, default_value_t = DEFAULT_SORT_MEMORY)]
        sort_memory: usize,
    },
    /// Structurally verify previously written artifacts
    Verify {
        /// Graph file to check
        graph: PathBuf,
        /// Restrictions file to check
        #[arg(long)]
        restrictions: Option<PathBuf>,
        /// Name index to check
        #[arg(long)]
        names: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Consolidate {
            workdir,
            output,
            restrictions,
            names,
            sort_memory,
        } => {
            let config = ConsolidateConfig {
                sort_memory,
                output_file: output,
                restrictions_file: restrictions,
                names_file: names,
            };
            let mut containers = Containers::open(&workdir)?;
            consolidate::run(&config, &mut containers)?;
        }
        Commands::Verify {
            graph,
            restrictions,
            names,
        } => {
            GraphFile::verify(&graph)?;
            if let Some(path) = restrictions {
                RestrictionsFile::verify(&path)?;
            }
            if let Some(path) = names {
                NamesFile::verify(&path)?;
            }
        }
    }

    Ok(())
}
