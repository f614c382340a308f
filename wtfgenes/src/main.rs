mod common;
mod run_mcmc;
mod run_subgraph;

use crate::common::*;
use run_mcmc::*;
use run_subgraph::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about, term_width = 80)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample ontology terms that explain one or more gene sets
    Mcmc(McmcArgs),
    /// Extract a rooted or slim subgraph of a JSON ontology
    Subgraph(SubgraphArgs),
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.commands {
        Commands::Mcmc(args) => {
            run_mcmc(args)?;
        }
        Commands::Subgraph(args) => {
            run_subgraph(args)?;
        }
    }

    Ok(())
}
