//! CLI for the ferry transfer pipeline.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod run;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(
    name = "ferry",
    version,
    about = "Bounded producer/consumer transfer over loopback TCP"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch a consumer and stream a file of integers to it.
    Run(Box<run::RunArgs>),

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

fn main() {
    if let Err(e) = Cli::parse().dispatch() {
        eprintln!("ferry: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Run(args) => args.run(),
            Command::Completion { shell } => {
                clap_complete::generate(
                    shell,
                    &mut Self::command(),
                    "ferry",
                    &mut std::io::stdout(),
                );
                Ok(())
            }
        }
    }
}
