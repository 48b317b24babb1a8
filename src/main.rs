use clap::Parser;

use painel::cli::{self, Cli, Commands};
use painel::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.command.is_interactive());

    let result = match cli.command {
        Commands::Dre(args) => cli::dre::dispatch(args),
        Commands::Session { command } => cli::session::dispatch(command),
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
