// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, hand off to the
//   command dispatcher.
// - Returns `anyhow::Result` so command errors surface with context.

use clap::Parser;
use cohesity_cli::{cli::Cli, commands, logging};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let code = commands::dispatch(cli)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
