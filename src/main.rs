// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, hand off to
//   `commands::run`.
// - Any error is printed in red and the process exits with status 1.

use clap::Parser;
use zat_cli::{cli::Cli, commands, ui};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = commands::run(cli) {
        ui::say_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}
