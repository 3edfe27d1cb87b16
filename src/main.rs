use clap::Parser;
use salvage::presentation::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr only; stdout is reserved for the
    // single JSON result object
    let default_filter = if cli.verbose { "salvage=debug" } else { "salvage=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let code = cli::run(cli);
    std::process::exit(code);
}
