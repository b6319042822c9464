use clap::Parser;

use warden::adapter::inbound::cli::command::{Cli, ColorChoice, Commands};
use warden::adapter::inbound::cli::output::{self, OutputConfig};
use warden::adapter::inbound::cli::{check, operator, run, status};
use warden::error::Result;

fn apply_color(choice: &ColorChoice) {
    match choice {
        ColorChoice::Auto => owo_colors::unset_override(),
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run::execute(&args).await,
        Commands::Status(args) => status::execute(&args),
        Commands::Check(args) => check::execute(&args.config),
        Commands::ForceTransition(args) => operator::force_transition(&args),
        Commands::EnableTrading(args) => operator::enable_trading(&args.config),
        Commands::DisableTrading(args) => operator::disable_trading(&args),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    apply_color(&cli.color);
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));

    if let Err(e) = dispatch(cli).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
