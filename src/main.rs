use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use std::process;
use tracing::{error, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Design(cmd::design::DesignArgs),
    Validate(cmd::validate::ValidateArgs),
}

fn main() {
    // 1. Raw matches tell user input apart from defaults
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // 2. Subcommand matches carry the flattened config flags
    let Some((_, sub_matches)) = matches.subcommand() else {
        error!("No subcommand given");
        process::exit(2);
    };

    // 3. Execute
    let outcome = match cli.command {
        Commands::Design(args) => cmd::design::run(args, sub_matches),
        Commands::Validate(args) => cmd::validate::run(args),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("❌ {}", e);
            process::exit(2);
        }
    }
}
