pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "roomwise",
    about = "Roomwise operator CLI",
    long_about = "Prepare the Roomwise database, inspect configuration and check runtime readiness.",
    after_help = "Examples:\n  roomwise migrate\n  roomwise seed\n  roomwise doctor --json\n  roomwise rooms"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo room inventory and directory")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, time zone and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the room inventory stored in the database")]
    Rooms,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Rooms => commands::rooms::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
