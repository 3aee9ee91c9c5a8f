pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use offerdesk_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "offerdesk",
    about = "Offerdesk operator CLI",
    long_about = "Operate Offerdesk migrations, demo fixtures, config inspection, readiness \
                  checks, and client invitations.",
    after_help = "Examples:\n  offerdesk doctor --json\n  offerdesk config\n  offerdesk invite --email dana@acme.test --name \"Dana Lee\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the deterministic demo dataset")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config and database readiness checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Issue a one-time access code for a client invitation")]
    Invite {
        #[arg(long, help = "Client email the code is bound to")]
        email: String,
        #[arg(long, help = "Client display name")]
        name: String,
        #[arg(long, default_value = "client", help = "Access role: client or admin")]
        role: String,
    },
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);
    let result = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    // A second init in the same process is fine to ignore.
    let _ = result;
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Invite { email, name, role } => commands::invite::run(&email, &name, &role),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
