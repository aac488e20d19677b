//! Dentalink CLI - command-line client for the Dentalink backend.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};

use auth_engine::Role;
use client_config_and_utils::init_logging;

/// Dentalink CLI - manage your Dentalink account from the terminal.
#[derive(Parser)]
#[command(name = "dentalink")]
#[command(about = "Dentalink CLI for account and session management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Register a new account
    Register {
        /// Account role
        #[arg(long, value_enum, default_value = "patient")]
        role: RoleArg,
    },

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// Print the stored access token
    Token,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Patient,
    Doctor,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Patient => Role::Patient,
            RoleArg::Doctor => Role::Doctor,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Login => commands::login(&cli.format).await,
        Commands::Register { role } => commands::register(role.into(), &cli.format).await,
        Commands::Logout => commands::logout(&cli.format).await,
        Commands::Status => commands::status(&cli.format).await,
        Commands::Token => commands::token(&cli.format).await,
    };

    if let Err(e) = result {
        output::print_error(&e.to_string(), &cli.format);
        std::process::exit(1);
    }
}
