//! HTDSA command line tool.
//!
//! This tool provides commands for:
//! - Generating P-192 keypairs for clients and services
//! - Signing a request with a configured client key
//! - Verifying a service response signature
//! - Validating configuration files

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

use htdsa_common::logging::init_logging;

mod config;
mod error;
mod keygen;
mod protocol;

use error::CliError;

#[derive(Parser)]
#[command(name = "htdsa")]
#[command(about = "HTDSA key generation, request signing and response verification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new keypair
    Keygen {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: KeyFormat,
    },

    /// Sign a request and print the headers to send with it
    Sign {
        /// Path to the TOML configuration file
        #[arg(long, short, env = "HTDSA_CONFIG")]
        config: PathBuf,

        /// HTTP method
        #[arg(long, short, default_value = "GET")]
        method: String,

        /// Full request URL
        #[arg(long, short)]
        url: String,

        /// File holding the request body
        #[arg(long, short)]
        body: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Verify a response signature
    Verify(VerifyArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to the TOML configuration file
    #[arg(long, short, env = "HTDSA_CONFIG")]
    pub config: PathBuf,

    /// HTTP method of the original request
    #[arg(long, short, default_value = "GET")]
    pub method: String,

    /// Full URL of the original request
    #[arg(long, short)]
    pub url: String,

    /// Response status code
    #[arg(long, default_value_t = 200)]
    pub status: u16,

    /// Response `Date` header
    #[arg(long, short)]
    pub date: String,

    /// Response `X-Signature` header
    #[arg(long, short)]
    pub signature: Option<String>,

    /// File holding the response body
    #[arg(long, short)]
    pub body: Option<PathBuf>,

    /// Check freshness against this instant instead of the current time
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config and parse every configured key
    Validate {
        /// Path to the TOML configuration file
        #[arg(long, short)]
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum, Debug)]
pub enum KeyFormat {
    Text,
    Json,
    Toml,
}

#[derive(Clone, ValueEnum, Debug)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = init_logging(level) {
        eprintln!("Warning: {e:?}");
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Keygen { format } => keygen::generate_and_display(&format),
        Commands::Sign {
            config,
            method,
            url,
            body,
            format,
        } => protocol::sign(&config, &method, &url, body.as_deref(), &format, cli.verbose),
        Commands::Verify(args) => protocol::verify(&args, cli.verbose),
        Commands::Config { action } => match action {
            ConfigAction::Validate { file } => config::validate(&file, cli.verbose),
        },
    }
}
