mod commands;

use clap::{Parser, Subcommand};
use commands::{build, serve};
use std::error::Error;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

/// Log filter variable, e.g. `RMSERVER_LOG=debug`.
const LOG_ENV: &str = "RMSERVER_LOG";

#[derive(Parser)]
#[command(name = "rmserver")]
#[command(author, version, about = "Mock HTTP server generated from a RAML API description")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    async fn run(self) -> Result<(), Box<dyn Error>> {
        match self.command {
            Commands::Build(args) => build::run(args).await,
            Commands::Serve(args) => serve::run(args).await,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a RAML file and write the compiled mock routes as JSON
    Build(build::BuildArgs),

    /// Serve mock responses for every operation in a RAML file
    Serve(serve::ServeArgs),
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}
