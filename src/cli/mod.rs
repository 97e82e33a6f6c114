pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config;
use crate::database::DatabaseManager;

#[derive(Parser)]
#[command(name = "lms")]
#[command(about = "LMS CLI - database and maintenance tasks for the LMS API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Run maintenance jobs on demand")]
    Jobs {
        #[command(subcommand)]
        cmd: commands::jobs::JobsCommands,
    },

    #[command(about = "Administrator account management")]
    Admin {
        #[command(subcommand)]
        cmd: commands::admin::AdminCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Pool from the same configuration the server uses, verified with a ping
pub(crate) async fn connect() -> anyhow::Result<PgPool> {
    let pool = DatabaseManager::pool(&config::config().database)?;
    DatabaseManager::health_check(&pool).await?;
    Ok(pool)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Jobs { cmd } => commands::jobs::handle(cmd, output_format).await,
        Commands::Admin { cmd } => commands::admin::handle(cmd, output_format).await,
    }
}
