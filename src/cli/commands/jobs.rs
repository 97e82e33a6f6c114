use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::billing::StripeClient;
use crate::cli::utils::output_success;
use crate::cli::{connect, OutputFormat};
use crate::config;
use crate::jobs::{purge_inactive_users, refresh_subscriptions, JobReport};

#[derive(Subcommand)]
pub enum JobsCommands {
    #[command(about = "Delete non-admin accounts that have not logged in recently")]
    Cleanup {
        #[arg(long, help = "Inactivity window in months (defaults to JOBS_INACTIVE_AFTER_MONTHS)")]
        months: Option<u32>,
    },
    #[command(about = "Re-read subscription periods from the billing provider")]
    Subscriptions,
}

pub async fn handle(cmd: JobsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let pool = connect().await?;
    let billing = StripeClient::new(&config.billing);

    match cmd {
        JobsCommands::Cleanup { months } => {
            let months = months.unwrap_or(config.jobs.inactive_after_months);
            let report = purge_inactive_users(&pool, &billing, months, Utc::now()).await?;
            output_report(&output_format, "Inactive user cleanup finished", report)
        }
        JobsCommands::Subscriptions => {
            let report = refresh_subscriptions(&pool, &billing).await?;
            output_report(&output_format, "Subscription refresh finished", report)
        }
    }
}

fn output_report(output_format: &OutputFormat, message: &str, report: JobReport) -> anyhow::Result<()> {
    output_success(
        output_format,
        message,
        Some(json!({
            "processed": report.processed,
            "succeeded": report.succeeded,
            "failed": report.failed,
            "skipped": report.skipped,
        })),
    )
}
