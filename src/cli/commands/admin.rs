use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::billing::StripeClient;
use crate::cli::utils::output_success;
use crate::cli::{connect, OutputFormat};
use crate::config;
use crate::services::UserService;
use crate::types::Role;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Create an administrator account")]
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, help = "At least 6 characters")]
        password: String,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Create { name, email, password } => {
            if password.len() < 6 {
                anyhow::bail!("Password must be at least 6 characters");
            }
            let pool = connect().await?;
            let billing = Arc::new(StripeClient::new(&config::config().billing));
            let users = UserService::new(pool, billing);

            let user = users
                .create_user(name.trim(), email.trim(), &password, Role::Admin, None, None)
                .await?;

            output_success(
                &output_format,
                "Administrator created",
                Some(json!({ "id": user.id, "email": user.email })),
            )
        }
    }
}
