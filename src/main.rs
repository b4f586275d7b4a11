//! # billing-ops
//!
//! Operator CLI and scheduler entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use billing_ops::api::{AdminApi, ApiResponse};
use billing_ops::config::ConfigLoader;
use billing_ops::price_migration::CreateMigrationRequest;
use billing_ops::{db, telemetry};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "billing-ops", version, about = "Billing operations: price migrations and usage consolidation")]
struct Cli {
    /// Directory holding the layered .env files
    #[arg(long, global = true)]
    env_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the background scheduler until interrupted
    Serve,
    /// Apply pending database migrations
    DbMigrate,
    /// Manage subscription price migrations
    #[command(subcommand)]
    Migration(MigrationCommand),
    /// Consolidate old usage records now
    Consolidate,
}

#[derive(Debug, Subcommand)]
enum MigrationCommand {
    /// Create a migration from a JSON definition file
    Create {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        created_by: String,
    },
    /// Enroll customers and send price change notices
    SendEmails { id: Uuid },
    /// Apply the new prices now
    Execute { id: Uuid },
    Cancel { id: Uuid },
    Show { id: Uuid },
    List,
    /// Migrations whose notice period has elapsed
    Pending,
    /// Preview the customers a migration would notify
    Customers { id: Uuid },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = ?err, "billing-ops failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let loader = match cli.env_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = Arc::new(loader.load().context("failed to load configuration")?);
    telemetry::init_tracing(&config)?;
    tracing::info!(profile = %config.profile, "Configuration loaded");
    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Effective configuration");
    }

    let db = Arc::new(db::init_pool(&config).await?);

    if let Command::DbMigrate = cli.command {
        db::run_migrations(&db).await?;
        return Ok(ExitCode::SUCCESS);
    }

    db::health_check(&db).await?;
    let api = AdminApi::from_config(config.clone(), db)?;

    match cli.command {
        Command::Serve => {
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "Failed to listen for shutdown signal");
                }
                signal_token.cancel();
            });
            api.scheduler().run(shutdown).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Consolidate => Ok(print(api.run_consolidation_now().await)),
        Command::Migration(command) => run_migration_command(&api, command).await,
        Command::DbMigrate => Ok(ExitCode::SUCCESS),
    }
}

async fn run_migration_command(api: &AdminApi, command: MigrationCommand) -> Result<ExitCode> {
    let code = match command {
        MigrationCommand::Create { file, created_by } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let request: CreateMigrationRequest = serde_json::from_str(&raw)
                .with_context(|| format!("invalid migration definition in {}", file.display()))?;
            print(api.create_migration(request, &created_by).await)
        }
        MigrationCommand::SendEmails { id } => print(api.send_migration_emails(id).await),
        MigrationCommand::Execute { id } => print(api.execute_migration(id).await),
        MigrationCommand::Cancel { id } => print(api.cancel_migration(id).await),
        MigrationCommand::Show { id } => print(api.get_migration_details(id).await),
        MigrationCommand::List => print(api.list_migrations().await),
        MigrationCommand::Pending => print(api.get_pending_migrations().await),
        MigrationCommand::Customers { id } => print(api.get_customers_to_migrate(id).await),
    };
    Ok(code)
}

fn print<T: Serialize>(response: ApiResponse<T>) -> ExitCode {
    let json = response.to_json();
    match serde_json::to_string_pretty(&json) {
        Ok(rendered) => println!("{rendered}"),
        Err(_) => println!("{json}"),
    }
    if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
