//! # Performance Engine Entry Point
//!
//! Runs the sweep scheduler, applies migrations, bootstraps tenants and
//! invokes single sweeps for one tenant.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use performance_engine::{
    config::{AppConfig, ConfigLoader},
    db,
    engine::PerformanceEngine,
    period::PeriodType,
    scheduler::{EngineScheduler, SweepReport},
    telemetry,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "performance-engine",
    about = "Sales performance scoring and gamification engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply migrations and run the sweep scheduler (default command)
    Run,
    /// Apply pending database migrations and exit
    Migrate,
    /// Validate the configuration and print it
    CheckConfig,
    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Run one sweep for one tenant
    Sweep {
        #[command(subcommand)]
        command: SweepCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TenantCommand {
    /// Register a tenant and seed its defaults
    Create {
        #[arg(long)]
        name: String,
    },
    /// Seed the defaults of an existing tenant; existing rows are kept
    Bootstrap {
        #[arg(long)]
        tenant: Uuid,
    },
}

#[derive(Args, Debug)]
struct TenantArg {
    #[arg(long)]
    tenant: Uuid,
}

#[derive(Subcommand, Debug)]
enum SweepCommand {
    DailySnapshot {
        #[arg(long)]
        tenant: Uuid,
        /// Day to snapshot (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    PeriodSummary {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long, value_parser = parse_period)]
        period: PeriodType,
        /// Any day inside the period (default: today)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
    },
    Leaderboard {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long, value_parser = parse_period)]
        period: PeriodType,
    },
    /// Pay the medals of the last closed board
    Medals {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long, value_parser = parse_period, default_value = "weekly")]
        period: PeriodType,
    },
    Achievements(TenantArg),
    Penalties(TenantArg),
    ScoreDecay(TenantArg),
    /// Run the periodic reminders once
    Alerts(TenantArg),
    DailySummary(TenantArg),
    AlertCleanup(TenantArg),
    Bonuses {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long, value_parser = parse_period, default_value = "monthly")]
        period: PeriodType,
        /// Any day inside the period (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| err.to_string())
}

fn parse_period(value: &str) -> Result<PeriodType, String> {
    value.parse::<PeriodType>().map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;

    let command = cli.command.unwrap_or(Command::Run);
    if let Command::CheckConfig = command {
        println!("{}", config.redacted_json()?);
        return Ok(());
    }

    telemetry::init_tracing(&config).context("initializing tracing")?;
    if let Ok(redacted) = config.redacted_json() {
        info!(profile = %config.profile, config = %redacted, "Loaded configuration");
    }

    let pool = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match command {
        Command::CheckConfig => Ok(()),
        Command::Migrate => {
            db::run_migrations(&pool).await?;
            info!("Migrations applied");
            Ok(())
        }
        Command::Run => run_scheduler(config, pool).await,
        Command::Tenant { command } => {
            let engine = PerformanceEngine::new(pool, config.engine.clone());
            match command {
                TenantCommand::Create { name } => {
                    let (tenant, report) = engine.create_tenant(&name).await?;
                    println!("{}", tenant.id);
                    info!(tenant_id = %tenant.id, ?report, "Tenant created");
                }
                TenantCommand::Bootstrap { tenant } => {
                    let report = engine.bootstrap_tenant(tenant).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            Ok(())
        }
        Command::Sweep { command } => {
            let engine = Arc::new(PerformanceEngine::new(pool, config.engine.clone()));
            let scheduler = EngineScheduler::new(engine, config.scheduler.clone());
            let report = run_sweep(&scheduler, command).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn run_scheduler(config: AppConfig, pool: sea_orm::DatabaseConnection) -> Result<()> {
    db::run_migrations(&pool).await?;
    db::health_check(&pool).await?;

    let engine = Arc::new(PerformanceEngine::new(pool, config.engine.clone()));
    let scheduler = EngineScheduler::new(engine, config.scheduler.clone());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal.cancel();
    });

    scheduler.run(shutdown).await?;
    Ok(())
}

async fn run_sweep(scheduler: &EngineScheduler, command: SweepCommand) -> Result<SweepReport> {
    let today = Utc::now().date_naive();
    let report = match command {
        SweepCommand::DailySnapshot { tenant, date } => {
            scheduler
                .run_daily_snapshot(tenant, date.unwrap_or(today))
                .await?
        }
        SweepCommand::PeriodSummary {
            tenant,
            period,
            start,
        } => {
            scheduler
                .run_period_summary(tenant, period, start.unwrap_or(today))
                .await?
        }
        SweepCommand::Leaderboard { tenant, period } => {
            scheduler.run_leaderboard_update(tenant, period).await?
        }
        SweepCommand::Medals { tenant, period } => {
            scheduler.run_medal_settlement(tenant, period, today).await?
        }
        SweepCommand::Achievements(TenantArg { tenant }) => {
            scheduler.run_achievement_sweep(tenant).await?
        }
        SweepCommand::Penalties(TenantArg { tenant }) => {
            scheduler.run_penalty_sweep(tenant).await?
        }
        SweepCommand::ScoreDecay(TenantArg { tenant }) => {
            scheduler.run_score_decay(tenant).await?
        }
        SweepCommand::Alerts(TenantArg { tenant }) => scheduler.run_alert_checks(tenant).await?,
        SweepCommand::DailySummary(TenantArg { tenant }) => {
            scheduler.run_daily_summary(tenant).await?
        }
        SweepCommand::AlertCleanup(TenantArg { tenant }) => {
            scheduler.run_alert_cleanup(tenant).await?
        }
        SweepCommand::Bonuses {
            tenant,
            period,
            date,
        } => {
            scheduler
                .run_bonus_calculation(tenant, period, date.unwrap_or(today))
                .await?
        }
    };
    Ok(report)
}
