//! STRATA CLI
//!
//! Runs an in-process cluster demo and validates member configuration files.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use std::sync::Arc;
use strata_cluster::{ClusterRegistry, CoordinatorPolicy, MemberManager};
use strata_core::MemberConfig;
use strata_core::config::{DEFAULT_HOST, DEFAULT_PORT};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(
    about = "STRATA - in-process data grid with replicated collection catalogs",
    long_about = None
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cluster, create collections and report catalog sizes
    Demo {
        /// Number of members
        #[arg(short, long, default_value_t = 3)]
        members: usize,
        /// Number of dictionaries created on the first member
        #[arg(short, long, default_value_t = 2)]
        collections: usize,
        /// What happens when the coordinator leaves
        #[arg(long, value_enum, default_value_t = Policy::ReelectOldest)]
        policy: Policy,
    },
    /// Validate a JSON member configuration
    CheckConfig {
        /// Path to config file
        #[arg(short, long)]
        file: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// Oldest remaining member takes over
    ReelectOldest,
    /// No coordinator until the next join
    LeaveVacant,
}

impl From<Policy> for CoordinatorPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::ReelectOldest => Self::ReelectOldest,
            Policy::LeaveVacant => Self::LeaveVacant,
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strata=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn demo(members: usize, collections: usize, policy: Policy) -> Result<()> {
    if members == 0 {
        return Err(eyre!("--members must be at least 1"));
    }

    let policy = CoordinatorPolicy::from(policy);
    tracing::info!(members, collections, ?policy, "starting demo cluster");
    let registry = Arc::new(ClusterRegistry::with_policy(policy));
    let manager = MemberManager::new(Arc::clone(&registry));

    let mut started = Vec::with_capacity(members);
    for i in 0..members {
        let port = u16::try_from(usize::from(DEFAULT_PORT) + i)
            .wrap_err("member count exceeds the port range")?;
        let config =
            MemberConfig::new(format!("node{}", i + 1)).with_endpoint(DEFAULT_HOST, port);
        started.push(manager.start_member(config).await?);
    }

    let first = &started[0];
    for j in 0..collections {
        let dict = first
            .get_dictionary::<String, i64>(&format!("dict-{j}"))
            .await?;
        let count = i64::try_from(j).wrap_err("collection index overflow")?;
        dict.insert("created".to_string(), count);
    }
    tracing::info!(member = %first.name(), collections, "collections created");

    println!("{:<10} {:<8} {:<12} catalog", "member", "state", "coordinator");
    for member in manager.list_members().await {
        println!(
            "{:<10} {:<8} {:<12} {}",
            member.name(),
            format!("{:?}", member.state()),
            member.is_coordinator(),
            member.catalog_len().await
        );
    }
    println!("distinct collections: {}", registry.distinct_count().await);
    println!("aggregate count:      {}", registry.aggregate_count().await);

    manager.stop_member(first.name()).await;
    match registry.find_coordinator().await {
        Some(coordinator) => {
            tracing::info!(
                left = %first.name(),
                coordinator = %coordinator.name(),
                "coordinator handed off"
            );
        }
        None => tracing::info!(left = %first.name(), "coordinator role vacant"),
    }

    manager.stop_all().await;
    tracing::info!("demo cluster stopped");
    Ok(())
}

fn check_config(file: &str) -> Result<()> {
    let raw = std::fs::read_to_string(file).wrap_err_with(|| format!("reading {file}"))?;
    let config =
        MemberConfig::from_json(&raw).wrap_err_with(|| format!("invalid config in {file}"))?;
    tracing::info!(file, name = %config.name, "config is valid");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Demo {
            members,
            collections,
            policy,
        } => demo(members, collections, policy).await,
        Commands::CheckConfig { file } => check_config(&file),
    }
}
