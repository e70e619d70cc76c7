use clap::Parser;
use keeper_core::ConfigOverrides;
use keeper_core::KeeperConfig;
use keeper_core::find_keeper_home;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod cli;
mod commands;

use crate::cli::Cli;
use crate::cli::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli { global, command } = Cli::parse();

    let watching = matches!(&command, Command::Sync(args) if args.watch);
    init_tracing(if watching { "info" } else { "warn" });

    let keeper_home = match global.home {
        Some(home) => home,
        None => find_keeper_home()?,
    };
    let overrides = ConfigOverrides {
        server_url: global.server,
        poll_interval_secs: match &command {
            Command::Sync(args) => args.interval_secs,
            _ => None,
        },
    };
    let config = KeeperConfig::load(keeper_home, overrides)?;
    let json = global.json;

    match command {
        Command::Projects => commands::projects(&config, json).await,
        Command::Spiders { project } => commands::spiders(&config, &project, json).await,
        Command::Jobs { project, status } => {
            commands::jobs(&config, &project, status, json).await
        }
        Command::History { project, limit } => {
            commands::history(&config, &project, limit, json).await
        }
        Command::Sync(args) => commands::sync(&config, &args, json).await,
        Command::Schedule {
            project,
            spider,
            args,
        } => commands::schedule(&config, &project, &spider, &args, json).await,
        Command::Cancel { project, job } => commands::cancel(&config, &project, &job).await,
        Command::Deploy { project, egg } => commands::deploy(&config, &project, &egg).await,
        Command::DeleteProject { project } => commands::delete(&config, &project).await,
        Command::LogUrl {
            project,
            spider,
            job,
        } => commands::log_url(&config.scrapyd_client()?, &project, &spider, &job),
    }
}

fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}
