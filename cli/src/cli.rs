use clap::Args;
use clap::Parser;
use keeper_scrapyd_client::JobStatus;
use std::path::PathBuf;

/// Keep a durable history of the jobs a Scrapyd daemon runs.
#[derive(Debug, Parser)]
#[command(name = "keeper", version)]
pub struct Cli {
    #[clap(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Keeper home directory. Defaults to $KEEPER_HOME or ~/.keeper.
    #[arg(long, env = "KEEPER_HOME", global = true)]
    pub home: Option<PathBuf>,

    /// Scrapyd base URL; overrides `server.url` from config.toml.
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// List the daemon's projects, recording any new ones locally.
    Projects,

    /// List the spiders deployed in a project.
    Spiders { project: String },

    /// Reconcile and show the current jobs of a project.
    Jobs {
        project: String,

        /// Only show jobs in this state.
        #[arg(long, value_parser = parse_status)]
        status: Option<JobStatus>,
    },

    /// Show recorded executions of a project, newest first.
    History {
        project: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Reconcile every project once, or continuously with --watch.
    Sync(SyncArgs),

    /// Schedule a spider run.
    Schedule {
        project: String,
        spider: String,

        /// Spider argument as key=value; may be repeated.
        #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        args: Vec<(String, String)>,
    },

    /// Ask the daemon to cancel a job.
    Cancel { project: String, job: String },

    /// Upload an egg as a new project version.
    Deploy { project: String, egg: PathBuf },

    /// Delete a project on the daemon and drop its local history.
    DeleteProject { project: String },

    /// Print the URL of a job's log on the daemon.
    LogUrl {
        project: String,
        spider: String,
        job: String,
    },
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Keep polling until interrupted.
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    /// Seconds between passes; overrides `poll.interval_secs`.
    #[arg(long, value_name = "SECS")]
    pub interval_secs: Option<u64>,
}

fn parse_status(value: &str) -> Result<JobStatus, String> {
    value.parse()
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{value}`")),
    }
}
