use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Job relauncher - recovers finished streaming jobs and launches them again
#[derive(Parser, Debug)]
#[command(name = "job-relauncher")]
#[command(version)]
#[command(about = "Extracts launch descriptors from a job control plane and relaunches them", long_about = None)]
pub struct Cli {
    /// JSON configuration file merged over the built-in defaults
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Control plane REST address (e.g., http://127.0.0.1:8081)
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// HTTP Basic Auth username
    #[arg(long = "username", global = true)]
    pub username: Option<String>,

    /// HTTP Basic Auth password
    #[arg(long = "password", global = true)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify jobs and write query/ETL descriptor files
    Process(ProcessArgs),

    /// List recorded job listings available for replay
    ListReplays,

    /// Launch query jobs from a descriptor file
    LaunchQuery(LaunchQueryArgs),

    /// Launch ETL jobs from a descriptor file
    LaunchEtl(LaunchEtlArgs),

    /// Stop running jobs
    Stop(StopArgs),
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Process only these job ids (comma separated); skips the job listing
    #[arg(long = "job-id", value_delimiter = ',', conflicts_with_all = ["job_name", "filter"])]
    pub job_id: Vec<String>,

    /// Job name, `*` matches any characters
    #[arg(long = "job-name")]
    pub job_name: Option<String>,

    /// Custom field condition KEY=VALUE
    #[arg(long = "filter")]
    pub filter: Option<String>,

    /// Job state to select
    #[arg(long = "state", default_value = "FINISHED")]
    pub state: String,

    /// Use a recorded job listing instead of the live one
    #[arg(long = "replay")]
    pub replay: bool,

    /// Recording to replay, formatted YYYYMMDD_HHMMSS (newest when omitted)
    #[arg(long = "replay-timestamp", requires = "replay")]
    pub replay_timestamp: Option<String>,

    /// Do not record the live job listing
    #[arg(long = "no-save-raw")]
    pub no_save_raw: bool,

    /// Query descriptor output file
    #[arg(long = "output")]
    pub output: Option<PathBuf>,

    /// ETL descriptor output file
    #[arg(long = "etl-output")]
    pub etl_output: Option<PathBuf>,

    /// Markdown run report file
    #[arg(long = "report")]
    pub report: Option<PathBuf>,

    /// Concurrent workers
    #[arg(long = "workers")]
    pub workers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LaunchSelectionArgs {
    /// Launch every entry in the file
    #[arg(long = "all", conflicts_with = "keys")]
    pub all: bool,

    /// Print the plan without launching anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Seconds to wait between launches
    #[arg(long = "interval")]
    pub interval: Option<u64>,
}

#[derive(Args, Debug)]
pub struct LaunchQueryArgs {
    /// Query descriptor file written by `process`
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Job ids or keys to launch (comma separated)
    #[arg(long = "job-id", id = "keys")]
    pub job_id: Option<String>,

    /// Shared jar that runs query jobs
    #[arg(long = "jar-id")]
    pub jar_id: Option<String>,

    #[command(flatten)]
    pub selection: LaunchSelectionArgs,
}

#[derive(Args, Debug)]
pub struct LaunchEtlArgs {
    /// ETL descriptor file written by `process`
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Job names or keys to launch (comma separated)
    #[arg(long = "job-name", id = "keys")]
    pub job_name: Option<String>,

    #[command(flatten)]
    pub selection: LaunchSelectionArgs,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Job ids to stop (comma separated)
    #[arg(long = "job-id", value_delimiter = ',')]
    pub job_id: Vec<String>,

    /// Stop every RUNNING job
    #[arg(long = "all", conflicts_with = "job_id")]
    pub all: bool,

    /// Print the plan without stopping anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Seconds to wait between stops
    #[arg(long = "interval")]
    pub interval: Option<u64>,
}
