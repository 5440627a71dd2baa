//! Command line entry point for the job relauncher

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use job_relauncher::job_selection::JobFilter;
use job_relauncher::launcher::load_entries;
use job_relauncher::{
    ControlPlaneClient, EtlJobDescriptor, EtlMapping, HttpTransport, JobClassifier, JobProcessor, JobSource,
    JobState, LaunchSelection, Launcher, Pipeline, QueryJobDescriptor, RunRequest, Settings, SnapshotStore,
    StopTarget, Stopper,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use args::{Cli, Command, LaunchEtlArgs, LaunchQueryArgs, LaunchSelectionArgs, ProcessArgs, StopArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run(cli: Cli) -> Result<u8> {
    let settings = settings_from(&cli);
    info!("job-relauncher v{} against {}", job_relauncher::VERSION, settings.api.base_url);

    match cli.command {
        Command::Process(args) => process(&settings, args).await,
        Command::ListReplays => Ok(list_replays(&settings)),
        Command::LaunchQuery(args) => launch_query(&settings, args).await,
        Command::LaunchEtl(args) => launch_etl(&settings, args).await,
        Command::Stop(args) => stop(&settings, args).await,
    }
}

/// Defaults, then the config file, then command line flags
fn settings_from(cli: &Cli) -> Settings {
    let mut settings = Settings::load(cli.config.as_deref());
    if let Some(base_url) = &cli.base_url {
        settings.api.base_url = base_url.clone();
    }
    if let Some(username) = &cli.username {
        settings.api.username = username.clone();
    }
    if let Some(password) = &cli.password {
        settings.api.password = password.clone();
    }
    if let Some(timeout) = cli.timeout {
        settings.api.timeout_secs = timeout;
    }
    settings
}

fn client_from(settings: &Settings) -> Result<ControlPlaneClient> {
    let transport = HttpTransport::new(
        &settings.api.base_url,
        &settings.api.username,
        &settings.api.password,
        settings.timeout(),
    )
    .context("Failed to create HTTP transport")?;

    Ok(ControlPlaneClient::new(
        Arc::new(transport),
        settings.retry_policy(),
        &settings.api.base_url,
    ))
}

// === Process ===

async fn process(settings: &Settings, args: ProcessArgs) -> Result<u8> {
    let mut filter = JobFilter::in_state(JobState::parse(&args.state));
    filter.name_pattern = args.job_name;
    if let Some(condition) = &args.filter {
        filter.field = Some(JobFilter::parse_field(condition)?);
    }

    let source = if !args.job_id.is_empty() {
        if args.replay || args.state != JobState::Finished.as_str() {
            warn!("--job-id given, ignoring --state and --replay");
        }
        JobSource::Explicit(args.job_id)
    } else if args.replay {
        JobSource::Replay {
            timestamp: args.replay_timestamp,
        }
    } else {
        JobSource::Live
    };

    let request = RunRequest {
        source,
        filter,
        save_snapshot: !args.no_save_raw,
        query_output: args.output.unwrap_or_else(|| settings.output.query_file.clone()),
        etl_output: args.etl_output.unwrap_or_else(|| settings.output.etl_file.clone()),
        report_output: Some(args.report.unwrap_or_else(|| settings.output.report_file.clone())),
    };

    let processor = JobProcessor::new(client_from(settings)?, JobClassifier::default())
        .with_workers(args.workers.or(Some(settings.batch.size)));
    let pipeline = Pipeline::new(processor, SnapshotStore::new(&settings.output.snapshot_dir));

    let summary = pipeline.run(&request).await?;
    info!(
        "Processed {} job(s): {} succeeded, {} failed ({} query, {} ETL)",
        summary.selected,
        summary.results.succeeded,
        summary.results.failed,
        summary.results.query.len(),
        summary.results.etl.len()
    );
    Ok(summary.exit_code as u8)
}

// === Replays ===

fn list_replays(settings: &Settings) -> u8 {
    let snapshots = SnapshotStore::new(&settings.output.snapshot_dir).list_snapshots();
    if snapshots.is_empty() {
        println!("No recorded job listings in {}", settings.output.snapshot_dir.display());
        return 0;
    }

    println!("{:<17} {:>6}  SOURCE", "TIMESTAMP", "JOBS");
    for snapshot in snapshots {
        println!(
            "{:<17} {:>6}  {}",
            snapshot.timestamp, snapshot.jobs_count, snapshot.source_address
        );
    }
    0
}

// === Launch ===

fn launcher_from(
    settings: &Settings,
    selection: &LaunchSelectionArgs,
    default_interval: u64,
) -> Result<Launcher> {
    let interval = Duration::from_secs(selection.interval.unwrap_or(default_interval));
    Ok(Launcher::new(client_from(settings)?, EtlMapping::builtin())
        .with_interval(interval)
        .with_dry_run(selection.dry_run))
}

fn selection_from(all: bool, keys: Option<&str>) -> Option<LaunchSelection> {
    match (all, keys) {
        (true, _) => Some(LaunchSelection::All),
        (false, Some(keys)) => Some(LaunchSelection::parse(keys)),
        (false, None) => None,
    }
}

async fn launch_query(settings: &Settings, args: LaunchQueryArgs) -> Result<u8> {
    let Some(selection) = selection_from(args.selection.all, args.job_id.as_deref()) else {
        error!("Specify --job-id or --all");
        return Ok(1);
    };

    let path = args.config_file.unwrap_or_else(|| settings.output.query_file.clone());
    let entries = load_entries::<QueryJobDescriptor>(&path)?;
    let jar_id = args.jar_id.unwrap_or_else(|| settings.launch.common_jar_id.clone());

    let launcher = launcher_from(settings, &args.selection, settings.launch.query_interval_secs)?;
    let report = launcher.launch_queries(&jar_id, &entries, &selection).await;
    Ok(report.exit_code() as u8)
}

async fn launch_etl(settings: &Settings, args: LaunchEtlArgs) -> Result<u8> {
    let Some(selection) = selection_from(args.selection.all, args.job_name.as_deref()) else {
        error!("Specify --job-name or --all");
        return Ok(1);
    };

    let path = args.config_file.unwrap_or_else(|| settings.output.etl_file.clone());
    let entries = load_entries::<EtlJobDescriptor>(&path)?;

    let launcher = launcher_from(settings, &args.selection, settings.launch.etl_interval_secs)?;
    let report = launcher.launch_etl(&entries, &selection).await;
    Ok(report.exit_code() as u8)
}

// === Stop ===

async fn stop(settings: &Settings, args: StopArgs) -> Result<u8> {
    if !args.all && args.job_id.is_empty() {
        error!("Specify --job-id or --all");
        return Ok(1);
    }

    let interval = Duration::from_secs(args.interval.unwrap_or(settings.launch.stop_interval_secs));
    let stopper = Stopper::new(client_from(settings)?)
        .with_interval(interval)
        .with_dry_run(args.dry_run);

    let targets = if args.all {
        stopper.running_jobs().await?
    } else {
        args.job_id.iter().map(|id| StopTarget::from_id(id)).collect()
    };

    let report = stopper.stop_jobs(&targets).await;
    Ok(report.exit_code() as u8)
}
