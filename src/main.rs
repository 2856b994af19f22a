use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::Directive;

use cwtail_aws::{ClientOptions, CloudWatchLogsClient, list_log_groups};
use cwtail_logs::{RecordPipeline, SubstringFilter, TailOptions, TailSession};
use cwtail_types::{LogFormat, Truncation};

mod config;

use config::{FileConfig, Overrides, Settings};

/// cwtail - Watch CloudWatch Logs from the terminal
#[derive(Parser, Debug)]
#[command(name = "cwtail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// CloudWatch Logs commands
    #[command(subcommand)]
    Logs(LogsCommand),
}

#[derive(Subcommand, Debug)]
enum LogsCommand {
    /// Follow the most recently active stream of a log group
    Watch(WatchArgs),

    /// List log groups
    List(CommonArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// AWS region (defaults to the config file, then the AWS environment)
    #[arg(long)]
    region: Option<String>,

    /// Config file (defaults to <config dir>/cwtail/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Log group name
    #[arg(value_name = "LOG_GROUP")]
    group: String,

    /// API request interval in seconds [default: 3]
    #[arg(long)]
    interval: Option<u64>,

    /// Message format: raw, container (alias: ecs, docker)
    #[arg(long)]
    format: Option<LogFormat>,

    /// Output the whole log message (not implemented yet)
    #[arg(long)]
    no_trunc: bool,

    /// Only show messages containing this text
    #[arg(long)]
    filter: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into())
                .add_directive("cwtail_logs=info".parse::<Directive>()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Logs(LogsCommand::Watch(args)) => watch(args).await,
        Command::Logs(LogsCommand::List(args)) => list(args).await,
    }
}

async fn client(settings: &Settings) -> CloudWatchLogsClient {
    CloudWatchLogsClient::new(&ClientOptions {
        region: settings.region.clone(),
        operation_timeout: settings.request_timeout,
    })
    .await
}

async fn watch(args: WatchArgs) -> Result<()> {
    let settings = FileConfig::load(args.common.config.as_deref())?.merge(Overrides {
        region: args.common.region,
        interval: args.interval,
        format: args.format,
        filter: args.filter,
    });

    let pipeline = RecordPipeline::new(
        settings.format,
        SubstringFilter::new(settings.filter.as_str()),
        Truncation::from_no_trunc(args.no_trunc),
    );
    let options = TailOptions::new(args.group.as_str())
        .with_interval(settings.interval)
        .with_pipeline(pipeline);
    let session = TailSession::new(Arc::new(client(&settings).await), options);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let reason = session.run(cancel, &mut out).await;
    if reason.is_cancelled() {
        return Ok(());
    }

    Err(anyhow::Error::new(reason)
        .context(format!("Failed to watch log group '{}'", args.group)))
}

async fn list(args: CommonArgs) -> Result<()> {
    let settings = FileConfig::load(args.config.as_deref())?.merge(Overrides {
        region: args.region,
        ..Default::default()
    });

    let groups = list_log_groups(&client(&settings).await)
        .await
        .context("Failed to list log groups")?;

    let mut out = std::io::stdout().lock();
    for group in groups {
        writeln!(out, "{group}")?;
    }
    Ok(())
}
