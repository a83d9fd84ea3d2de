use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};
use privado::access::KeyFileAccess;
use privado::commands::config_cmd::ConfigOptions;
use privado::commands::scan::{ScanContext, ScanOptions};
use privado::commands::{execute_config, execute_scan};
use privado::config::{AppConfig, Config};
use privado::docker::{DockerCli, InterruptHandle, LaunchEngine};
use privado::error::AppError;
use privado::prompt::StdinPrompt;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Pre-flight prompts block one worker while the signal listeners need another.
#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.is_failure() {
                eprintln!("Error: {}", err);
            } else {
                println!("{}", err);
            }
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("PRIVADO_LOG").unwrap_or_else(|_| {
        if verbose { EnvFilter::new("privado=debug") } else { EnvFilter::new("privado=warn") }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Scan(args) => {
            let interrupt = InterruptHandle::new();
            interrupt.listen_for_signals();

            let config = Config::load()?;
            let app = AppConfig::resolve(&config)?;
            let access = KeyFileAccess::new(app.user_key_path.clone());
            let engine = LaunchEngine::new(Arc::new(DockerCli::default()));
            let options = ScanOptions {
                repository: args.repository,
                external_rules: args.config,
                ignore_default_rules: args.ignore_default_rules,
                skip_dependency_download: args.skip_dependency_download,
                disable_deduplication: args.disable_deduplication,
                overwrite: args.overwrite,
                debug: args.debug,
            };
            let prompt = StdinPrompt::new(interrupt.clone());
            let ctx = ScanContext { app: &app, access: &access, prompt: &prompt, engine: &engine, interrupt };
            execute_scan(options, ctx).await?;
        }
        Commands::Config(args) => {
            let options = ConfigOptions {
                show_path: args.path,
                edit: args.edit,
                sync_to_cloud: args.sync_to_cloud,
                metrics_enabled: args.metrics,
            };
            execute_config(options)?;
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "privado",
    version,
    about = "Scan a codebase in a container to discover data flows and privacy issues."
)]
struct Cli {
    /// Print debug logs from the orchestrator.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a codebase or repository to identify privacy issues and generate compliance reports.
    #[command(visible_alias = "sc")]
    Scan(ScanArgs),
    /// Manage privado configuration.
    #[command(visible_alias = "cfg")]
    Config(ConfigArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Repository to scan.
    #[arg(value_name = "REPOSITORY")]
    repository: PathBuf,

    /// Config (with rules) directory merged with the default rules.
    #[arg(short = 'c', long = "config", value_name = "DIR")]
    config: Option<PathBuf>,

    /// Ignore the default rules and only use the rules passed with --config.
    #[arg(short = 'i', long = "ignore-default-rules", action = ArgAction::SetTrue)]
    ignore_default_rules: bool,

    /// Skip downloading locally unavailable dependencies. Results may be incomplete.
    #[arg(long = "skip-dependency-download", action = ArgAction::SetTrue)]
    skip_dependency_download: bool,

    /// Keep duplicate and subset dataflows in the results.
    #[arg(long = "disable-deduplication", action = ArgAction::SetTrue)]
    disable_deduplication: bool,

    /// Overwrite existing results without asking.
    #[arg(long = "overwrite", action = ArgAction::SetTrue)]
    overwrite: bool,

    /// Run the scanning engine in debug mode.
    #[arg(long = "debug", action = ArgAction::SetTrue)]
    debug: bool,
}

#[derive(Args)]
struct ConfigArgs {
    /// Show the configuration file path.
    #[arg(long = "path", action = ArgAction::SetTrue)]
    path: bool,

    /// Open the configuration file in $EDITOR.
    #[arg(long = "edit", action = ArgAction::SetTrue)]
    edit: bool,

    /// Enable or disable syncing results to Privado Cloud.
    #[arg(long = "sync-to-cloud", value_name = "BOOL")]
    sync_to_cloud: Option<bool>,

    /// Enable or disable metrics collection.
    #[arg(long = "metrics", value_name = "BOOL")]
    metrics: Option<bool>,
}
