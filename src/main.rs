use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use visual_tap::app::{discover_configs, load_all};
use visual_tap::config::{self, PathSettings};
use visual_tap::{AppRunner, ArtifactStore, WebDriverProvider, run_all};

/// Visual Tap - vision-based UI tests for mobile apps
#[derive(Parser, Debug)]
#[command(
    name = "visual-tap",
    about = "Launch each configured app, tap its home icon and run image-matched steps",
    after_help = "ENVIRONMENT VARIABLES:\n\
        APPIUM_HOST              Appium server host\n\
        APPIUM_PORT              Appium server port\n\
        APPIUM_BASE_PATH         Base path of the WebDriver routes\n\
        DEVICE_NAME              Device or emulator identity\n\
        VISUAL_TAP_ROOT          Project root (configs/, apps/, artifacts/)\n\
        APP                      Run a single app by descriptor name\n\
        RUST_LOG                 Log filter (default: info)"
)]
struct Args {
    /// Project root holding configs/, apps/ and artifacts/
    #[arg(long, global = true, env = "VISUAL_TAP_ROOT")]
    root: Option<PathBuf>,

    /// Only run or check this app (descriptor file name without .json)
    #[arg(long, global = true, env = "APP")]
    app: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run apps against the device (default when no command is given)
    Run {
        /// Appium server host
        #[arg(long, env = "APPIUM_HOST")]
        host: Option<String>,

        /// Appium server port
        #[arg(long, env = "APPIUM_PORT")]
        port: Option<u16>,

        /// Device or emulator identity
        #[arg(long, env = "DEVICE_NAME")]
        device: Option<String>,

        /// Print the summary as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List discovered app descriptors
    List,

    /// Load descriptors and validate every step without a device
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let mut cfg = config::get().clone();
    if let Some(root) = &args.root {
        cfg.paths = PathSettings::under(root);
    }

    let app = args.app.as_deref();
    let command = args.command.unwrap_or(Commands::Run {
        host: None,
        port: None,
        device: None,
        json: false,
    });

    match command {
        Commands::Run {
            host,
            port,
            device,
            json,
        } => {
            if let Some(host) = host {
                cfg.server.host = host;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(device) = device {
                cfg.device.device_name = device;
            }
            run(&cfg, app, json).await
        }
        Commands::List => list(&cfg.paths),
        Commands::Check => check(&cfg.paths, app),
    }
}

async fn run(cfg: &config::Config, app: Option<&str>, json: bool) -> ExitCode {
    let apps = match load_all(&cfg.paths, app) {
        Ok(apps) => apps,
        Err(e) => {
            eprintln!("\nERROR: {}\n", e);
            return ExitCode::FAILURE;
        }
    };

    let provider = match WebDriverProvider::from_settings(&cfg.server) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("\nERROR: {}\n", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(endpoint = %provider.base_url(), device = %cfg.device.device_name, apps = apps.len(), "Starting");

    let artifacts = ArtifactStore::new(&cfg.paths.artifacts_dir);
    let runner = AppRunner::new(provider, cfg.device.clone(), artifacts);
    let summary = run_all(&runner, &apps).await;

    if let Err(e) = runner.artifacts().write_report(&summary) {
        tracing::warn!("Failed to write report: {}", e);
    }

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize summary: {}", e),
        }
    } else {
        println!("{}", summary.render());
        if let Ok(captures) = runner.artifacts().list_captures() {
            if !captures.is_empty() {
                println!("Screenshots: {} in {}", captures.len(), runner.artifacts().dir.display());
            }
        }
    }

    ExitCode::from(summary.exit_code())
}

fn list(paths: &PathSettings) -> ExitCode {
    match discover_configs(&paths.configs_dir) {
        Ok(files) => {
            for file in files {
                if let Some(stem) = file.file_stem() {
                    println!("{}", stem.to_string_lossy());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\nERROR: {}\n", e);
            ExitCode::FAILURE
        }
    }
}

fn check(paths: &PathSettings, app: Option<&str>) -> ExitCode {
    let apps = match load_all(paths, app) {
        Ok(apps) => apps,
        Err(e) => {
            eprintln!("\nERROR: {}\n", e);
            return ExitCode::FAILURE;
        }
    };

    let mut problems = 0;
    for app in &apps {
        let rejections = app.check_steps();
        if rejections.is_empty() {
            println!("{}  ok ({} steps, thr {})", app.name, app.steps.len(), app.threshold());
        } else {
            println!("{}  invalid", app.name);
            for rejection in &rejections {
                println!("   ↳ {}", rejection);
            }
            problems += rejections.len();
        }
    }

    if problems == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
