//! Otto binary: serve the API or run a single cycle from the CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use otto::app::AppContext;
use otto::automation::{AutomationLoop, CycleOutcome};
use otto::config::Config;
use otto::task::TaskDraft;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "otto")]
#[command(about = "Task automation glue service", long_about = None)]
#[command(version)]
struct Cli {
    /// Project directory to operate on
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket server
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = otto::config::DEFAULT_PORT)]
        port: u16,

        /// Force simulation mode even if an API key is configured
        #[arg(long)]
        simulate: bool,
    },
    /// Run a single automation cycle on an ad-hoc task
    Run {
        /// Task title
        #[arg(long)]
        title: String,

        /// Task description
        #[arg(long)]
        description: String,

        /// Force simulation mode even if an API key is configured
        #[arg(long)]
        simulate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let project = otto::context::resolve_project_dir(&cli.project);
    let mut config = Config::from_env(project);
    let _guard = init_logging(&config, cli.verbose)?;

    if which::which("git").is_err() {
        tracing::warn!("git not found on PATH, commit steps will fail");
    }
    if let Some(endpoint) = &config.task_endpoint {
        tracing::info!("External task endpoint configured: {}", endpoint);
    }

    match cli.command {
        Commands::Serve { port, simulate } => {
            config = config.with_port(port);
            if simulate {
                config = config.with_simulation();
            }
            config.validate()?;
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            title,
            description,
            simulate,
        } => {
            if simulate {
                config = config.with_simulation();
            }
            config.validate()?;
            run_once(config, title, description).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr;
    let ctx = AppContext::new(config);
    let router = otto::server::router(Arc::clone(&ctx));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    println!("{} http://{}", "Otto listening on".green().bold(), addr);
    println!("Start the loop with POST /api/automation/start");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&ctx)))
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal(ctx: Arc<AppContext>) {
    let _ = tokio::signal::ctrl_c().await;
    println!("\n{}", "Shutting down".yellow());
    ctx.stop_automation().await;
}

async fn run_once(
    config: Config,
    title: String,
    description: String,
) -> anyhow::Result<ExitCode> {
    let ctx = AppContext::new(config);
    let task = ctx.store.write().await.create(TaskDraft {
        title,
        description,
        ..TaskDraft::default()
    });
    println!("{} {}", "Running task:".cyan(), task.title);

    let steps = ctx.build_steps()?;
    let automation = AutomationLoop::new(Arc::clone(&ctx), steps);
    match automation.run_cycle().await? {
        CycleOutcome::Success {
            task,
            iterations,
            review,
            duration,
        } => {
            println!(
                "{} {} in {:.1}s ({} test run(s))",
                "Completed".green().bold(),
                task.title,
                duration.as_secs_f64(),
                iterations
            );
            println!("{}", review.summary);
            Ok(ExitCode::SUCCESS)
        }
        CycleOutcome::NoTasks => {
            println!("No pending tasks");
            Ok(ExitCode::SUCCESS)
        }
        CycleOutcome::Error { message, .. } => {
            // Returning (rather than exiting) lets the log writer flush.
            eprintln!("{} {}", "Cycle failed:".red().bold(), message);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_logging(config: &Config, verbose: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("failed to create {}", config.log_dir.display()))?;
    let appender = tracing_appender::rolling::never(&config.log_dir, "otto.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let default = if verbose {
        "otto=debug,info"
    } else {
        "otto=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(file_writer),
        )
        .init();
    Ok(guard)
}
