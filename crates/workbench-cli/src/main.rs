//! Workbench CLI
//!
//! Runs the configurator service and the bundled command-line tools.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use workbench_app::{create_router, App, AppState, Config};
use workbench_tools::{Calculation, Catalog, MaterialsRenderer, ToolError};

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Workbench - woodworking project configurator
///
/// Serves the configurator API, or runs one of the small calculators and
/// the materials lookup.
#[derive(Parser, Debug)]
#[command(name = "workbench")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configurator HTTP API and event stream
    Serve(ServeArgs),

    #[command(flatten)]
    Tool(ToolCommand),
}

/// Offline tools that print one result and exit.
#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// Two-operand calculator: `calc <num1> <add|sub|mul|div|exp> <num2>`
    Calc {
        #[arg(allow_hyphen_values = true, value_name = "ARG")]
        args: Vec<String>,
    },

    /// Long-form calculator: `compute <add|subtract|multiply|divide|exponent> <num1> <num2>`
    Compute {
        #[arg(allow_hyphen_values = true, value_name = "ARG")]
        args: Vec<String>,
    },

    /// Adds two numbers: `add <num1> <num2>`
    Add {
        #[arg(allow_hyphen_values = true, value_name = "ARG")]
        args: Vec<String>,
    },

    /// Lists materials and tools for a project: `materials <shelf|shed|fence>`
    Materials {
        #[arg(value_name = "PROJECT")]
        project: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Path to configuration file (default: workbench.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Generation API key
    #[arg(long, env = "WORKBENCH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Token used to sign in instead of an anonymous session
    #[arg(long, env = "WORKBENCH_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Keep projects in memory instead of the configured store directory
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Tool output goes to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => match serve(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::from(1)
            }
        },
        Command::Tool(tool) => {
            let (output, code) = finish(run_tool(&tool));
            println!("{output}");
            ExitCode::from(code)
        }
    }
}

/// Maps a tool result to the text to print and the process exit code.
fn finish(result: Result<String, ToolError>) -> (String, u8) {
    match result {
        Ok(output) => (output, 0),
        Err(e) => {
            tracing::debug!(error = ?e, "Tool failed");
            (e.to_string(), 1)
        }
    }
}

/// Runs one of the offline tools and returns the text to print.
fn run_tool(command: &ToolCommand) -> Result<String, ToolError> {
    match command {
        ToolCommand::Calc { args } => Calculation::parse_calc(args.as_slice())?.render_calc(),
        ToolCommand::Compute { args } => {
            Calculation::parse_compute(args.as_slice())?.render_compute()
        }
        ToolCommand::Add { args } => Calculation::parse_sum(args.as_slice())?.render_sum(),
        ToolCommand::Materials { project } => {
            let entry = Catalog::builtin().lookup(project.as_deref().unwrap_or_default())?;
            Ok(MaterialsRenderer::new(entry).render())
        }
    }
}

/// Runs the configurator service until Ctrl+C.
async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    tracing::info!("Workbench starting");
    tracing::debug!(config = ?args.config, "Config file");

    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides
    if let Some(api_key) = args.api_key {
        config.generation.api_key = api_key;
    }
    if let Some(token) = args.auth_token {
        config.initial_auth_token = Some(token);
    }
    if args.in_memory {
        config.store_dir = None;
    }

    // Re-validate after overrides
    config.validate()?;

    if config.generation.api_key.is_empty() {
        tracing::warn!("No generation API key configured; materials and instructions will fail");
    }
    print_config(&config);

    let app = Arc::new(App::from_config(&config)?);
    let view = app.start().await;
    tracing::info!(login = %view.login_label, page = %view.visible, "App started");

    let state = AppState {
        config,
        app: Arc::clone(&app),
    };
    let router = create_router(state);

    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Event stream on ws://{addr}/ws");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&app)))
        .await?;

    println!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C and cancels in-flight generation requests.
async fn shutdown_signal(app: Arc<App>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    println!();
    println!("Shutting down...");
    app.shutdown();
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  App id: {}", config.app_id);
    match &config.store_dir {
        Some(dir) => println!("  Store: {dir}"),
        None => println!("  Store: in memory"),
    }
    println!("  Model: {}", config.generation.model);
    println!("  Max attempts: {}", config.generation.max_attempts);
    println!(
        "  Attempt timeout: {}s",
        config.generation.attempt_timeout_secs
    );
    println!(
        "  Sign-in: {}",
        if config.initial_auth_token.is_some() {
            "token"
        } else {
            "anonymous"
        }
    );
}
