//! `memengine` — a single entry point that opens an interactive
//! read-eval loop against one agent (§6 CLI surface).

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use memengine_domain::config::Config;
use memengine_domain::error::EngineError;
use memengine_engine::{AgentEngine, CancelToken};
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_DATABASE_UNREACHABLE: i32 = 3;
const EXIT_INTERRUPT: i32 = 130;

/// Hierarchical memory engine for a long-running conversational agent.
#[derive(Debug, Parser)]
#[command(name = "memengine", version, about)]
struct Cli {
    /// Agent identity within the memory hierarchy (creates one if absent).
    #[arg(long)]
    agent: Option<String>,
    /// Chat/embedding model id override.
    #[arg(long)]
    model: Option<String>,
    /// Workspace root for the sandboxed tool set.
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// FIFO capacity override (recent turns kept resident before overflow).
    #[arg(long)]
    context: Option<usize>,
    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let mut config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    apply_cli_overrides(&mut config, &cli);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    runtime.block_on(async_main(config))
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(agent) = &cli.agent {
        config.agent.name = agent.clone();
    }
    if let Some(model) = &cli.model {
        config.agent.model_id = model.clone();
    }
    if let Some(workspace) = &cli.workspace {
        config.agent.workspace_root = workspace.clone();
    }
    if let Some(context) = cli.context {
        config.agent.fifo_capacity = context;
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone();
    }
}

/// Map a startup failure to the exit code the caller should see (§6):
/// configuration problems are 2, everything that implies the relational
/// store couldn't be reached is 3.
fn exit_code_for(err: &EngineError) -> i32 {
    match err {
        EngineError::Configuration(_) => EXIT_CONFIG_ERROR,
        EngineError::Storage(_) | EngineError::Pool(_) | EngineError::BackendUnavailable(_) => {
            EXIT_DATABASE_UNREACHABLE
        }
        _ => EXIT_CONFIG_ERROR,
    }
}

async fn async_main(config: Config) -> i32 {
    let mut engine = match memengine_engine::bootstrap(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to start memengine: {e}");
            return exit_code_for(&e);
        }
    };

    eprintln!(
        "memengine — agent '{}' ({})",
        engine.agent().name,
        engine.agent().model_id
    );
    eprintln!("Type your message, Ctrl+D to exit, Ctrl+C to cancel a turn in progress.");
    eprintln!();

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".memengine")
        .join("history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = match rustyline::DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("failed to start line editor: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    let _ = rl.load_history(&history_path);

    spawn_sigterm_handler();

    let mut exit_code = EXIT_OK;
    loop {
        let readline = rl.readline("you> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();
                if trimmed == "/exit" || trimmed == "/quit" {
                    break;
                }
                run_one_turn(&mut engine, trimmed).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                exit_code = EXIT_INTERRUPT;
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    exit_code
}

/// Send one line to the step loop, racing a Ctrl+C listener against it so
/// SIGINT mid-turn cancels the pending tool cooperatively (§6) instead of
/// killing the process outright.
async fn run_one_turn(engine: &mut AgentEngine, message: &str) {
    let cancel = CancelToken::new();
    let cancel_for_signal = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_for_signal.cancel();
        }
    });

    match engine.run_turn(message, &cancel).await {
        Ok(text) => {
            println!("{text}");
            println!();
            std::io::stdout().flush().ok();
        }
        Err(e) => eprintln!("error: {e}"),
    }
    ctrl_c.abort();
}

/// SIGTERM initiates a clean shutdown (§6): the process exits, releasing
/// the connection pool through the normal `Drop` of everything on the
/// stack rather than tearing down mid-turn.
fn spawn_sigterm_handler() {
    tokio::spawn(async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            if let Ok(mut term) = signal(SignalKind::terminate()) {
                term.recv().await;
                tracing::info!("SIGTERM received, shutting down");
                std::process::exit(EXIT_OK);
            }
        }
    });
}
