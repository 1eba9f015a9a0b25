use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wormsave::common::config::{apply_overrides, load_config, log_path};
use wormsave::common::config_commands::{run_config_path, run_config_reset, run_config_show};
use wormsave::common::ConfigOverrides;
use wormsave::session::{SessionContext, SessionController};
use wormsave::transfer::SpoolClient;
use wormsave::ui::{run_headless, SessionUI};

#[derive(Parser)]
#[command(name = "wormsave")]
#[command(about = "Receive a file, directory or message from a one-time transfer code")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive one transfer
    Receive {
        /// One-time transfer code
        code: Option<String>,

        /// Directory to save into
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Replace an existing file of the same name
        #[arg(long)]
        overwrite: bool,

        /// Command used to open a saved file; `%s` is replaced by its path
        #[arg(long)]
        open_cmd: Option<String>,

        /// Open the saved file without asking
        #[arg(long)]
        no_ask_open: bool,

        /// Plain terminal output instead of the full-screen UI
        #[arg(long)]
        no_tui: bool,
    },

    /// Inspect or reset the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the config file, or the defaults when there is none
    Show,
    /// Rewrite the config file with defaults
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

struct ReceiveArgs {
    code: Option<String>,
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Receive {
            code,
            save_dir,
            overwrite,
            open_cmd,
            no_ask_open,
            no_tui,
        } => {
            let no_tui = no_tui || std::env::var_os("NO_TUI").is_some();
            let args = ReceiveArgs {
                code,
                overrides: ConfigOverrides {
                    save_dir,
                    overwrite: overwrite.then_some(true),
                    open_command: open_cmd,
                    no_ask_open: no_ask_open.then_some(true),
                    no_tui: no_tui.then_some(true),
                },
            };
            receive(args).await
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Path => run_config_path()?,
                ConfigAction::Show => run_config_show()?,
                ConfigAction::Reset { yes } => {
                    run_config_reset(yes)?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn receive(args: ReceiveArgs) -> Result<ExitCode> {
    let config = apply_overrides(load_config()?, &args.overrides);
    setup_logging(config.tui.enabled)?;

    let context = SessionContext::from_config(args.code.unwrap_or_default(), &config);
    tracing::info!(
        save_dir = %context.options.save_dir.display(),
        spool = %config.spool.dir.display(),
        tui = config.tui.enabled,
        "starting receive"
    );

    let client = Arc::new(SpoolClient::new(config.spool.dir.clone()));
    let (controller, events) = SessionController::new(context, client);

    let outcome = if config.tui.enabled {
        SessionUI::new(controller, events)
            .run()
            .await
            .context("Terminal UI failed")?
    } else {
        run_headless(controller, events).await
    };

    tracing::info!(success = outcome.is_success(), "session finished");
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Logs go to a file while the alternate screen owns the terminal,
/// otherwise to stderr. `RUST_LOG` overrides the default level.
fn setup_logging(tui: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if tui {
        let path = log_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }

    Ok(())
}
