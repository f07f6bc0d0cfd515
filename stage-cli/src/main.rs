//! Stage CLI - drive a remote sandbox session from the terminal

mod commands;
mod onboard;
mod ui;

use clap::{Parser, Subcommand};
use commands::Context;
use stage_client::PushRequest;
use stage_core::remote_path;
use stage_core::{ConfigOverride, OutputMode, SessionId, TransportConfig, TransportKind};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log filter variable, e.g. `STAGE_LOG=debug`.
const LOG_ENV: &str = "STAGE_LOG";

#[derive(Parser)]
#[command(name = "stage")]
#[command(about = "Write, read and render files in a Stage sandbox session", long_about = None)]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Minimal output (ids, raw content)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Backend URL (overrides every environment variable)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Admin key for a self-hosted backend (overrides CONVEX_SELF_HOSTED_ADMIN_KEY)
    #[arg(long, global = true)]
    admin_key: Option<String>,

    /// Wire strategy: rpc or direct
    #[arg(long, global = true, env = "STAGE_TRANSPORT", default_value = "rpc")]
    transport: TransportKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new session
    New,

    /// Write a local file (or stdin) to a remote path
    Write {
        /// Remote path (e.g. /app/App.tsx)
        remote: String,

        /// Local file; `-` or omitted reads piped stdin
        local: Option<String>,

        #[arg(short, long)]
        session: String,
    },

    /// Print a remote file
    Read {
        remote: String,

        #[arg(short, long)]
        session: String,
    },

    /// Run a shell command in the session (direct transport only)
    Exec {
        command: String,

        #[arg(short, long)]
        session: String,
    },

    /// Render an entry file (default /app/App.tsx)
    Render {
        entry: Option<String>,

        #[arg(short, long)]
        session: String,
    },

    /// List remote files under a directory (default /app)
    Ls {
        dir: Option<String>,

        #[arg(short, long)]
        session: String,
    },

    /// Upload a local file or directory, then render
    Push {
        /// Local file or directory
        local: PathBuf,

        /// Remote directory (default /app)
        remote_dir: Option<String>,

        #[arg(short, long)]
        session: String,

        /// Entry to render instead of <remote-dir>/App.tsx
        #[arg(short, long)]
        entry: Option<String>,

        /// Upload without rendering
        #[arg(long)]
        no_render: bool,
    },

    /// Show render state and files for a session
    Status {
        #[arg(short, long)]
        session: String,
    },

    /// Save a snapshot of the session's files
    Snapshot {
        /// Optional label
        name: Option<String>,

        #[arg(short, long)]
        session: String,
    },

    /// List snapshots of a session
    Snapshots {
        #[arg(short, long)]
        session: String,
    },

    /// List revisions of a remote file
    History {
        remote: String,

        #[arg(short, long)]
        session: String,
    },

    /// Show the resolved backend configuration
    Config,

    /// Add stage instructions to CLAUDE.md or AGENTS.md
    Onboard,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let mode = OutputMode::from_flags(cli.json, cli.quiet);

    match run(cli, mode) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if mode.is_json() {
                match serde_json::to_string_pretty(&e.envelope()) {
                    Ok(body) => eprintln!("{}", body),
                    Err(_) => ui::error(&e),
                }
            } else {
                ui::error(&e);
            }
            std::process::exit(e.exit_code());
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Dispatch one command. `Ok` carries the process exit code.
fn run(cli: Cli, mode: OutputMode) -> stage_core::Result<i32> {
    let overrides = ConfigOverride {
        url: cli.url,
        admin_key: cli.admin_key,
    };
    let config = TransportConfig::resolve(cli.transport, &overrides);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    // Commands that never touch the network.
    match &cli.command {
        Commands::Config => {
            commands::cmd_config(&config, mode, &mut out)?;
            return Ok(0);
        }
        Commands::Onboard => {
            let cwd = std::env::current_dir()?;
            onboard::cmd_onboard(&cwd, mode, &mut out)?;
            return Ok(0);
        }
        _ => {}
    }

    // Local input is checked before any connection is made.
    let write_content = match &cli.command {
        Commands::Write { local, .. } => Some(commands::read_write_content(
            local.as_deref(),
            std::io::stdin().is_terminal(),
            std::io::stdin().lock(),
        )?),
        _ => None,
    };

    let backend = stage_client::connect(&config)?;
    let ctx = Context {
        config: &config,
        backend: backend.as_ref(),
        mode,
        ui_base_url: config.ui_base_url(),
    };

    match cli.command {
        Commands::New => commands::cmd_new(&ctx, &mut out)?,
        Commands::Write {
            remote, session, ..
        } => {
            let content = write_content.unwrap_or_default();
            commands::cmd_write(&ctx, &SessionId::new(session)?, &remote, &content, &mut out)?
        }
        Commands::Read { remote, session } => {
            commands::cmd_read(&ctx, &SessionId::new(session)?, &remote, &mut out)?
        }
        Commands::Exec { command, session } => {
            return commands::cmd_exec(&ctx, &SessionId::new(session)?, &command, &mut out);
        }
        Commands::Render { entry, session } => {
            commands::cmd_render(&ctx, &SessionId::new(session)?, entry.as_deref(), &mut out)?
        }
        Commands::Ls { dir, session } => {
            commands::cmd_ls(&ctx, &SessionId::new(session)?, dir.as_deref(), &mut out)?
        }
        Commands::Push {
            local,
            remote_dir,
            session,
            entry,
            no_render,
        } => {
            let session = SessionId::new(session)?;
            let mut request = PushRequest::new(&local, remote_dir.as_deref());
            request.entry = entry.as_deref().map(remote_path::normalize);
            request.render = !no_render;
            commands::cmd_push(&ctx, &session, &request, &mut out)?
        }
        Commands::Status { session } => {
            commands::cmd_status(&ctx, &SessionId::new(session)?, ui::now_ms(), &mut out)?
        }
        Commands::Snapshot { name, session } => {
            commands::cmd_snapshot(&ctx, &SessionId::new(session)?, name.as_deref(), &mut out)?
        }
        Commands::Snapshots { session } => {
            commands::cmd_snapshots(&ctx, &SessionId::new(session)?, ui::now_ms(), &mut out)?
        }
        Commands::History { remote, session } => commands::cmd_history(
            &ctx,
            &SessionId::new(session)?,
            &remote,
            ui::now_ms(),
            &mut out,
        )?,
        Commands::Config | Commands::Onboard => {}
    }

    Ok(0)
}
