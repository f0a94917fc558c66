//! portman - iptables port manager
//!
//! Command-line front end for the rule engine in [`portman::core`].
//!
//! # Usage
//!
//! ```bash
//! portman open 3306 tcp                 # add 3306/tcp to /etc/iptables/rules.v4
//! portman open 8000 tcp/udp --apply     # ...and load it with iptables-restore
//! portman close 3306 tcp --dry-run      # show what would change
//! portman status 443 tcp                # tcp: open | closed
//! portman list --file ./rules.v4        # ports inside the PORTMAN block
//! ```
//!
//! # Safety
//!
//! - Every rewrite is preceded by a timestamped backup next to the file
//! - Rewrites are atomic (temp file + rename)
//! - `--apply` validates with `iptables-restore -t` before loading
//! - Modifying `/etc/...` or applying requires root

use clap::{ArgAction, Args, Parser, Subcommand};
use portman::audit::{self, EventType};
use portman::config::{self, AppConfig};
use portman::core::error::{Error, RestoreErrorPattern, Result};
use portman::core::ops::{self, Outcome};
use portman::core::{diff, restore};
use portman::{elevation, storage, validators};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, info};

shadow_rs::shadow!(build);

const LONG_VERSION: &str = shadow_rs::formatcp!(
    "{}\ncommit: {} ({})\nbuilt: {}",
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BRANCH,
    build::BUILD_TIME,
);

/// Unchanged lines shown around each change in a dry-run diff
const DIFF_CONTEXT_LINES: usize = 3;

#[derive(Parser)]
#[command(name = "portman", version, long_version = LONG_VERSION)]
#[command(
    about = "Open and close ports in a managed block of an iptables rules file",
    long_about = None
)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add accept rules for a port to the PORTMAN block
    Open {
        #[command(flatten)]
        target: PortArgs,
        #[command(flatten)]
        file: FileArg,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Remove accept rules for a port from the PORTMAN block
    Close {
        #[command(flatten)]
        target: PortArgs,
        #[command(flatten)]
        file: FileArg,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Show whether a port is open anywhere in the rules file
    Status {
        #[command(flatten)]
        target: PortArgs,
        #[command(flatten)]
        file: FileArg,
    },
    /// List ports opened inside the PORTMAN block
    List {
        #[command(flatten)]
        file: FileArg,
    },
}

#[derive(Args)]
struct PortArgs {
    /// Port number (1-65535)
    #[arg(allow_hyphen_values = true)]
    port: String,
    /// Protocol: tcp, udp, or tcp/udp
    proto: String,
}

#[derive(Args)]
struct FileArg {
    /// Path to the iptables-save rules file [default: /etc/iptables/rules.v4]
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
}

impl FileArg {
    fn resolve(self, config: &AppConfig) -> PathBuf {
        self.file.unwrap_or_else(|| config.rules_file.clone())
    }
}

#[derive(Args)]
struct WriteArgs {
    /// Do not write the file; print the pending change instead
    #[arg(long)]
    dry_run: bool,
    /// Validate and load the rewritten file with iptables-restore (Linux)
    #[arg(long)]
    apply: bool,
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Open,
    Close,
}

impl Change {
    fn run(self, content: &str, port: u16, proto_spec: &str) -> Result<Outcome> {
        match self {
            Change::Open => ops::open(content, u32::from(port), proto_spec),
            Change::Close => ops::close(content, u32::from(port), proto_spec),
        }
    }

    fn unchanged_message(self) -> &'static str {
        match self {
            Change::Open => "Rule already open.",
            Change::Close => "Rule already closed (or not managed by PORTMAN block).",
        }
    }

    fn done_message(self) -> &'static str {
        match self {
            Change::Open => "Rule opened.",
            Change::Close => "Rule closed.",
        }
    }

    fn event_type(self) -> EventType {
        match self {
            Change::Open => EventType::OpenPort,
            Change::Close => EventType::ClosePort,
        }
    }
}

/// Raw bytes of a rules file plus their text form
struct RulesFile {
    bytes: Vec<u8>,
    text: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Error::Restore { stderr, message, .. } = &e {
                let translation =
                    RestoreErrorPattern::match_error(stderr.as_deref().unwrap_or(message));
                eprintln!("{}", translation.user_message);
                for suggestion in &translation.suggestions {
                    eprintln!("  - {suggestion}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

async fn handle_cli(command: Commands) -> Result<()> {
    let config = config::load_config().await;

    match command {
        Commands::Open {
            target,
            file,
            write,
        } => change_rules(Change::Open, &target, &file.resolve(&config), &write, &config).await,
        Commands::Close {
            target,
            file,
            write,
        } => change_rules(Change::Close, &target, &file.resolve(&config), &write, &config).await,
        Commands::Status { target, file } => {
            let port = validators::parse_port(&target.port)?;
            let rules = read_rules(&file.resolve(&config)).await?;
            let status = ops::status(&rules.text, u32::from(port), &target.proto)?;
            for (proto, open) in status {
                println!("{proto}: {}", if open { "open" } else { "closed" });
            }
            Ok(())
        }
        Commands::List { file } => {
            let rules = read_rules(&file.resolve(&config)).await?;
            let items = ops::list(&rules.text)?;
            if items.is_empty() {
                println!("No open ports in PORTMAN block.");
            }
            for item in items {
                println!("{item}");
            }
            Ok(())
        }
    }
}

async fn change_rules(
    change: Change,
    target: &PortArgs,
    path: &Path,
    write: &WriteArgs,
    config: &AppConfig,
) -> Result<()> {
    elevation::check_privileges(path, write.apply)?;

    let port = validators::parse_port(&target.port)?;
    let protos = validators::parse_proto_spec(&target.proto)?;
    let original = read_rules(path).await?;

    let outcome = change.run(&original.text, port, &target.proto)?;
    if !outcome.changed {
        println!("{}", change.unchanged_message());
        return Ok(());
    }

    if write.dry_run {
        println!("Dry run: changes would be written.");
        if config.show_diff
            && let Some(diff) =
                diff::render_diff(&original.text, &outcome.content, DIFF_CONTEXT_LINES)
        {
            print!("{diff}");
        }
        return Ok(());
    }

    let backup = storage::write_backup(path, &original.bytes).await?;
    audit::record(config.audit_log, audit::backup_event(path, &backup)).await;

    let written = storage::write_atomic(path, outcome.content.as_bytes()).await;
    audit::record(
        config.audit_log,
        audit::change_event(
            change.event_type(),
            path,
            port,
            &protos,
            &original.bytes,
            outcome.content.as_bytes(),
            written.as_ref().err().map(ToString::to_string),
        ),
    )
    .await;
    written?;
    println!("{}", change.done_message());

    if write.apply {
        if let Err(e) = apply_rules_file(path, config).await {
            eprintln!(
                "Warning: {} was already rewritten; the previous version is at {}",
                path.display(),
                backup.display()
            );
            return Err(e);
        }
        println!("Applied with iptables-restore.");
    }

    Ok(())
}

/// Validates, then loads, the rules file. The file stays as written either way.
async fn apply_rules_file(path: &Path, config: &AppConfig) -> Result<()> {
    let verify = restore::test_rules(&config.restore_command, path).await;
    let verify_error = match &verify {
        Ok(result) if result.success => None,
        Ok(result) => Some(result.errors.join("\n")),
        Err(e) => Some(e.to_string()),
    };
    audit::record(
        config.audit_log,
        audit::restore_event(EventType::VerifyRules, path, verify_error.clone()),
    )
    .await;

    let verify = verify?;
    if !verify.success {
        let details = verify_error.unwrap_or_default();
        return Err(Error::Restore {
            message: format!("Apply aborted (validation failed): {details}"),
            stderr: Some(details),
            exit_code: None,
        });
    }
    info!("Validation passed, applying");

    let applied = restore::apply_rules(&config.restore_command, path).await;
    audit::record(
        config.audit_log,
        audit::restore_event(
            EventType::ApplyRules,
            path,
            applied.as_ref().err().map(ToString::to_string),
        ),
    )
    .await;

    applied.map_err(|e| match e {
        Error::Restore {
            message,
            stderr,
            exit_code,
        } => Error::Restore {
            message: format!("Apply failed: {message}"),
            stderr,
            exit_code,
        },
        other => other,
    })
}

async fn read_rules(path: &Path) -> Result<RulesFile> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("failed to read {}: {e}", path.display()),
        )
    })?;
    let text = String::from_utf8(bytes.clone()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8", path.display()),
        )
    })?;

    Ok(RulesFile { bytes, text })
}
