//! Browse and transfer files in a remote document library.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret as _;
use tokio::select;
use tracing::{debug, error};

mod app_config;
mod local;
mod trc;

use spfs::cache::policy::PolicyError;
use spfs::fs::command::{Command, CommandOutput};
use spfs::fs::{FsError, Kind, PutRequest, RemoteFs, SnapshotCache};

use crate::app_config::Config;
use crate::local::LocalBackend;
use crate::trc::Trc;

#[derive(Parser)]
#[command(
    version,
    about = "Browse and transfer files in a remote document library."
)]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to an spfs config TOML."
    )]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List a folder.
    Dir {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Download a file.
    Get {
        path: String,
        /// Write the content here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Delete the remote file once it has been read.
        #[arg(long)]
        delete: bool,
    },

    /// Upload a local file.
    Put {
        source: PathBuf,
        /// Remote destination. Defaults to the source's file name.
        #[arg(default_value = "")]
        destination: String,
        /// Write to a fresh numbered name instead of overwriting.
        #[arg(short, long)]
        unique: bool,
    },

    /// Delete a file.
    Delete { path: String },

    /// Create a folder.
    Mkdir { path: String },

    /// Delete a folder.
    Rmdir { path: String },

    /// Move a file, overwriting the destination.
    Rename { from: String, to: String },

    /// Show the attributes of a file or folder.
    Attr {
        #[arg(default_value = ".")]
        path: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("Invalid cache spec: {0}")]
    Policy(#[from] PolicyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted")]
    Interrupted,
}

impl CliCommand {
    async fn into_command(self) -> Result<(Command, Option<PathBuf>), std::io::Error> {
        let command = match self {
            Self::Dir { path } => Command::Dir { path },
            Self::Get {
                path,
                output,
                delete,
            } => return Ok((Command::Get { path, delete }, output)),
            Self::Put {
                source,
                destination,
                unique,
            } => {
                let content = tokio::fs::read(&source).await?;
                let source_name = source
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Command::Put(PutRequest {
                    source: source_name,
                    destination,
                    content: content.into(),
                    unique,
                })
            }
            Self::Delete { path } => Command::Delete { path },
            Self::Mkdir { path } => Command::Mkdir { path },
            Self::Rmdir { path } => Command::Rmdir { path },
            Self::Rename { from, to } => Command::Rename { from, to },
            Self::Attr { path } => Command::Attr { path },
        };
        Ok((command, None))
    }
}

fn print_output(output: CommandOutput, target: Option<PathBuf>) -> Result<(), std::io::Error> {
    let mut stdout = std::io::stdout().lock();
    match output {
        CommandOutput::Done => {}
        CommandOutput::Listing(entries) => {
            for entry in entries {
                match entry.attr.byte_len() {
                    Some(len) => writeln!(stdout, "{len:>12}  {}", entry.name)?,
                    None => writeln!(stdout, "{:>12}  {}/", "-", entry.name)?,
                }
            }
        }
        CommandOutput::Content(content) => match target {
            Some(path) => std::fs::write(path, &content)?,
            None => stdout.write_all(&content)?,
        },
        CommandOutput::Attributes(attr) => {
            let kind = match attr.kind {
                Kind::File => "file",
                Kind::Directory => "directory",
            };
            let modified = attr
                .modified
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());
            let size = attr
                .byte_len()
                .map_or_else(|| "-".to_owned(), |len| len.to_string());
            writeln!(stdout, "kind: {kind}\nsize: {size}\nmodified: {modified}")?;
        }
        CommandOutput::Written(path) => writeln!(stdout, "{path}")?,
    }
    Ok(())
}

async fn run(config: Config, command: CliCommand) -> Result<(), RunError> {
    debug!(
        service_url = %config.account.service_url,
        username = %config.account.username,
        domain = ?config.account.domain,
        has_password = config
            .account
            .password
            .as_ref()
            .is_some_and(|p| !p.expose_secret().is_empty()),
        "Connecting to document library."
    );

    let cache = Arc::new(SnapshotCache::from_spec(config.cache.spec.as_deref())?);
    let mut fs = RemoteFs::new(
        LocalBackend::new(&config.root),
        config.account.identity(),
        cache,
    );
    if let Some(alias) = &config.account.host_alias {
        fs = fs.with_host_alias(alias.clone());
    }

    let (command, target) = command.into_command().await?;
    debug!(command = %command.name(), "Dispatching command.");
    let output = select! {
        res = command.dispatch(&fs) => res?,
        _ = tokio::signal::ctrl_c() => return Err(RunError::Interrupted),
    };
    print_output(output, target)?;
    Ok(())
}

/// Main entry point for the application.
fn main() {
    let args = Args::parse();

    // Errors use eprintln since tracing isn't initialized yet.
    let config = Config::load_or_default(args.config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    Trc::default().init().unwrap_or_else(|e| {
        eprintln!(
            "Failed to initialize logging. Without logging, we can't provide any useful error \
             messages, so we have to exit: {e}"
        );
        std::process::exit(1);
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!("Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        });

    if let Err(e) = runtime.block_on(run(config, args.command)) {
        error!("{e}");
        std::process::exit(1);
    }
}
