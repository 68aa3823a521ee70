//! snap - command-line front end for snapstore
//!
//! Each subcommand opens the store and runs one store operation.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use snapstore::storage::{
    CommitDiff, CommitId, FileStatus, InitOutcome, StorageError, Store, StoreConfig, DEFAULT_STORE_DIR,
};

#[derive(Parser, Debug)]
#[command(name = "snap", about = "A content-addressable snapshot store", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the store directory
    #[arg(long, global = true, env = "SNAP_STORE", default_value = DEFAULT_STORE_DIR)]
    store: PathBuf,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all logging
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store (safe to run again)
    Init,
    /// Stage files for the next commit
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Record the staged files as a commit
    Commit { message: String },
    /// Show commit history, newest first
    Log {
        /// Show at most this many commits
        #[arg(short = 'n', long = "max-count")]
        max_count: Option<usize>,
    },
    /// Show how a commit changed each of its files
    Show { commit: String },
    /// Show HEAD and the staged files
    Status,
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!cli.no_color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();

    if std::env::var_os("NO_COLOR").is_some() {
        cli.no_color = true;
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(&cli);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, StorageError> {
    let open = || Store::open_with_config(StoreConfig::new(&cli.store));

    match cli.command {
        Command::Init => init(&cli.store),
        Command::Add { files } => add(&open()?, &files),
        Command::Commit { message } => commit(&open()?, &message),
        Command::Log { max_count } => log(&open()?, max_count),
        Command::Show { commit } => show(&open()?, &commit),
        Command::Status => {
            print!("{}", open()?.status()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init(root: &Path) -> Result<ExitCode, StorageError> {
    let (store, outcome) = Store::init(root)?;
    match outcome {
        InitOutcome::Created => println!("Initialized empty store in {}", store.root().display()),
        InitOutcome::AlreadyInitialized => {
            println!("Store already initialized in {}", store.root().display())
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// stage every file; one unreadable file doesn't stop the others
fn add(store: &Store, files: &[PathBuf]) -> Result<ExitCode, StorageError> {
    let mut failed = false;

    for file in files {
        match store.add_file(file) {
            Ok(id) => println!("{} {}", id.object_id().short().yellow(), file.display()),
            Err(e) if e.is_structural() => return Err(e),
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                failed = true;
            }
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn commit(store: &Store, message: &str) -> Result<ExitCode, StorageError> {
    match store.commit(message) {
        Ok(id) => {
            println!("Committed {}", id.to_string().yellow());
            Ok(ExitCode::SUCCESS)
        }
        Err(StorageError::EmptyStaging) => {
            println!("Nothing to commit.");
            Ok(ExitCode::FAILURE)
        }
        Err(e) if e.is_retriable() => {
            eprintln!("{} {}", "error:".red().bold(), e);
            eprintln!("Staged files were kept; run the commit again.");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e),
    }
}

fn log(store: &Store, max_count: Option<usize>) -> Result<ExitCode, StorageError> {
    let history = store.history()?.take(max_count.unwrap_or(usize::MAX));

    for entry in history {
        let (id, commit) = entry?;
        println!("{} {}", "commit".yellow(), id.to_string().yellow());
        println!("Date: {}", commit.timestamp_iso());
        println!();
        for line in commit.message.lines() {
            println!("    {}", line);
        }
        println!();
    }

    Ok(ExitCode::SUCCESS)
}

fn show(store: &Store, commit: &str) -> Result<ExitCode, StorageError> {
    let id = CommitId::from_hex(commit)?;

    match store.show(&id) {
        Ok(diff) => {
            print_commit_diff(&diff);
            Ok(ExitCode::SUCCESS)
        }
        Err(StorageError::CommitNotFound(id)) => {
            println!("Commit not found: {}", id);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e),
    }
}

fn print_commit_diff(diff: &CommitDiff) {
    println!("{} {}", "commit".yellow(), diff.id.to_string().yellow());
    println!("Date: {}", diff.commit.timestamp_iso());
    println!();
    println!("    {}", diff.commit.summary());

    for file in &diff.files {
        println!();
        println!("{}", format!("File: {}", file.path()).bold());

        match &file.status {
            FileStatus::Changed(segments) => {
                let stats = file.stats();
                println!(
                    "{} {}",
                    format!("+{}", stats.added).green(),
                    format!("-{}", stats.removed).red()
                );
                for segment in segments {
                    let text = if segment.is_added() {
                        segment.value.green()
                    } else if segment.is_removed() {
                        segment.value.red()
                    } else {
                        segment.value.normal()
                    };
                    print!("{}", text);
                }
                if !segments.last().is_some_and(|s| s.value.ends_with('\n')) {
                    println!();
                }
            }
            FileStatus::NewFile => println!("New file in this commit"),
            FileStatus::FirstCommit => println!("First commit, no parent to compare"),
            FileStatus::Unreadable(reason) => {
                println!("{} {}", "cannot show file:".red(), reason)
            }
        }
    }
}
