//! # Bugreport Harness CLI (`brh`)
//!
//! The `brh` binary indexes Android bugreports, answers questions against
//! the saved index with cited sources, and produces map-reduce summaries.
//!
//! ## Usage
//!
//! ```bash
//! brh --config ./config/brh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brh index <path>` | Chunk, embed and save an index for a bugreport (`.txt` or `.zip`) |
//! | `brh ask "<question>"` | Answer from the newest (or a given) index, citing sources |
//! | `brh summarize <path>` | Summarize a whole bugreport segment by segment |
//! | `brh indexes` | List saved indexes, newest first |
//! | `brh completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # Index a bugreport archive
//! brh index ./bugreport-pixel-2024-03-09.zip
//!
//! # Show the grounded prompt without calling the model
//! brh ask "Why did systemui ANR?" --dry-run
//!
//! # Ask with more context
//! brh ask "What drained the battery overnight?" --top-k 10
//! ```

use std::path::PathBuf;

use bugreport_harness::ask::{self, AskOptions};
use bugreport_harness::progress::ProgressMode;
use bugreport_harness::session_log::SessionLog;
use bugreport_harness::{config, index_cmd, summarize_cmd};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Bugreport Harness CLI: retrieval-augmented questions and summaries over
/// Android bugreports.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/brh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "brh",
    about = "Bugreport Harness: ask questions about Android bugreports with cited answers",
    version,
    long_about = "Bugreport Harness splits a large Android bugreport into overlapping chunks, \
    embeds them into a reusable index, and answers natural-language questions with answers \
    that cite the retrieved chunks. It can also summarize a whole report map-reduce style."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/brh.toml`. Index, summary, retrieval,
    /// embedding, completion and log settings are read from this file.
    #[arg(long, global = true, default_value = "./config/brh.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). Overrides RUST_LOG.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build an embedding index for a bugreport.
    ///
    /// Accepts a plain-text bugreport or a bugreport `.zip` archive. An
    /// unchanged document with unchanged settings reuses its saved index.
    /// Ctrl-C stops after the current chunk; nothing is saved.
    Index {
        /// Path to the bugreport (`.txt` or `.zip`).
        path: PathBuf,

        /// Rebuild even when a matching index already exists.
        #[arg(long)]
        force: bool,

        /// Show document size and chunk count without embedding anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Ask a question about an indexed bugreport.
    ///
    /// Retrieves the most similar chunks, builds a citation-constrained
    /// prompt, and prints the answer followed by its numbered sources.
    Ask {
        /// The question.
        question: String,

        /// Index file to query. Defaults to the newest index in `[index].dir`.
        #[arg(long)]
        index: Option<PathBuf>,

        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the grounded prompt without calling the completion provider.
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Summarize a whole bugreport.
    ///
    /// Splits the report by line into bounded segments, summarizes each,
    /// and merges the partial summaries.
    Summarize {
        /// Path to the bugreport (`.txt` or `.zip`).
        path: PathBuf,

        /// Maximum number of segments; the tail is merged into the last one.
        #[arg(long)]
        max_chunks: Option<usize>,

        /// Maximum segment size in characters.
        #[arg(long)]
        chunk_limit: Option<usize>,
    },

    /// List saved indexes, newest first.
    Indexes,

    /// Generate a shell completion script.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Human,
    Json,
    Off,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "brh", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let log = SessionLog::from_config(&cfg.log)?;

    match cli.command {
        Commands::Index {
            path,
            force,
            dry_run,
            progress,
        } => {
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            index_cmd::run_index(&cfg, &path, force, dry_run, mode, &log).await?;
        }
        Commands::Ask {
            question,
            index,
            top_k,
            dry_run,
            json,
        } => {
            let opts = AskOptions {
                index,
                top_k,
                dry_run,
                json,
            };
            ask::run_ask(&cfg, &question, &opts, &log).await?;
        }
        Commands::Summarize {
            path,
            max_chunks,
            chunk_limit,
        } => {
            summarize_cmd::run_summarize(&cfg, &path, max_chunks, chunk_limit, &log).await?;
        }
        Commands::Indexes => {
            index_cmd::run_list(&cfg)?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}
