//! # Campus Assistant CLI (`campus`)
//!
//! ## Usage
//!
//! ```bash
//! campus --config ./config/campus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `campus init` | Create the SQLite tables and the image root |
//! | `campus serve` | Start the HTTP API |
//! | `campus index <file>` | Chunk, embed and store a text or PDF file |
//! | `campus ask "<question>"` | Answer one question through the chat pipeline |
//! | `campus stats` | Per-namespace record counts |
//! | `campus wipe <namespace>` | Delete every record of a namespace |
//! | `campus completions <shell>` | Print shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use campus_assistant::{commands, config, logging, server, services::Services};

/// Campus Assistant: a retrieval-augmented chat backend for college campus questions.
#[derive(Parser)]
#[command(name = "campus", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/campus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and image directory. Idempotent.
    Init,

    /// Start the HTTP API server.
    Serve,

    /// Index a text or PDF file.
    Index {
        file: PathBuf,

        /// Category stored with each chunk (default: `general`).
        #[arg(long)]
        category: Option<String>,

        /// Source label stored with each chunk (default: the file name).
        #[arg(long)]
        source: Option<String>,

        /// Target namespace (default: the sanitized category).
        #[arg(long)]
        namespace: Option<String>,

        /// Do not save images embedded in a PDF.
        #[arg(long)]
        no_images: bool,

        /// Label prefix for PDF images (default: the file name without `.pdf`).
        #[arg(long)]
        image_label_prefix: Option<String>,
    },

    /// Ask a question.
    Ask {
        question: String,

        /// Skip retrieval and ask the model directly.
        #[arg(long)]
        no_rag: bool,

        #[arg(long)]
        conversation_id: Option<String>,
    },

    /// Show index statistics.
    Stats,

    /// Delete every record of a namespace.
    Wipe { namespace: String },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "campus", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Serve => {
            let services = Arc::new(Services::start(&cfg).await?);
            server::run_server(services).await?;
        }
        Commands::Index {
            file,
            category,
            source,
            namespace,
            no_images,
            image_label_prefix,
        } => {
            commands::run_index(
                &cfg,
                &file,
                category,
                source,
                namespace,
                !no_images,
                image_label_prefix,
            )
            .await?
        }
        Commands::Ask {
            question,
            no_rag,
            conversation_id,
        } => commands::run_ask(&cfg, &question, no_rag, conversation_id).await?,
        Commands::Stats => commands::run_stats(&cfg).await?,
        Commands::Wipe { namespace } => commands::run_wipe(&cfg, &namespace).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
