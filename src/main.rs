use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agentledger::cli::{admin, event, import, plan, project, record, session, PageArgs};
use agentledger::config::Config;
use agentledger::model::PlanStatus;
use agentledger::repository::{self, BackendKind};

#[derive(Parser)]
#[command(name = "agentledger")]
#[command(about = "Coding-agent tool-use event ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "agentledger.yaml")]
    config: String,

    /// Storage backend, overriding the config file
    #[arg(long, env = "AGENTLEDGER_BACKEND")]
    backend: Option<BackendKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and the default project
    Init,

    /// Record one Claude Code hook payload read from stdin
    Record,

    /// Import Claude Code JSONL transcripts
    Import {
        /// Claude projects directory (defaults to ingest.claude_projects_path)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Project management
    Projects {
        #[command(subcommand)]
        command: Option<ProjectCommands>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// List sessions
    Sessions {
        /// Project ID or git remote
        #[arg(short, long)]
        project: Option<String>,

        /// Only sessions assigned to this user ID
        #[arg(short, long)]
        user: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// List the events of a session
    Events {
        /// Session ID or Claude session ID
        session: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// List plan documents
    Plans {
        /// Only these statuses (repeatable)
        #[arg(long = "status")]
        statuses: Vec<PlanStatus>,

        /// Project ID or git remote
        #[arg(short, long)]
        project: Option<String>,

        /// Case-insensitive description search
        #[arg(short, long)]
        search: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Delete expired web sessions
    Sweep,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Register a repository by its git remote
    Add {
        /// Git remote URL in any spelling
        remote: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let mut config = Config::load(&cli.config)?;
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }

    agentledger::logging::init(&config.logging)?;

    // Open the configured backend
    let repos = repository::open(&config.storage)
        .await
        .with_context(|| format!("Failed to open {} storage", config.storage.backend))?;

    match cli.command {
        Commands::Init => {
            admin::init(&repos).await?;
        }
        Commands::Record => {
            record::run(&repos).await?;
        }
        Commands::Import { path } => {
            let base = path.unwrap_or_else(|| config.ingest.claude_projects_path());
            import::run(&repos, &base).await?;
        }
        Commands::Projects { command, page } => match command {
            Some(ProjectCommands::Add { remote }) => {
                project::add(&repos, &remote).await?;
            }
            None => {
                project::list(&repos, &page).await?;
            }
        },
        Commands::Sessions {
            project,
            user,
            page,
        } => {
            session::list(&repos, project, user, &page).await?;
        }
        Commands::Events { session, page } => {
            event::list(&repos, &session, &page).await?;
        }
        Commands::Plans {
            statuses,
            project,
            search,
            page,
        } => {
            plan::list(&repos, statuses, project, search, &page).await?;
        }
        Commands::Sweep => {
            admin::sweep(&repos).await?;
        }
    }

    Ok(())
}
