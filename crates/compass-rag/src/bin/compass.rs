//! compass: command-line client for the college application assistant.
//!
//! Signs in, loads the session and runs one operation. Results are printed
//! to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use compass_client::{ClientConfig, CompassClient, HttpBlobStore};
use compass_rag::{CompassSession, DocumentType, ProgressCallback, SessionConfig, UploadFile};

#[derive(Parser)]
#[command(name = "compass")]
#[command(author, version, about = "College application assistant client")]
#[command(propagate_version = true)]
struct Cli {
    /// Account Service base URL
    #[arg(long, env = "COMPASS_API_URL", global = true)]
    api_url: Option<String>,

    /// Account username
    #[arg(short, long, env = "COMPASS_USERNAME", global = true)]
    username: Option<String>,

    /// Account password
    #[arg(short, long, env = "COMPASS_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the credentials are accepted
    Login,

    /// Show the profile and the RAG readiness verdict
    Profile {
        /// Wait for embedding to finish before reporting
        #[arg(long)]
        wait: bool,
    },

    /// List documents with their embedding status
    Documents {
        /// Wait for embedding to finish before reporting
        #[arg(long)]
        wait: bool,
    },

    /// Upload a document
    Upload {
        /// File to upload
        path: PathBuf,

        /// Document title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,

        /// Document type, e.g. transcript, sat_score, recommendation
        #[arg(short = 'k', long = "type", default_value = "other")]
        document_type: DocumentType,
    },

    /// Send a chat message
    Chat {
        /// Message text
        message: String,

        /// Continue an existing conversation
        #[arg(short, long)]
        conversation: Option<Uuid>,
    },

    /// Retrieve context for a query
    Retrieve {
        /// Query text
        query: String,

        /// Number of contexts (1-20)
        #[arg(long)]
        top_k: Option<u32>,
    },

    /// Show RAG statistics
    Stats {
        /// Delete all embeddings instead
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` filters (default `compass=info`); `LOG_FORMAT=json` switches
/// to JSON lines. Output goes to stderr.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "compass=info,compass_rag=info,compass_client=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url.clone());
    }
    let client = Arc::new(CompassClient::new(config.clone())?);

    let (Some(username), Some(password)) = (&cli.username, &cli.password) else {
        bail!("username and password are required (--username/--password or COMPASS_USERNAME/COMPASS_PASSWORD)");
    };
    client
        .login(username, password)
        .await
        .context("login failed")?;

    if let Commands::Login = cli.command {
        return print_json(&serde_json::json!({ "logged_in": true, "username": username }));
    }

    let session = CompassSession::new(
        client.clone(),
        client.clone(),
        Arc::new(HttpBlobStore::new(&config)?),
        SessionConfig::from_env(),
    )?;
    session.start().await.context("loading session")?;

    match cli.command {
        Commands::Login => Ok(()),
        Commands::Profile { wait } => cmd_profile(&session, wait).await,
        Commands::Documents { wait } => cmd_documents(&session, wait).await,
        Commands::Upload {
            path,
            title,
            document_type,
        } => cmd_upload(&session, &path, title.as_deref(), document_type).await,
        Commands::Chat {
            message,
            conversation,
        } => cmd_chat(&session, &message, conversation).await,
        Commands::Retrieve { query, top_k } => {
            let result = session.retrieve(&query, top_k).await?;
            print_json(&result)
        }
        Commands::Stats { clear } => {
            if clear {
                print_json(&session.clear_rag().await?)
            } else {
                print_json(&session.stats().await?)
            }
        }
    }
}

async fn cmd_profile(session: &CompassSession, wait: bool) -> anyhow::Result<()> {
    if wait {
        session.settle().await;
    }
    let profile = session
        .profile()
        .snapshot()
        .await
        .context("profile not loaded")?;
    print_json(&serde_json::json!({
        "profile": profile,
        "signature": session.profile().synchronizer().current_signature().await.map(|s| s.to_string()),
        "readiness": session.readiness().await,
    }))
}

async fn cmd_documents(session: &CompassSession, wait: bool) -> anyhow::Result<()> {
    if wait {
        session.settle().await;
    }
    let statuses = session.documents().tracker().statuses().await;
    let documents: Vec<_> = session
        .documents()
        .documents()
        .await
        .into_iter()
        .map(|doc| {
            let embedding = statuses.get(&doc.id).cloned();
            serde_json::json!({ "document": doc, "embedding": embedding })
        })
        .collect();
    print_json(&serde_json::json!({
        "documents": documents,
        "summary": session.documents().embedding_summary().await,
    }))
}

async fn cmd_upload(
    session: &CompassSession,
    path: &Path,
    title: Option<&str>,
    document_type: DocumentType,
) -> anyhow::Result<()> {
    let file = UploadFile::from_path(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let title = title
        .map(str::to_string)
        .unwrap_or_else(|| file.file_name.clone());

    let progress: ProgressCallback = Arc::new(|percent| eprintln!("upload: {}%", percent));
    let record = session
        .uploads()
        .upload(file, &title, document_type, Some(progress))
        .await?;
    info!(document_id = %record.id, "Upload complete");
    print_json(&record)
}

async fn cmd_chat(
    session: &CompassSession,
    message: &str,
    conversation: Option<Uuid>,
) -> anyhow::Result<()> {
    if let Some(id) = conversation {
        session.conversations().select_conversation(id).await?;
    }
    let readiness = session.readiness().await;
    if !readiness.is_system_ready {
        info!(
            profile_status = ?readiness.profile_status,
            embedding = readiness.documents.embedding_count,
            "Sending before RAG context is fully ready"
        );
    }
    let response = session
        .conversations()
        .send_message(message, conversation)
        .await?;
    print_json(&response)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
