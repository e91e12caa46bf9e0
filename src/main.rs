use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use futures::StreamExt;
use studykit_core::config::constants::{defaults, env as env_vars};
use studykit_core::{ApiClient, ChatParams, SessionEvent, SourceCitation, StreamSession};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "studykit",
    version,
    about = "Chat with your study documents from the terminal"
)]
struct Cli {
    /// Backend base URL; falls back to STUDYKIT_API_BASE, then the local default
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API token environment variable to read
    #[arg(long, global = true, default_value = env_vars::API_TOKEN)]
    token_env: String,

    /// Log filter (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question against a project's documents
    Ask {
        /// Project to query
        #[arg(long)]
        target: String,

        /// Restrict retrieval to these document ids (repeatable)
        #[arg(long = "doc")]
        documents: Vec<String>,

        /// Use the atomic endpoint instead of streaming
        #[arg(long)]
        no_stream: bool,

        /// Print the final result as JSON
        #[arg(long)]
        json: bool,

        /// The question to ask
        question: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .with_writer(io::stderr)
        .init();

    let token = std::env::var(&args.token_env)
        .with_context(|| format!("set {} in your environment", args.token_env))?;
    let base_url = args
        .base_url
        .clone()
        .or_else(|| std::env::var(env_vars::API_BASE).ok())
        .unwrap_or_else(|| defaults::BASE_URL.to_string());
    let client = ApiClient::new(base_url, token)?;

    match args.command {
        Commands::Ask {
            target,
            documents,
            no_stream,
            json,
            question,
        } => {
            let params = ChatParams {
                target,
                message: question.join(" "),
                history: Vec::new(),
                selected_document_ids: documents,
            };
            if no_stream {
                ask_once(&client, &params, json).await
            } else {
                ask_streaming(client, params, json).await
            }
        }
    }
}

/// One request, one response: no progress, just the final answer.
async fn ask_once(client: &ApiClient, params: &ChatParams, json: bool) -> Result<()> {
    let response = client.ask(params).await?;
    if json {
        let value = serde_json::json!({
            "answer": response.answer,
            "sources": response.sources,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{}", response.answer);
    print_sources(&response.sources);
    Ok(())
}

async fn ask_streaming(client: ApiClient, params: ChatParams, json: bool) -> Result<()> {
    let session = StreamSession::new(Arc::new(client));
    let mut events = session.events(params);

    let mut stdout = io::stdout();
    // Snapshots are cumulative, so only the unseen suffix gets printed.
    let mut printed = 0usize;

    while let Some(event) = events.next().await {
        match event {
            SessionEvent::Progress(snapshot) => {
                if json {
                    continue;
                }
                if snapshot.len() < printed {
                    // A retry started the answer over; void the earlier text.
                    writeln!(stdout)?;
                    writeln!(stdout, "{}", style("(retrying...)").dim())?;
                    printed = 0;
                }
                // A retried answer may diverge from the printed prefix; fall
                // back to reprinting it whole rather than slicing mid-scalar.
                match snapshot.get(printed..) {
                    Some(suffix) => write!(stdout, "{suffix}")?,
                    None => {
                        writeln!(stdout)?;
                        write!(stdout, "{snapshot}")?;
                    }
                }
                stdout.flush()?;
                printed = snapshot.len();
            }
            SessionEvent::Final(result) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    if result.errored {
                        std::process::exit(1);
                    }
                    return Ok(());
                }
                if result.errored {
                    if printed > 0 {
                        writeln!(stdout)?;
                    }
                    eprintln!("{} {}", style("error:").red().bold(), result.answer);
                    std::process::exit(1);
                }
                // The terminal answer can extend past the last snapshot.
                if result.answer.len() > printed {
                    match result.answer.get(printed..) {
                        Some(suffix) => write!(stdout, "{suffix}")?,
                        None => {
                            writeln!(stdout)?;
                            write!(stdout, "{}", result.answer)?;
                        }
                    }
                }
                writeln!(stdout)?;
                print_sources(&result.sources);
                return Ok(());
            }
        }
    }
    Ok(())
}

fn print_sources(sources: &[SourceCitation]) {
    if sources.is_empty() {
        return;
    }
    println!("\n{}", style("Sources:").bold());
    for (index, source) in sources.iter().enumerate() {
        let name = if source.document_name.is_empty() {
            &source.document_id
        } else {
            &source.document_name
        };
        if source.excerpt_text.is_empty() {
            println!("  {}. {}", index + 1, name);
        } else {
            println!("  {}. {} - {}", index + 1, name, source.excerpt_text);
        }
    }
}
