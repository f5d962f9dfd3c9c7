use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use structchat::{ChatClient, ChatOptions, ChatSession, OllamaClient, DEFAULT_MODEL};

/// Extract a structured product review from free-form review text.
#[derive(Parser)]
#[command(name = "structchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    verbose: bool,

    /// Target a local Ollama server (e.g. http://localhost:11434) instead of
    /// the hosted endpoint.
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// API key for the hosted endpoint; falls back to OLLAMA_API_KEY.
    #[arg(long)]
    api_key: Option<String>,

    /// Keep the exchange in the session history.
    #[arg(long)]
    track_history: bool,

    #[arg(short, long)]
    temperature: Option<f32>,

    /// Read the review text from a file instead of stdin.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

/// Demonstration schema: a product review distilled from prose.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ProductReview {
    /// Name of the product being reviewed.
    product_name: String,
    /// Rating from 1 to 5 stars.
    #[schemars(range(min = 1, max = 5))]
    rating: u8,
    /// Name of the person writing the review.
    reviewer_name: String,
    /// The actual review content.
    review_text: String,
    /// Positive aspects mentioned.
    #[serde(default)]
    pros: Vec<String>,
    /// Negative aspects mentioned.
    #[serde(default)]
    cons: Vec<String>,
    /// Whether the reviewer would recommend this product.
    would_recommend: bool,
    /// Whether this is a verified purchase, when stated.
    verified_purchase: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let text = match &cli.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let client: Arc<dyn ChatClient> = match &cli.host {
        Some(host) => {
            info!("Using local Ollama server at {host}");
            Arc::new(OllamaClient::connect_local(host.clone()))
        }
        None => Arc::new(OllamaClient::connect_cloud(cli.api_key.clone())?),
    };

    let mut options = ChatOptions::new();
    if let Some(temperature) = cli.temperature {
        options = options.with_temperature(temperature);
    }

    let mut session = ChatSession::new(client, cli.model)
        .with_history_tracking(cli.track_history)
        .with_options(options);

    let review: ProductReview = session.ask_structured(&text, None).await?;

    println!("{}", serde_json::to_string_pretty(&review)?);

    Ok(())
}
