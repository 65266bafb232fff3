use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use gridsift::fetch::{FetchMethod, HttpFetcher, PageFetcher, RateLimiter};
use gridsift::llm::ChatClient;
use gridsift::{ask, extract_with_config, narrow_with_config, ExtractionConfig, NarrowConfig};

#[derive(Parser)]
#[command(name = "gridsift", about = "Extract tables, grids and linked data from any web page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Page URL to fetch
    url: Option<String>,
    /// Read HTML from a local file instead of fetching
    #[arg(short, long, conflicts_with = "url")]
    file: Option<PathBuf>,
    /// Keep navigation, ads and footers
    #[arg(long)]
    keep_boilerplate: bool,
    /// Keep the original column names
    #[arg(long)]
    raw_columns: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print everything extracted from a page as JSON
    Extract {
        #[command(flatten)]
        source: Source,
    },
    /// Print the records relevant to a question as JSON
    Narrow {
        #[command(flatten)]
        source: Source,
        /// The question
        #[arg(short, long)]
        question: String,
        /// Max rows to keep (0 keeps all)
        #[arg(short = 'n', long, default_value = "10")]
        top_n: usize,
    },
    /// Fetch a page and ask the language model about it (needs GROQ_API_KEY)
    Ask {
        url: String,
        question: String,
        /// Max rows handed to the model
        #[arg(short = 'n', long, default_value = "10")]
        top_n: usize,
    },
}

impl Source {
    fn config(&self) -> ExtractionConfig {
        ExtractionConfig {
            strip_boilerplate: !self.keep_boilerplate,
            normalize_fields: !self.raw_columns,
            ..ExtractionConfig::default()
        }
    }

    fn load(&self, fetcher: &HttpFetcher) -> Result<(String, Option<String>)> {
        match (&self.url, &self.file) {
            (_, Some(path)) => {
                let html = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Ok((html, None))
            }
            (Some(url), None) => {
                let html = fetcher.fetch(url, FetchMethod::Http)?;
                Ok((html, Some(url.clone())))
            }
            (None, None) => bail!("give a URL or --file"),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fetcher = HttpFetcher::new(Arc::new(RateLimiter::default()));

    match cli.command {
        Commands::Extract { source } => {
            let (html, url) = source.load(&fetcher)?;
            let results = extract_with_config(&html, url.as_deref(), &source.config());
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Narrow {
            source,
            question,
            top_n,
        } => {
            let (html, url) = source.load(&fetcher)?;
            let results = extract_with_config(&html, url.as_deref(), &source.config());
            let config = NarrowConfig {
                top_n,
                ..NarrowConfig::default()
            };
            let narrowed = narrow_with_config(&results, &question, &config);
            println!("{}", serde_json::to_string_pretty(&narrowed)?);
        }
        Commands::Ask {
            url,
            question,
            top_n,
        } => {
            let model = ChatClient::from_env()?;
            info!("Asking about {}", url);
            let answer = ask(&fetcher, &model, &url, FetchMethod::Http, &question, top_n)?;
            println!("{}", answer);
        }
    }

    Ok(())
}
