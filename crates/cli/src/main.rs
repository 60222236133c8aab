use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use folio_core::{
    Content, ContentLinks, Folio, FolioConfig, JsonConfig, MarkdownConfig, SsrfOptions, TextConfig, convert_to_json,
    convert_to_markdown, convert_to_text,
};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for extracted content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Json,
    Text,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(format!("Invalid format: {}. Valid options: html, json, text, markdown", s)),
        }
    }
}

/// Fetch a web page and extract its readable article
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author = "Folio Contributors")]
#[command(version = VERSION)]
#[command(about = "Fetch web pages and extract readable articles", long_about = None)]
struct Args {
    /// URL to fetch
    #[arg(value_name = "URL")]
    url: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (html, json, text, markdown)
    #[arg(short, long, default_value = "html", value_name = "FORMAT")]
    format: OutputFormat,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Site config directory, searched before the defaults (repeatable)
    #[arg(long = "site-config", value_name = "DIR")]
    site_config: Vec<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// What to do with links in the article (preserve, footnotes, remove)
    #[arg(long, value_name = "MODE")]
    content_links: Option<ContentLinks>,

    /// Do not look for a single-page version of the article
    #[arg(long)]
    no_singlepage: bool,

    /// Do not follow next-page links
    #[arg(long)]
    no_multipage: bool,

    /// Allow private addresses and any port (disables SSRF protection)
    #[arg(long)]
    allow_private: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Print a styled banner for verbose mode
fn print_banner() {
    eprintln!("\n{} {} {}", "Folio".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Fetch web pages and extract readable articles".dimmed());
    eprintln!();
}

/// Print a styled step message
fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,folio_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Load the config file, then apply flag overrides.
fn build_config(args: &Args) -> anyhow::Result<FolioConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("Failed to read config: {}", path.display()))?;
            FolioConfig::from_json(&json).with_context(|| format!("Invalid config: {}", path.display()))?
        }
        None => FolioConfig::default(),
    };

    for dir in args.site_config.iter().rev() {
        config.site_config_dirs.insert(0, dir.clone());
    }
    if let Some(timeout) = args.timeout {
        config.fetcher.timeout = timeout;
    }
    if let Some(user_agent) = &args.user_agent {
        config.fetcher.user_agent = user_agent.clone();
    }
    if let Some(mode) = args.content_links {
        config.content_links = mode;
    }
    if args.no_singlepage {
        config.singlepage = false;
    }
    if args.no_multipage {
        config.multipage = false;
    }
    if args.allow_private {
        config.ssrf = SsrfOptions::allow_all();
    }

    tracing::debug!(site_config_dirs = ?config.site_config_dirs, content_links = ?config.content_links, "configuration loaded");
    Ok(config)
}

fn render(content: &Content, format: OutputFormat) -> anyhow::Result<String> {
    let output = match format {
        OutputFormat::Html => content.html.clone(),
        OutputFormat::Json => {
            convert_to_json(content, &JsonConfig::default()).context("Failed to convert to JSON")?
        }
        OutputFormat::Text => {
            convert_to_text(content, &TextConfig::default()).context("Failed to convert to text")?
        }
        OutputFormat::Markdown => {
            convert_to_markdown(content, &MarkdownConfig::default()).context("Failed to convert to Markdown")?
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        print_banner();
        print_step(1, 3, "Loading configuration");
    }

    let config = build_config(&args)?;
    let folio = Folio::new(config).context("Invalid configuration")?;

    if args.verbose {
        for dir in folio.repository().dirs() {
            eprintln!("  {} {}", "Site config:".dimmed(), dir.display().bright_white());
        }
        eprintln!();
        print_step(2, 3, &format!("Fetching {}", args.url.bright_white().underline()));
    }

    let started = Instant::now();
    let content = folio
        .fetch_content(&args.url)
        .await
        .with_context(|| format!("Failed to fetch content from {}", args.url))?;

    if content.html == folio.config().error_message {
        print_warning(&format!("No content could be extracted (status {})", content.status));
    }

    if args.verbose {
        eprintln!("  {} {}", "Status:".dimmed(), content.status.to_string().bright_white());
        eprintln!("  {} {}", "Title:".dimmed(), content.title.bright_white());
        if content.url != args.url {
            eprintln!("  {} {}", "URL:".dimmed(), content.url.bright_white());
        }
        eprintln!("  {} {:.2?}", "Elapsed:".dimmed(), started.elapsed());
        eprintln!();
        print_step(3, 3, &format!("Writing {:?} output", args.format));
    }

    let output = render(&content, args.format)?;

    match args.output {
        Some(path) => {
            fs::write(&path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => println!("{}", output),
    }

    Ok(())
}
