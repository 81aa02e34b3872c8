use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use weavemark::{
    HtmlRenderer, MarkdownRenderer, Options, SvRenderer, TextRenderer, error::Result, parse,
};

/// Render Markdown to HTML, split-view DOM, canonical Markdown or plain text
#[derive(Parser)]
#[command(name = "weavemark")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file; reads stdin when omitted
    file: Option<PathBuf>,

    /// Output dialect
    #[arg(short, long, value_enum, default_value_t = Format::Html)]
    to: Format,

    /// JSON options file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Html,
    Sv,
    Markdown,
    Text,
    /// The parsed tree
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let options = match &cli.config {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };

    let input = match &cli.file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
    };
    debug!(bytes = input.len(), format = ?cli.to, "rendering");

    let mut tree = parse(&input, &options);
    let output = match cli.to {
        Format::Html => HtmlRenderer::new(&tree, &options).render(),
        Format::Sv => SvRenderer::new(&mut tree).render(),
        Format::Markdown => MarkdownRenderer::new(&tree).render(),
        Format::Text => TextRenderer::new(&tree).render(),
        Format::Json => tree.to_json(tree.root()) + "\n",
    };
    io::stdout().write_all(output.as_bytes())?;
    Ok(())
}
