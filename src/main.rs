//! pmc2epub - PubMed Central article to EPUB

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use pmc2epub::{
    ArticleIdentifier, Assembler, AssemblerConfig, Resolver, ResolverConfig,
    assembler::DEFAULT_COVER_IMAGE_PATH, resolver::DEFAULT_BASE_URL,
};

#[derive(Parser)]
#[command(name = "pmc2epub")]
#[command(version, about = "Convert a PubMed Central article to EPUB", long_about = None)]
#[command(after_help = "EXAMPLES:
    pmc2epub --doi 10.3390/biom13020339
    pmc2epub --pmid 36830707 -o article.epub
    pmc2epub --pmcid PMC9953331 --cover-image logo.jpg")]
struct Cli {
    /// Article DOI
    #[arg(long, group = "identifier")]
    doi: Option<String>,

    /// PubMed id
    #[arg(long, group = "identifier")]
    pmid: Option<String>,

    /// PubMed Central id, with or without the PMC prefix
    #[arg(long, group = "identifier")]
    pmcid: Option<String>,

    /// Output file, defaults to the identifier with an .epub extension
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Image shown on the cover page
    #[arg(long, value_name = "FILE", default_value = DEFAULT_COVER_IMAGE_PATH)]
    cover_image: PathBuf,

    /// E-utilities base URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Write the raw full-text XML to this file
    #[arg(long, value_name = "FILE")]
    debug_dump: Option<PathBuf>,

    /// Only report warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Report every request
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match convert(&cli) {
        Ok(output) => {
            info!("Done: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

fn convert(cli: &Cli) -> Result<PathBuf, String> {
    let identifier = ArticleIdentifier::from_options(
        cli.doi.as_deref(),
        cli.pmid.as_deref(),
        cli.pmcid.as_deref(),
    )
    .map_err(|e| e.to_string())?;

    let resolver_config = ResolverConfig::default()
        .with_base_url(cli.base_url.as_str())
        .with_debug_dump(cli.debug_dump.clone());
    let resolver = Resolver::new(resolver_config).map_err(|e| e.to_string())?;
    let doc = resolver.resolve(&identifier).map_err(|e| e.to_string())?;

    let assembler = Assembler::new(
        AssemblerConfig::default().with_cover_image_path(cli.cover_image.clone()),
    );
    let package = assembler.assemble(&doc).map_err(|e| e.to_string())?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&identifier));
    package.make(&output).map_err(|e| e.to_string())?;

    Ok(output)
}

/// `<identifier>.epub`, with every non-alphanumeric character replaced by `_`
fn default_output(identifier: &ArticleIdentifier) -> PathBuf {
    let stem = identifier
        .value()
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();

    PathBuf::from(format!("{stem}.epub"))
}
