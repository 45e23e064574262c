use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use neuroquery_image_search::config::Config;
use neuroquery_image_search::image::ImageSource;
use neuroquery_image_search::{neurovault, output, ImageSearch, SearchOptions, Transform};

/// Search the NeuroQuery dataset for studies and terms with activation
/// patterns similar to a brain image.
#[derive(Parser)]
#[command(name = "neuroquery-image-search", version, about)]
struct Cli {
    /// NIfTI image with which to query the dataset. If not provided, an
    /// example image is downloaded from neurovault.org.
    query_img: Option<PathBuf>,

    /// Number of similar studies returned
    #[arg(long = "n_studies", default_value = "50")]
    n_studies: usize,

    /// Number of similar terms returned
    #[arg(long = "n_terms", default_value = "20")]
    n_terms: usize,

    /// File in which to store the output. If not specified, output is
    /// displayed in a web browser. Output format depends on the filename
    /// extension (.html, .json, .csv or .tsv; anything else is HTML)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Transform to apply to the image. As NeuroQuery ignores the direction
    /// of activations, by default the absolute value of the input map is
    /// compared to activation patterns in the literature.
    #[arg(long, value_enum, default_value_t = Transform::AbsoluteValue)]
    transform: Transform,

    /// Report raw similarity scores instead of dividing by the best match
    #[arg(long)]
    no_rescale: bool,

    /// Cache directory for the data bundle (overrides NEUROQUERY_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("neuroquery_image_search=info")
            }),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let query_path = match cli.query_img {
        Some(path) => path,
        None => {
            println!("No query image given, using an example image from NeuroVault.");
            neurovault::fetch_example_image(&config).await?
        }
    };
    let source = ImageSource::from(query_path);
    let title = source.display_name();

    let search = ImageSearch::open(&config).await?;
    let options = SearchOptions {
        n_studies: cli.n_studies,
        n_terms: cli.n_terms,
        transform: cli.transform,
        rescale: !cli.no_rescale,
    };
    info!(?options, "Running search for {}", title);
    let results = search.search(source, &options)?;

    output::terminal::display_summary(&results);

    match cli.output {
        None => {
            let page = output::open_in_browser(&results, &title)?;
            info!("Report written to {}", page.display());
            println!("Displaying results in web browser");
            println!("{}", "Use '--output' to write results in a file".dimmed());
        }
        Some(path) => {
            println!("Saving results in {}", path.display());
            let written = output::save(&results, &path, &title)?;
            for file in written.iter().skip(1) {
                println!("  also wrote {}", file.display());
            }
            println!("{}", "Done.".bold());
        }
    }

    Ok(())
}
