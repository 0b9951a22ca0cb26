use chrono::Utc;
use clap::{Parser, Subcommand};
use image_dedup_core::{
    add_folder_best_effort, ElasticsearchStore, GridSignature, ImageSource, SearchConfig,
    SearchOptions, SignatureGenerator, SignatureSearch,
};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "image-dedup", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Elasticsearch / OpenSearch base URL
    #[arg(long, env = "IMAGE_DEDUP_ES_URL", default_value = "http://localhost:9200")]
    es_url: String,

    /// Index holding image signatures
    #[arg(long, env = "IMAGE_DEDUP_INDEX", default_value = "images")]
    index: String,

    /// Timeout in milliseconds for each store request
    #[arg(long, env = "IMAGE_DEDUP_TIMEOUT_MS", default_value = "10000")]
    timeout_ms: u64,

    /// Maximum candidates fetched per orientation pass
    #[arg(long, env = "IMAGE_DEDUP_RESULT_LIMIT", default_value = "100")]
    result_limit: usize,

    /// Minimum number of shared words for a candidate
    #[arg(long, env = "IMAGE_DEDUP_MIN_OVERLAP", default_value = "6")]
    min_overlap: usize,

    /// Maximum accepted normalized distance (exclusive)
    #[arg(long, env = "IMAGE_DEDUP_DISTANCE_CUTOFF", default_value = "0.45")]
    distance_cutoff: f64,

    /// Sample grid size of the signature
    #[arg(long, env = "IMAGE_DEDUP_GRID_SIZE", default_value = "9")]
    grid_size: usize,

    /// Signature cells folded into each word
    #[arg(long, env = "IMAGE_DEDUP_K", default_value = "3")]
    k: usize,

    /// Refresh the index after each insert so it is searchable at once
    #[arg(long, default_value_t = false)]
    refresh: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create the index and its mappings if missing.
    Init,
    /// Index one image.
    Add {
        /// Path or identifier stored with the record.
        #[arg(long)]
        path: String,
        /// Where to read pixels from, defaults to `path`.
        #[arg(long)]
        image: Option<String>,
        /// JSON metadata stored alongside the signature.
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Index every image below a folder.
    AddFolder {
        #[arg(long)]
        folder: String,
    },
    /// Search for near duplicates of an image.
    Search {
        /// Filesystem path or http(s) URL.
        #[arg(long)]
        image: String,
        /// Also try every rotation, mirror and inversion of the image.
        #[arg(long, default_value_t = false)]
        all_orientations: bool,
        /// JSON filter clause applied before word matching.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Delete all but one record stored under a path.
    Dedupe {
        #[arg(long)]
        path: String,
    },
}

impl Cli {
    fn search_config(&self) -> SearchConfig {
        let generator = self.generator();
        SearchConfig {
            index: self.index.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            result_limit: self.result_limit,
            min_overlap: self.min_overlap,
            distance_cutoff: self.distance_cutoff,
            n: generator.signature_len(),
            k: self.k,
            grid_size: self.grid_size,
            refresh_after: self.refresh,
        }
    }

    fn generator(&self) -> GridSignature {
        GridSignature {
            grid_size: self.grid_size,
            k: self.k,
        }
    }
}

fn parse_json(raw: Option<&str>) -> anyhow::Result<Option<Value>> {
    raw.map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|error| anyhow::anyhow!("invalid json argument: {error}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.search_config();
    let store = ElasticsearchStore::new(&cli.es_url, &config.index).with_timeout(config.timeout);
    let search = SignatureSearch::new(store, cli.generator(), config)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        index = %search.config().index,
        "image-dedup boot"
    );

    match cli.command {
        Command::Init => {
            search.store().ensure_index().await?;
            println!("index {} ready", search.store().index_name());
        }
        Command::Add {
            path,
            image,
            metadata,
        } => {
            let metadata = parse_json(metadata.as_deref())?;
            let source = ImageSource::parse(image.as_deref().unwrap_or(&path));
            let id = search.add_image(&path, &source, metadata).await?;
            println!("{id}");
        }
        Command::AddFolder { folder } => {
            let report = add_folder_best_effort(&search, Path::new(&folder)).await?;

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    folder
                );
            }

            println!(
                "{} images indexed at {}",
                report.added.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search {
            image,
            all_orientations,
            filter,
        } => {
            let options = SearchOptions {
                all_orientations,
                pre_filter: parse_json(filter.as_deref())?,
            };
            let results = search
                .search_image(&ImageSource::parse(&image), &options)
                .await?;

            if results.is_empty() {
                println!("no matches");
            }
            for result in results {
                println!(
                    "dist={:.4} score={:.4} id={} path={}",
                    result.dist, result.store_score, result.id, result.path
                );
                if let Some(metadata) = &result.metadata {
                    println!("  metadata={metadata}");
                }
            }
        }
        Command::Dedupe { path } => {
            let deleted = search.delete_duplicates(&path).await?;
            println!("{deleted} duplicate(s) deleted for {path}");
        }
    }

    Ok(())
}
