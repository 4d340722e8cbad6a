//! # anime-rec CLI (`anirec`)
//!
//! The `anirec` binary is the primary interface for anime-rec. It provides
//! commands for fetching the catalog, searching it, ranking similar titles,
//! filtering, and dataset statistics.
//!
//! ## Usage
//!
//! ```bash
//! anirec --config ./anirec.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `anirec fetch` | Pull catalog pages from the Jikan API into the CSV dataset |
//! | `anirec search "<query>"` | Substring search over names and genres |
//! | `anirec recommend "<name>"` | Rank titles most similar to a given one |
//! | `anirec filter` | Filter by genre, score, episodes, format |
//! | `anirec top` | Highest-rated titles |
//! | `anirec names` | All titles, one per line |
//! | `anirec genres` | Distinct genre tags, one per line |
//! | `anirec kinds` | Distinct broadcast formats, one per line |
//! | `anirec stats` | Dataset overview |
//! | `anirec explain "<name>"` | AI-written recommendations (requires provider) |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use anime_rec::config::{self, Config};
use anime_rec::engine::{FilterParams, Recommender};
use anime_rec::models::Anime;
use anime_rec::{dataset, explain, fetch, stats};

/// anime-rec CLI — content-based anime recommendations over TF-IDF genre
/// similarity.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to defaults (`anime.csv` in the working
/// directory). See `config/anirec.example.toml`.
#[derive(Parser)]
#[command(
    name = "anirec",
    about = "Content-based anime recommendations over TF-IDF genre similarity",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./anirec.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch catalog pages from the Jikan API into the dataset CSV.
    ///
    /// Pages through the popularity-ordered listing, skips ids already in
    /// the dataset, and rewrites the CSV once at the end. Respects the API
    /// rate limit with a per-page delay and 429 backoff.
    Fetch {
        /// Number of pages to fetch (25 entries per page). Overrides config.
        #[arg(long)]
        pages: Option<u32>,

        /// Restrict the fetch to one genre (e.g. "Action", "Sci-Fi").
        #[arg(long)]
        genre: Option<String>,

        /// Discard the existing dataset instead of appending to it.
        #[arg(long)]
        overwrite: bool,
    },

    /// Search titles by name or genre (case-insensitive substring).
    Search {
        /// The query string. An empty query lists the whole dataset.
        query: String,
    },

    /// Rank the titles most similar to a given one.
    ///
    /// The name resolves to the first substring match in table order; use
    /// `search` first to disambiguate when several titles match.
    Recommend {
        /// Title (or unambiguous fragment) to recommend against.
        name: String,

        /// How many recommendations to return. Overrides config.
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Filter the dataset by any combination of criteria.
    Filter {
        /// Genre substring (case-insensitive).
        #[arg(long)]
        genre: Option<String>,

        /// Minimum score, inclusive.
        #[arg(long)]
        min_score: Option<f64>,

        /// Maximum episode count, inclusive. Excludes titles with an
        /// unknown episode count.
        #[arg(long)]
        max_episodes: Option<u32>,

        /// Exact broadcast format (TV, Movie, OVA, ...).
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show the highest-rated titles.
    Top {
        /// How many titles to show.
        #[arg(long, default_value_t = 10)]
        n: usize,
    },

    /// List all titles in dataset order.
    Names,

    /// List the distinct genre tags present in the dataset.
    Genres,

    /// List the distinct broadcast formats present in the dataset.
    Kinds,

    /// Show dataset statistics (counts, genres, formats).
    Stats,

    /// Ask the configured language model for prose recommendations.
    ///
    /// Requires `[explain] provider = "gemini"` and the `GEMINI_API_KEY`
    /// environment variable. The similarity engine is not involved beyond
    /// resolving the name for prompt context.
    Explain {
        /// Title the user likes.
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Fetch {
            pages,
            genre,
            overwrite,
        } => {
            fetch::run_fetch(&cfg, pages, genre.as_deref(), overwrite).await?;
        }
        Commands::Search { query } => {
            let rec = load_recommender(&cfg)?;
            print_items(&rec.search(&query));
        }
        Commands::Recommend { name, top_n } => {
            let rec = load_recommender(&cfg)?;
            let top_n = top_n.unwrap_or(cfg.recommend.top_n);
            match rec.recommend(&name, top_n) {
                Ok(recs) => {
                    println!("Titles similar to the first match for \"{}\":", name);
                    println!();
                    println!(
                        "  {:>3}  {:<40} {:>6}  {:>5}  {}",
                        "#", "NAME", "SIM", "SCORE", "GENRES"
                    );
                    println!("  {}", "-".repeat(76));
                    for (rank, r) in recs.iter().enumerate() {
                        println!(
                            "  {:>3}  {:<40} {:>6.3}  {:>5.2}  {}",
                            rank + 1,
                            truncate(&r.anime.name, 40),
                            r.similarity,
                            r.anime.score,
                            truncate(&r.anime.genres_joined(), 30)
                        );
                    }
                }
                Err(anime_rec::engine::EngineError::NotFound(_)) => {
                    println!("No title matching \"{}\".", name);
                    suggest(&rec, &name);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Filter {
            genre,
            min_score,
            max_episodes,
            kind,
        } => {
            let rec = load_recommender(&cfg)?;
            let params = FilterParams {
                genre,
                min_score,
                max_episodes,
                kind,
            };
            print_items(&rec.filter(&params));
        }
        Commands::Top { n } => {
            let rec = load_recommender(&cfg)?;
            print_items(&rec.top_by_score(n)?);
        }
        Commands::Names => {
            let rec = load_recommender(&cfg)?;
            for name in rec.all_names() {
                println!("{}", name);
            }
        }
        Commands::Genres => {
            let rec = load_recommender(&cfg)?;
            for genre in rec.genre_list() {
                println!("{}", genre);
            }
        }
        Commands::Kinds => {
            let rec = load_recommender(&cfg)?;
            for kind in rec.kind_list() {
                println!("{}", kind);
            }
        }
        Commands::Stats => {
            let rec = load_recommender(&cfg)?;
            stats::run_stats(&rec);
        }
        Commands::Explain { name } => {
            // Constructing the provider up front fails fast on a missing API
            // key or a misconfigured provider, before the dataset is loaded.
            let provider = explain::create_provider(&cfg.explain)?;
            tracing::debug!(model = provider.model_name(), "explain provider ready");

            let rec = load_recommender(&cfg)?;
            let item = rec.search(&name).into_iter().next().cloned();
            let text = explain::generate_explanation(&cfg.explain, item.as_ref(), &name).await?;
            println!("{}", text);
        }
    }

    Ok(())
}

/// Read the dataset CSV and build a ready snapshot.
fn load_recommender(cfg: &Config) -> Result<Recommender> {
    let path = &cfg.dataset.path;
    if !path.exists() {
        anyhow::bail!(
            "Dataset not found: {}. Run `anirec fetch` first.",
            path.display()
        );
    }
    let records = dataset::read_csv(path)?;
    Recommender::load(records)
        .with_context(|| format!("Failed to build model from {}", path.display()))
}

/// Print a result table for a list of entries.
fn print_items(items: &[&Anime]) {
    if items.is_empty() {
        println!("No results.");
        return;
    }

    println!(
        "  {:<40} {:>5}  {:>4}  {:<8} {}",
        "NAME", "SCORE", "EPS", "TYPE", "GENRES"
    );
    println!("  {}", "-".repeat(86));
    for item in items {
        let episodes = item
            .episodes
            .map(|e| e.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {:<40} {:>5.2}  {:>4}  {:<8} {}",
            truncate(&item.name, 40),
            item.score,
            episodes,
            item.kind.as_deref().unwrap_or("-"),
            truncate(&item.genres_joined(), 30)
        );
    }
    println!();
    println!("{} result(s).", items.len());
}

/// Offer partial matches after a failed name resolution.
fn suggest(rec: &Recommender, name: &str) {
    for fragment in name.split_whitespace() {
        let hits = rec.search(fragment);
        if !hits.is_empty() {
            println!("Did you mean:");
            for item in hits.iter().take(5) {
                println!("  {}", item.name);
            }
            return;
        }
    }
}

/// Clip a string to `width` characters with an ellipsis.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let clipped: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", clipped)
    }
}
