//! Catalog fetch layer against the Jikan REST API.
//!
//! Pages through `GET /anime?page=N&limit=L&order_by=popularity`, converts
//! each payload entry into a [`RawRecord`], deduplicates by catalog id, and
//! persists the combined dataset back to the CSV file. A genre name narrows
//! the listing to one genre via the `genres` query parameter. The similarity
//! engine never touches the network; this module is its only upstream.
//!
//! Jikan is rate limited. A 429 response pauses for
//! `fetch.rate_limit_wait_secs` and retries the same page (bounded by
//! `fetch.max_attempts`); other non-success statuses skip the page with a
//! warning. The CSV file is rewritten in one pass at the end, so a failed
//! run never corrupts the existing dataset.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Config, FetchConfig};
use crate::dataset::{self, RawRecord};

/// Jikan genre ids for the genres the catalog is commonly narrowed to.
///
/// The full list lives at `GET /genres/anime`; these are the stable MAL ids.
const GENRE_IDS: &[(&str, u32)] = &[
    ("Action", 1),
    ("Adventure", 2),
    ("Comedy", 4),
    ("Drama", 8),
    ("Fantasy", 10),
    ("Horror", 14),
    ("Romance", 22),
    ("Sci-Fi", 24),
    ("Sports", 30),
    ("Supernatural", 37),
    ("Thriller", 41),
];

/// Look up the Jikan id for a genre name, case-insensitively.
pub fn genre_id(name: &str) -> Option<u32> {
    GENRE_IDS
        .iter()
        .find(|(genre, _)| genre.eq_ignore_ascii_case(name))
        .map(|&(_, id)| id)
}

fn known_genres() -> String {
    GENRE_IDS
        .iter()
        .map(|&(genre, _)| genre)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One entry of the Jikan `data[]` payload, reduced to the fields we keep.
#[derive(Debug, Deserialize)]
struct ApiAnime {
    mal_id: u32,
    title: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    genres: Vec<ApiGenre>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    episodes: Option<u32>,
    #[serde(default)]
    members: Option<u64>,
    #[serde(default)]
    synopsis: Option<String>,
    #[serde(default)]
    images: Option<ApiImages>,
}

#[derive(Debug, Deserialize)]
struct ApiGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiImages {
    #[serde(default)]
    jpg: Option<ApiImageSet>,
}

#[derive(Debug, Deserialize)]
struct ApiImageSet {
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    data: Vec<ApiAnime>,
}

/// Counters reported after a fetch run.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub added: usize,
    pub duplicates: usize,
    pub pages_fetched: u32,
    pub pages_skipped: u32,
    pub total: usize,
}

/// Run the fetch command: page through the catalog and update the CSV.
///
/// In append mode (the default) existing rows are kept and only unseen ids
/// are added; `overwrite` discards the existing file. A `genre` narrows the
/// listing to titles carrying that genre.
pub async fn run_fetch(
    config: &Config,
    pages: Option<u32>,
    genre: Option<&str>,
    overwrite: bool,
) -> Result<FetchSummary> {
    let path = &config.dataset.path;
    let pages = pages.unwrap_or(config.fetch.pages);

    let genre_filter = match genre {
        Some(name) => Some(genre_id(name).ok_or_else(|| {
            anyhow::anyhow!("Unknown genre '{}'. Available: {}", name, known_genres())
        })?),
        None => None,
    };

    let mut records: Vec<RawRecord> = if !overwrite && path.exists() {
        dataset::read_csv(path)?
    } else {
        Vec::new()
    };
    let mut seen: HashSet<u32> = records.iter().map(|r| r.id).collect();

    println!(
        "Fetching up to {} page(s) from {} ({} existing entries)",
        pages,
        config.fetch.base_url,
        records.len()
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let mut summary = FetchSummary::default();

    for page in 1..=pages {
        match fetch_page(&client, config, page, genre_filter).await {
            Ok(Some(payload)) => {
                let mut page_added = 0usize;
                for entry in payload.data {
                    if !seen.insert(entry.mal_id) {
                        summary.duplicates += 1;
                        continue;
                    }
                    records.push(to_record(entry));
                    page_added += 1;
                }
                summary.added += page_added;
                summary.pages_fetched += 1;
                println!("  page {}/{}: {} new", page, pages, page_added);
            }
            Ok(None) => {
                summary.pages_skipped += 1;
            }
            Err(e) => {
                warn!(page, error = %e, "page fetch failed, skipping");
                summary.pages_skipped += 1;
            }
        }

        if page < pages {
            tokio::time::sleep(Duration::from_millis(config.fetch.delay_ms)).await;
        }
    }

    if summary.added > 0 {
        dataset::write_csv(path, &records)
            .with_context(|| format!("Failed to write dataset: {}", path.display()))?;
    }
    summary.total = records.len();

    println!();
    println!("Fetch complete");
    println!("  Added:      {}", summary.added);
    println!("  Duplicates: {}", summary.duplicates);
    println!(
        "  Pages:      {} fetched, {} skipped",
        summary.pages_fetched, summary.pages_skipped
    );
    println!("  Dataset:    {} entries in {}", summary.total, path.display());

    Ok(summary)
}

/// Fetch one catalog page.
///
/// `Ok(None)` means the page was given up on after exhausting attempts or
/// hitting a non-retryable status.
async fn fetch_page(
    client: &reqwest::Client,
    config: &Config,
    page: u32,
    genre: Option<u32>,
) -> Result<Option<ApiPage>> {
    let url = page_url(&config.fetch, page, genre);

    for attempt in 1..=config.fetch.max_attempts {
        let response = client.get(&url).send().await?;
        let status = response.status();

        if status.is_success() {
            let payload: ApiPage = response
                .json()
                .await
                .with_context(|| format!("Invalid JSON payload for page {}", page))?;
            return Ok(Some(payload));
        }

        if status.as_u16() == 429 && attempt < config.fetch.max_attempts {
            debug!(page, attempt, "rate limited, waiting before retry");
            tokio::time::sleep(Duration::from_secs(config.fetch.rate_limit_wait_secs)).await;
            continue;
        }

        warn!(page, %status, "unexpected status");
        return Ok(None);
    }

    Ok(None)
}

fn page_url(fetch: &FetchConfig, page: u32, genre: Option<u32>) -> String {
    let mut url = format!(
        "{}/anime?page={}&limit={}&order_by=popularity",
        fetch.base_url, page, fetch.page_limit
    );
    if let Some(id) = genre {
        url.push_str(&format!("&genres={}", id));
    }
    url
}

fn to_record(entry: ApiAnime) -> RawRecord {
    let genres = entry
        .genres
        .iter()
        .map(|g| g.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    RawRecord {
        id: entry.mal_id,
        name: entry.title,
        score: entry.score.map(|s| s.to_string()).unwrap_or_default(),
        genres,
        kind: entry.kind.unwrap_or_default(),
        episodes: entry.episodes.map(|e| e.to_string()).unwrap_or_default(),
        members: entry.members.map(|m| m.to_string()).unwrap_or_default(),
        synopsis: entry.synopsis.unwrap_or_default(),
        image_url: entry
            .images
            .and_then(|i| i.jpg)
            .and_then(|j| j.image_url)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_to_record() {
        let json = serde_json::json!({
            "mal_id": 1,
            "title": "Cowboy Bebop",
            "score": 8.75,
            "genres": [{"name": "Action"}, {"name": "Sci-Fi"}],
            "type": "TV",
            "episodes": 26,
            "members": 1_900_000,
            "synopsis": "Bounty hunters in space.",
            "images": {"jpg": {"image_url": "https://example/bebop.jpg"}}
        });
        let entry: ApiAnime = serde_json::from_value(json).unwrap();
        let record = to_record(entry);

        assert_eq!(record.id, 1);
        assert_eq!(record.genres, "Action, Sci-Fi");
        assert_eq!(record.score, "8.75");
        assert_eq!(record.episodes, "26");
    }

    #[test]
    fn test_sparse_payload_tolerated() {
        // Jikan nulls out fields freely; only id and title are required.
        let json = serde_json::json!({
            "mal_id": 40,
            "title": "Obscure OVA",
            "score": null,
            "type": null,
            "episodes": null
        });
        let entry: ApiAnime = serde_json::from_value(json).unwrap();
        let record = to_record(entry);

        assert_eq!(record.name, "Obscure OVA");
        assert!(record.score.is_empty());
        assert!(record.genres.is_empty());
        assert!(record.image_url.is_empty());
    }

    #[test]
    fn test_genre_lookup_is_case_insensitive() {
        assert_eq!(genre_id("Action"), Some(1));
        assert_eq!(genre_id("sci-fi"), Some(24));
        assert_eq!(genre_id("THRILLER"), Some(41));
        assert_eq!(genre_id("Isekai"), None);
    }

    #[test]
    fn test_page_url_with_and_without_genre() {
        let fetch = FetchConfig::default();
        assert_eq!(
            page_url(&fetch, 3, None),
            "https://api.jikan.moe/v4/anime?page=3&limit=25&order_by=popularity"
        );
        assert_eq!(
            page_url(&fetch, 1, Some(22)),
            "https://api.jikan.moe/v4/anime?page=1&limit=25&order_by=popularity&genres=22"
        );
    }

    #[tokio::test]
    async fn test_unknown_genre_is_rejected_before_any_request() {
        let config = Config::default();
        let err = run_fetch(&config, Some(1), Some("Isekai"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown genre 'Isekai'"));
    }
}
