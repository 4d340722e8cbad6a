//! Dataset loading and normalization.
//!
//! The catalog lives in a flat CSV file (`anime.csv` by default) produced by
//! the fetch layer. This module reads the raw rows back, normalizes sparse
//! optional fields, and applies the working-set invariant: a row must carry a
//! non-empty name and at least one genre tag, or it is excluded from the
//! dataset entirely. Row order among surviving rows becomes the canonical
//! positional index shared with the similarity matrix.
//!
//! Missing or malformed optional fields never fail a load: a non-numeric
//! score normalizes to 0, an unknown episode count stays unknown.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Anime;

/// One CSV row, exactly as persisted by the fetch layer.
///
/// All fields are kept as text so that a sparse or hand-edited file still
/// deserializes; normalization happens in [`normalize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "anime_id", default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub genres: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub episodes: String,
    #[serde(default)]
    pub members: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub image_url: String,
}

/// Read all rows from a dataset CSV file.
pub fn read_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open dataset file: {}", path.display()))?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: RawRecord =
            row.with_context(|| format!("Malformed row in {}", path.display()))?;
        records.push(record);
    }

    debug!(rows = records.len(), path = %path.display(), "dataset read");
    Ok(records)
}

/// Write rows to a dataset CSV file, replacing any existing content.
pub fn write_csv(path: &Path, records: &[RawRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create dataset file: {}", path.display()))?;

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Normalize raw rows into the working set.
///
/// Rows with an empty name or no genre tags are dropped — they never appear
/// in search, filtering, or similarity computation. Surviving rows keep their
/// relative order.
pub fn normalize(records: Vec<RawRecord>) -> Vec<Anime> {
    let total = records.len();
    let items: Vec<Anime> = records.into_iter().filter_map(normalize_record).collect();

    if items.len() < total {
        debug!(
            dropped = total - items.len(),
            kept = items.len(),
            "rows excluded for missing name or genres"
        );
    }
    items
}

fn normalize_record(record: RawRecord) -> Option<Anime> {
    let name = record.name.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let genres: Vec<String> = record
        .genres
        .split(',')
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();
    if genres.is_empty() {
        return None;
    }

    let score = record
        .score
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite())
        .map_or(0.0, |s| s.clamp(0.0, 10.0));

    Some(Anime {
        id: record.id,
        name,
        genres,
        kind: non_empty(record.kind),
        score,
        episodes: record.episodes.trim().parse::<u32>().ok(),
        members: record.members.trim().parse::<u64>().unwrap_or(0),
        synopsis: non_empty(record.synopsis),
        image_url: non_empty(record.image_url),
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
