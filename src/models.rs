//! Core data models used throughout anime-rec.
//!
//! These types represent the catalog entries and ranked results that flow
//! through the dataset loader, similarity builder, and query engine.

use serde::Serialize;

/// A normalized catalog entry.
///
/// Produced by the dataset loader from a [`RawRecord`](crate::dataset::RawRecord).
/// Every `Anime` held by the engine satisfies the working-set invariant:
/// non-empty `name` and at least one genre tag.
#[derive(Debug, Clone, Serialize)]
pub struct Anime {
    /// Stable catalog identifier (Jikan `mal_id`). Never reassigned.
    pub id: u32,
    /// Display title; primary user-facing lookup key (case-insensitive).
    pub name: String,
    /// Genre tags in original catalog order.
    pub genres: Vec<String>,
    /// Broadcast format (TV, Movie, OVA, ...); absent for some entries.
    pub kind: Option<String>,
    /// Community rating in `[0.0, 10.0]`; missing ratings normalize to 0.
    pub score: f64,
    /// Episode count; `None` for entries the catalog has no count for.
    pub episodes: Option<u32>,
    /// Number of community members tracking the entry.
    pub members: u64,
    /// Short plot summary, when the catalog provides one.
    pub synopsis: Option<String>,
    /// Cover image URL, when the catalog provides one.
    pub image_url: Option<String>,
}

impl Anime {
    /// Genre tags joined with `", "`, matching the source CSV form.
    pub fn genres_joined(&self) -> String {
        self.genres.join(", ")
    }
}

/// A ranked neighbor returned by [`Recommender::recommend`](crate::engine::Recommender::recommend).
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation<'a> {
    /// The recommended entry.
    pub anime: &'a Anime,
    /// Cosine similarity to the query entry, in `[0.0, 1.0]`.
    pub similarity: f32,
}
