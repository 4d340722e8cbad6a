//! The recommendation query engine.
//!
//! A [`Recommender`] is an immutable snapshot of one dataset load: the
//! working item table plus the similarity matrix derived from it, with row
//! `i` of the table owning row/column `i` of the matrix. Queries never
//! mutate the snapshot, so concurrent reads need no locking. Reloading is
//! done by building a fresh snapshot off to the side and swapping it in
//! through a [`SharedRecommender`], so no reader ever observes a table and
//! matrix from two different loads.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::dataset::{self, RawRecord};
use crate::models::{Anime, Recommendation};
use crate::similarity::SimilarityMatrix;
use crate::vectorize;

/// Errors surfaced by the query engine.
///
/// Everything else (missing optional fields, non-numeric scores) is
/// normalized away at load time rather than raised.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The load produced zero usable items; no matrix is built.
    #[error("dataset contains no usable entries (every row is missing a name or genres)")]
    EmptyDataset,

    /// Name resolution found no match. Recoverable: the caller can show
    /// suggestions from a partial search instead.
    #[error("no anime matching \"{0}\"")]
    NotFound(String),

    /// A count argument was zero.
    #[error("{0} must be a positive integer")]
    InvalidArgument(&'static str),
}

/// Conjunctive filter criteria. Unset fields pass everything.
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    /// Case-insensitive substring match against the genre list.
    pub genre: Option<String>,
    /// Minimum score, inclusive.
    pub min_score: Option<f64>,
    /// Maximum episode count, inclusive. Entries with an unknown episode
    /// count are excluded when this is set.
    pub max_episodes: Option<u32>,
    /// Exact broadcast format match.
    pub kind: Option<String>,
}

/// One loaded dataset snapshot: item table plus similarity matrix.
#[derive(Debug)]
pub struct Recommender {
    items: Vec<Anime>,
    matrix: SimilarityMatrix,
}

impl Recommender {
    /// Load raw records into a ready snapshot.
    ///
    /// Normalizes and filters the rows (see [`dataset::normalize`]), derives
    /// a feature document per surviving item, and builds the full pairwise
    /// similarity matrix. Fails with [`EngineError::EmptyDataset`] when no
    /// rows survive.
    pub fn load(records: Vec<RawRecord>) -> Result<Self, EngineError> {
        let items = dataset::normalize(records);
        if items.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let documents: Vec<String> = items.iter().map(vectorize::feature_string).collect();
        let tfidf = vectorize::build_matrix(&documents);
        let matrix = SimilarityMatrix::build(&tfidf);

        debug!(
            items = items.len(),
            vocab = tfidf.vocab_size(),
            "recommendation model built"
        );

        Ok(Self { items, matrix })
    }

    /// The working item table, in canonical positional order.
    pub fn items(&self) -> &[Anime] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The similarity matrix aligned with [`items`](Self::items).
    pub fn similarity_matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    /// Case-insensitive substring search over names and genre lists.
    ///
    /// An empty query returns the full dataset in table order.
    pub fn search(&self, query: &str) -> Vec<&Anime> {
        self.search_indices(query)
            .into_iter()
            .map(|i| &self.items[i])
            .collect()
    }

    fn search_indices(&self, query: &str) -> Vec<usize> {
        if query.is_empty() {
            return (0..self.items.len()).collect();
        }

        let needle = query.to_lowercase();
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.name.to_lowercase().contains(&needle)
                    || item.genres_joined().to_lowercase().contains(&needle)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Resolve a free-text name to the first matching item in table order.
    fn resolve(&self, name: &str) -> Result<usize, EngineError> {
        self.search_indices(name)
            .first()
            .copied()
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    /// Rank the nearest neighbors of the item resolved from `name`.
    ///
    /// Results are sorted by similarity descending; ties break by ascending
    /// positional index so output is deterministic. The resolved item itself
    /// is excluded. If fewer than `top_n` other items exist, all of them are
    /// returned.
    pub fn recommend(&self, name: &str, top_n: usize) -> Result<Vec<Recommendation<'_>>, EngineError> {
        if top_n == 0 {
            return Err(EngineError::InvalidArgument("top_n"));
        }
        let idx = self.resolve(name)?;

        let mut scored: Vec<(usize, f32)> = self
            .matrix
            .row(idx)
            .iter()
            .copied()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_n);

        Ok(scored
            .into_iter()
            .map(|(i, similarity)| Recommendation {
                anime: &self.items[i],
                similarity,
            })
            .collect())
    }

    /// Apply conjunctive filters, sorted by score descending.
    pub fn filter(&self, params: &FilterParams) -> Vec<&Anime> {
        let genre_needle = params.genre.as_ref().map(|g| g.to_lowercase());

        let mut matched: Vec<&Anime> = self
            .items
            .iter()
            .filter(|item| {
                if let Some(needle) = &genre_needle {
                    if !item.genres_joined().to_lowercase().contains(needle) {
                        return false;
                    }
                }
                if let Some(min) = params.min_score {
                    if item.score < min {
                        return false;
                    }
                }
                if let Some(max) = params.max_episodes {
                    match item.episodes {
                        Some(eps) if eps <= max => {}
                        _ => return false,
                    }
                }
                if let Some(kind) = &params.kind {
                    if item.kind.as_deref() != Some(kind.as_str()) {
                        return false;
                    }
                }
                true
            })
            .collect();

        // Stable sort: equal scores keep ascending positional order.
        matched.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matched
    }

    /// The `n` highest-scored items.
    pub fn top_by_score(&self, n: usize) -> Result<Vec<&Anime>, EngineError> {
        if n == 0 {
            return Err(EngineError::InvalidArgument("n"));
        }

        let mut ranked: Vec<&Anime> = self.items.iter().collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(n);
        Ok(ranked)
    }

    /// All item names in table order, for autocomplete-style consumption.
    pub fn all_names(&self) -> Vec<&str> {
        self.items.iter().map(|a| a.name.as_str()).collect()
    }

    /// Sorted distinct genre tags across the dataset.
    pub fn genre_list(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .items
            .iter()
            .flat_map(|a| a.genres.iter().map(String::as_str))
            .collect();
        set.into_iter().collect()
    }

    /// Sorted distinct broadcast formats across the dataset.
    pub fn kind_list(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.items.iter().filter_map(|a| a.kind.as_deref()).collect();
        set.into_iter().collect()
    }
}

/// Shared handle over the current snapshot.
///
/// Readers clone out an `Arc` and query it without holding any lock;
/// [`replace`](Self::replace) swaps in a fully built snapshot atomically.
pub struct SharedRecommender {
    inner: RwLock<Arc<Recommender>>,
}

impl SharedRecommender {
    pub fn new(recommender: Recommender) -> Self {
        Self {
            inner: RwLock::new(Arc::new(recommender)),
        }
    }

    /// The current snapshot. Queries against the returned `Arc` keep seeing
    /// the same table/matrix pair even across a concurrent reload.
    pub fn snapshot(&self) -> Arc<Recommender> {
        self.inner.read().unwrap().clone()
    }

    /// Swap in a new snapshot. In-flight readers finish on the old one.
    pub fn replace(&self, recommender: Recommender) {
        *self.inner.write().unwrap() = Arc::new(recommender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, name: &str, genres: &str, kind: &str, score: &str, episodes: &str) -> RawRecord {
        RawRecord {
            id,
            name: name.to_string(),
            genres: genres.to_string(),
            kind: kind.to_string(),
            score: score.to_string(),
            episodes: episodes.to_string(),
            ..RawRecord::default()
        }
    }

    /// The three-item corpus used across the engine tests.
    fn sample() -> Recommender {
        Recommender::load(vec![
            record(1, "A", "Action, Comedy", "TV", "8.0", "24"),
            record(2, "B", "Action, Drama", "TV", "7.5", "12"),
            record(3, "C", "Romance", "Movie", "6.0", "1"),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let err = Recommender::load(vec![record(1, "", "", "", "", "")]).unwrap_err();
        assert!(matches!(err, EngineError::EmptyDataset));
    }

    #[test]
    fn test_search_matches_name_and_genre() {
        let rec = sample();
        let hits: Vec<&str> = rec.search("action").iter().map(|a| a.name.as_str()).collect();
        assert_eq!(hits, vec!["A", "B"]);
    }

    #[test]
    fn test_search_empty_query_returns_all() {
        let rec = sample();
        assert_eq!(rec.search("").len(), 3);
    }

    #[test]
    fn test_recommend_orders_by_similarity() {
        let rec = sample();
        let recs = rec.recommend("A", 2).unwrap();
        let names: Vec<&str> = recs.iter().map(|r| r.anime.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert!(recs[0].similarity > recs[1].similarity);
    }

    #[test]
    fn test_recommend_never_returns_self() {
        let rec = sample();
        for name in ["A", "B", "C"] {
            let recs = rec.recommend(name, 10).unwrap();
            assert!(recs.iter().all(|r| r.anime.name != name));
        }
    }

    #[test]
    fn test_recommend_shortfall_is_not_an_error() {
        let rec = sample();
        let recs = rec.recommend("A", 50).unwrap();
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn test_recommend_zero_top_n_rejected() {
        let rec = sample();
        assert!(matches!(
            rec.recommend("A", 0),
            Err(EngineError::InvalidArgument("top_n"))
        ));
    }

    #[test]
    fn test_recommend_unknown_name() {
        let rec = sample();
        assert!(matches!(
            rec.recommend("does not exist", 5),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_recommend_tie_break_by_index() {
        // Two identical documents tie at similarity 1.0 with the query; the
        // lower positional index must come first.
        let rec = Recommender::load(vec![
            record(1, "Q", "Action", "TV", "5", ""),
            record(2, "T2", "Action", "TV", "5", ""),
            record(3, "T1", "Action", "TV", "5", ""),
        ])
        .unwrap();
        let recs = rec.recommend("Q", 2).unwrap();
        let names: Vec<&str> = recs.iter().map(|r| r.anime.name.as_str()).collect();
        assert_eq!(names, vec!["T2", "T1"]);
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let rec = sample();
        let params = FilterParams {
            genre: Some("action".to_string()),
            min_score: Some(7.8),
            ..FilterParams::default()
        };
        let hits: Vec<&str> = rec.filter(&params).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(hits, vec!["A"]);
    }

    #[test]
    fn test_filter_unset_passes_everything() {
        let rec = sample();
        let hits = rec.filter(&FilterParams::default());
        assert_eq!(hits.len(), 3);
        // Default presentation order is score descending.
        assert_eq!(hits[0].name, "A");
        assert_eq!(hits[2].name, "C");
    }

    #[test]
    fn test_filter_max_episodes_excludes_unknown_counts() {
        let rec = Recommender::load(vec![
            record(1, "Short", "Action", "TV", "7", "12"),
            record(2, "Unknown", "Action", "TV", "7", ""),
        ])
        .unwrap();
        let params = FilterParams {
            max_episodes: Some(24),
            ..FilterParams::default()
        };
        let hits: Vec<&str> = rec.filter(&params).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(hits, vec!["Short"]);
    }

    #[test]
    fn test_filter_kind_is_exact() {
        let rec = sample();
        let params = FilterParams {
            kind: Some("Movie".to_string()),
            ..FilterParams::default()
        };
        let hits: Vec<&str> = rec.filter(&params).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(hits, vec!["C"]);
    }

    #[test]
    fn test_top_by_score() {
        let rec = sample();
        let top: Vec<&str> = rec.top_by_score(1).unwrap().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(top, vec!["A"]);
        assert!(matches!(
            rec.top_by_score(0),
            Err(EngineError::InvalidArgument("n"))
        ));
    }

    #[test]
    fn test_all_names_in_table_order() {
        let rec = sample();
        assert_eq!(rec.all_names(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_genre_and_kind_lists_sorted_distinct() {
        let rec = sample();
        assert_eq!(rec.genre_list(), vec!["Action", "Comedy", "Drama", "Romance"]);
        assert_eq!(rec.kind_list(), vec!["Movie", "TV"]);
    }

    #[test]
    fn test_shared_swap_keeps_old_snapshot_alive() {
        let shared = SharedRecommender::new(sample());
        let before = shared.snapshot();

        let replacement =
            Recommender::load(vec![record(9, "Z", "Horror", "TV", "7", "")]).unwrap();
        shared.replace(replacement);

        // The old Arc still answers against the old table/matrix pair.
        assert_eq!(before.len(), 3);
        assert_eq!(shared.snapshot().len(), 1);
    }
}
