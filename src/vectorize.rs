//! Feature strings and TF-IDF vectorization.
//!
//! Each catalog entry is reduced to one text document: its genre tags joined
//! by spaces, followed by its broadcast format. The corpus of documents is
//! vectorized with smoothed TF-IDF over a corpus-derived vocabulary, with
//! common English function words excluded, and every document vector is
//! L2-normalized so that cosine similarity reduces to a sparse dot product.
//!
//! Vocabulary term ids are assigned in sorted term order, which makes the
//! resulting matrix bit-reproducible for a fixed input table.

use std::collections::{BTreeMap, HashMap};

use crate::models::Anime;

/// Function words excluded from the vocabulary.
///
/// Genre and format tokens are rarely function words, but titles of tags
/// like "Slice of Life" contain them, and they carry no discriminative
/// signal across the corpus.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my", "no",
    "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out",
    "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "you", "your", "yours",
];

/// Sparse TF-IDF document-term matrix.
///
/// One row per document, in corpus order. Rows hold `(term_id, weight)`
/// pairs sorted by term id, and each row is L2-normalized (all-zero rows
/// stay all-zero).
#[derive(Debug, Clone)]
pub struct TfidfMatrix {
    rows: Vec<Vec<(u32, f32)>>,
    vocab_size: usize,
}

impl TfidfMatrix {
    /// Number of document rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct vocabulary terms.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// The sparse weight row for document `i`, sorted by term id.
    pub fn row(&self, i: usize) -> &[(u32, f32)] {
        &self.rows[i]
    }
}

/// Derive the feature document for a catalog entry.
///
/// Genre tags in original order joined by single spaces, then a space and
/// the broadcast format (empty when absent).
pub fn feature_string(anime: &Anime) -> String {
    let mut doc = anime.genres.join(" ");
    doc.push(' ');
    if let Some(kind) = &anime.kind {
        doc.push_str(kind);
    }
    doc
}

/// Split a document into lowercase tokens of two or more alphanumeric
/// characters, with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .filter(|t| !ENGLISH_STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Vectorize a document corpus into a [`TfidfMatrix`].
///
/// Term weights use smoothed inverse document frequency,
/// `idf(t) = ln((1 + n) / (1 + df(t))) + 1`, multiplied by the raw term
/// count per document, then each row is L2-normalized.
pub fn build_matrix(documents: &[String]) -> TfidfMatrix {
    let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

    // Document frequency per term. BTreeMap gives sorted term ids.
    let mut doc_freq: BTreeMap<&str, u32> = BTreeMap::new();
    for tokens in &tokenized {
        let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for term in seen {
            *doc_freq.entry(term).or_insert(0) += 1;
        }
    }

    let vocab: HashMap<&str, u32> = doc_freq
        .keys()
        .enumerate()
        .map(|(id, term)| (*term, id as u32))
        .collect();

    let n_docs = documents.len() as f32;
    let idf: Vec<f32> = doc_freq
        .values()
        .map(|df| ((1.0 + n_docs) / (1.0 + *df as f32)).ln() + 1.0)
        .collect();

    let rows = tokenized
        .iter()
        .map(|tokens| {
            let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
            for token in tokens {
                if let Some(&term_id) = vocab.get(token.as_str()) {
                    *counts.entry(term_id).or_insert(0.0) += 1.0;
                }
            }

            let mut row: Vec<(u32, f32)> = counts
                .into_iter()
                .map(|(term_id, tf)| (term_id, tf * idf[term_id as usize]))
                .collect();

            let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
            if norm > f32::EPSILON {
                for (_, w) in &mut row {
                    *w /= norm;
                }
            }
            row
        })
        .collect();

    TfidfMatrix {
        rows,
        vocab_size: vocab.len(),
    }
}
