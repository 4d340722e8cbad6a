//! Dataset statistics overview.
//!
//! Gives a quick summary of the loaded snapshot: entry count, rating
//! distribution, genre and format breakdowns. Used by `anirec stats` for
//! confidence that fetches are accumulating a usable catalog.

use std::collections::HashMap;

use crate::engine::Recommender;

/// Run the stats command: summarize the snapshot and print it.
pub fn run_stats(recommender: &Recommender) {
    let items = recommender.items();
    let n = items.len();

    let rated: Vec<f64> = items.iter().map(|a| a.score).filter(|s| *s > 0.0).collect();
    let mean_score = if rated.is_empty() {
        0.0
    } else {
        rated.iter().sum::<f64>() / rated.len() as f64
    };
    let total_episodes: u64 = items.iter().filter_map(|a| a.episodes).map(u64::from).sum();

    println!("anime-rec — Dataset Stats");
    println!("=========================");
    println!();
    println!("  Entries:        {}", n);
    println!("  Rated entries:  {}", rated.len());
    println!("  Mean score:     {:.2}", mean_score);
    println!("  Total episodes: {}", total_episodes);
    println!("  Genres:         {}", recommender.genre_list().len());
    println!("  Formats:        {}", recommender.kind_list().join(", "));

    // Genre breakdown, most common first
    let mut genre_counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        for genre in &item.genres {
            *genre_counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }
    let mut genres: Vec<(&str, usize)> = genre_counts.into_iter().collect();
    genres.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    if !genres.is_empty() {
        println!();
        println!("  Top genres:");
        println!("  {:<20} {:>6}", "GENRE", "COUNT");
        println!("  {}", "-".repeat(27));
        for (genre, count) in genres.iter().take(10) {
            println!("  {:<20} {:>6}", genre, count);
        }
    }

    // Format breakdown
    let mut kind_counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        let kind = item.kind.as_deref().unwrap_or("Unknown");
        *kind_counts.entry(kind).or_insert(0) += 1;
    }
    let mut kinds: Vec<(&str, usize)> = kind_counts.into_iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    println!();
    println!("  By format:");
    for (kind, count) in &kinds {
        println!("  {:<20} {:>6}", kind, count);
    }
    println!();
}
