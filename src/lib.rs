//! # anime-rec
//!
//! Content-based anime recommendations from TF-IDF similarity over
//! categorical features (genre tags and broadcast format).
//!
//! The catalog is fetched from the Jikan API into a flat CSV file. On load,
//! every surviving entry is reduced to one feature document, the corpus is
//! vectorized with TF-IDF, and an all-pairs cosine similarity matrix is
//! built. A synchronous query engine then answers search, ranked-neighbor,
//! filter, and top-K queries against that immutable snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────────────┐
//! │  Jikan   │──▶│  anime.csv  │──▶│  Recommender      │
//! │  fetch   │   │  (dataset)  │   │  TF-IDF + cosine  │
//! └──────────┘   └─────────────┘   └─────────┬─────────┘
//!                                            │
//!                               ┌────────────┤
//!                               ▼            ▼
//!                          ┌────────┐   ┌─────────┐
//!                          │  CLI   │   │ explain │
//!                          │(anirec)│   │ (Gemini)│
//!                          └────────┘   └─────────┘
//! ```
//!
//! The similarity engine has no network dependency and no randomness:
//! rebuilding from the same table yields a bit-identical matrix. The
//! explanation path is an external collaborator called by the CLI only.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`dataset`] | CSV persistence and row normalization |
//! | [`vectorize`] | Feature strings and TF-IDF vectorization |
//! | [`similarity`] | All-pairs cosine similarity matrix |
//! | [`engine`] | Search, recommend, filter, top-K queries |
//! | [`fetch`] | Jikan catalog fetch layer |
//! | [`explain`] | LLM explanation collaborator |
//! | [`stats`] | Dataset statistics |

pub mod config;
pub mod dataset;
pub mod engine;
pub mod explain;
pub mod fetch;
pub mod models;
pub mod similarity;
pub mod stats;
pub mod vectorize;
