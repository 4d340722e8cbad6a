//! All-pairs cosine similarity matrix.
//!
//! Built once per dataset load from the TF-IDF matrix and read-only
//! afterward. Row and column `i` refer to the same item as row `i` of the
//! working dataset; the query engine depends on that alignment and the
//! matrix is rebuilt wholesale whenever the dataset is.
//!
//! Because TF-IDF rows are L2-normalized, cosine similarity is the sparse
//! dot product of two rows. The diagonal is pinned to exactly 1.0 and all
//! entries are clamped to `[0, 1]`.

use crate::vectorize::TfidfMatrix;

/// Square, symmetric similarity matrix stored row-major.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    n: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    /// Compute the full pairwise matrix from TF-IDF document rows.
    pub fn build(tfidf: &TfidfMatrix) -> Self {
        let n = tfidf.len();
        let mut data = vec![0.0f32; n * n];

        for i in 0..n {
            data[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let sim = sparse_dot(tfidf.row(i), tfidf.row(j)).clamp(0.0, 1.0);
                data[i * n + j] = sim;
                data[j * n + i] = sim;
            }
        }

        Self { n, data }
    }

    /// Number of items (rows and columns).
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Similarity between items `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.n + j]
    }

    /// The full similarity row for item `i`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}

/// Dot product of two sparse rows sorted by term id.
fn sparse_dot(a: &[(u32, f32)], b: &[(u32, f32)]) -> f32 {
    let mut dot = 0.0f32;
    let (mut ia, mut ib) = (0, 0);

    while ia < a.len() && ib < b.len() {
        match a[ia].0.cmp(&b[ib].0) {
            std::cmp::Ordering::Less => ia += 1,
            std::cmp::Ordering::Greater => ib += 1,
            std::cmp::Ordering::Equal => {
                dot += a[ia].1 * b[ib].1;
                ia += 1;
                ib += 1;
            }
        }
    }
    dot
}
