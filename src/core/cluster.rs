use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of topic clusters profiles are grouped into
pub const CLUSTER_COUNT: usize = 5;

/// Vocabulary cap for the term-weighting vectorizer
pub const MAX_FEATURES: usize = 100;

const KMEANS_MAX_ITER: usize = 100;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("corpus is empty")]
    EmptyCorpus,
    #[error("corpus produced no usable terms")]
    EmptyVocabulary,
}

/// TF-IDF vectorizer fitted on a profile-text corpus
///
/// The vocabulary is capped at [`MAX_FEATURES`] terms, selected by document
/// frequency with lexicographic tie-breaking so fitting is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Fit vocabulary and inverse document frequencies on a corpus
    pub fn fit(corpus: &[String]) -> Result<Self, ClusterError> {
        if corpus.is_empty() {
            return Err(ClusterError::EmptyCorpus);
        }

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let mut seen: Vec<&str> = Vec::new();
            for token in tokenize(doc) {
                if !seen.contains(&token) {
                    seen.push(token);
                    *document_frequency.entry(token.to_string()).or_insert(0) += 1;
                }
            }
        }

        if document_frequency.is_empty() {
            return Err(ClusterError::EmptyVocabulary);
        }

        let mut terms: Vec<(String, usize)> = document_frequency.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(MAX_FEATURES);

        let n_docs = corpus.len() as f64;
        let mut vocabulary = Vec::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (term, df) in terms {
            idf.push(((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.push(term);
        }

        Ok(Self { vocabulary, idf })
    }

    /// Transform a text into an L2-normalized TF-IDF vector
    pub fn transform(&self, text: &str) -> Vec<f64> {
        let mut counts = vec![0usize; self.vocabulary.len()];
        for token in tokenize(text) {
            if let Some(index) = self.vocabulary.iter().position(|term| term == token) {
                counts[index] += 1;
            }
        }

        let mut vector: Vec<f64> = counts
            .iter()
            .zip(&self.idf)
            .map(|(&count, &idf)| count as f64 * idf)
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }

    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
}

/// Unsupervised grouping model over TF-IDF profile vectors
///
/// Plain Lloyd iterations with deterministic farthest-point seeding, so a
/// refit on the same corpus reproduces the same centroids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    vectorizer: TfidfVectorizer,
    centroids: Vec<Vec<f64>>,
}

impl ClusterModel {
    /// Fit the vectorizer and centroids on a representative corpus
    pub fn fit(corpus: &[String]) -> Result<Self, ClusterError> {
        let vectorizer = TfidfVectorizer::fit(corpus)?;
        let vectors: Vec<Vec<f64>> = corpus.iter().map(|doc| vectorizer.transform(doc)).collect();

        let k = CLUSTER_COUNT.min(vectors.len());
        let centroids = kmeans(&vectors, k);

        Ok(Self {
            vectorizer,
            centroids,
        })
    }

    /// Assign a text to its nearest cluster
    pub fn assign(&self, text: &str) -> i32 {
        let vector = self.vectorizer.transform(text);
        nearest_centroid(&self.centroids, &vector) as i32
    }

    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }
}

fn kmeans(vectors: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    debug_assert!(k > 0 && k <= vectors.len());

    // Farthest-point seeding: start from the highest-norm vector, then
    // repeatedly take the point farthest from its nearest chosen centroid.
    let first = vectors
        .iter()
        .enumerate()
        .max_by(|a, b| norm(a.1).partial_cmp(&norm(b.1)).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut centroids: Vec<Vec<f64>> = vec![vectors[first].clone()];
    while centroids.len() < k {
        let next = vectors
            .iter()
            .enumerate()
            .max_by(|a, b| {
                let da = min_distance(&centroids, a.1);
                let db = min_distance(&centroids, b.1);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        centroids.push(vectors[next].clone());
    }

    let dim = vectors[0].len();
    for _ in 0..KMEANS_MAX_ITER {
        let mut sums = vec![vec![0.0; dim]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];

        for vector in vectors {
            let cluster = nearest_centroid(&centroids, vector);
            counts[cluster] += 1;
            for (sum, value) in sums[cluster].iter_mut().zip(vector) {
                *sum += value;
            }
        }

        let mut moved = false;
        for (cluster, sum) in sums.into_iter().enumerate() {
            if counts[cluster] == 0 {
                continue;
            }
            let updated: Vec<f64> = sum.into_iter().map(|v| v / counts[cluster] as f64).collect();
            if squared_distance(&updated, &centroids[cluster]) > 1e-12 {
                centroids[cluster] = updated;
                moved = true;
            }
        }

        if !moved {
            break;
        }
    }

    centroids
}

fn nearest_centroid(centroids: &[Vec<f64>], vector: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::MAX;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(centroid, vector);
        if distance < best_distance {
            best_distance = distance;
            best = index;
        }
    }
    best
}

fn min_distance(centroids: &[Vec<f64>], vector: &[f64]) -> f64 {
    centroids
        .iter()
        .map(|c| squared_distance(c, vector))
        .fold(f64::MAX, f64::min)
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
