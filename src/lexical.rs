//! In-memory BM25 keyword index.
//!
//! Built over the same chunk set the vector store owns and rebuilt on every
//! chain construction; the build is cheap next to embedding cost, so it is
//! never persisted. Tokens are lowercase alphanumeric runs. Scores use
//! BM25 with k1 = 1.2, b = 0.75; ties are broken by chunk insertion order.

use std::collections::HashMap;

use crate::models::Chunk;

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// Keyword index over one chunk set. Candidates are keyed by insertion
/// order, matching the vector store's indices for the same build.
pub struct LexicalIndex {
    /// Per-chunk term frequencies.
    term_freqs: Vec<HashMap<String, usize>>,
    /// Number of chunks each term appears in.
    doc_freqs: HashMap<String, usize>,
    /// Per-chunk token counts.
    lengths: Vec<usize>,
    avg_length: f64,
}

impl LexicalIndex {
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        let mut lengths = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let tokens = tokenize(&chunk.text);
            lengths.push(tokens.len());

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let total: usize = lengths.iter().sum();
        let avg_length = if lengths.is_empty() {
            0.0
        } else {
            total as f64 / lengths.len() as f64
        };

        Self {
            term_freqs,
            doc_freqs,
            lengths,
            avg_length,
        }
    }

    pub fn len(&self) -> usize {
        self.term_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_freqs.is_empty()
    }

    /// Top `min(k, n)` chunks by BM25 score as `(insertion index, score)`
    /// pairs, descending, ties broken by insertion order. Chunks scoring
    /// zero (no query term present) are omitted.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut query_terms = tokenize(query);
        query_terms.sort();
        query_terms.dedup();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let n = self.term_freqs.len() as f64;
        let mut scored: Vec<(usize, f64)> = Vec::new();

        for (idx, freqs) in self.term_freqs.iter().enumerate() {
            let mut score = 0.0;
            for term in &query_terms {
                let tf = match freqs.get(term) {
                    Some(&tf) => tf as f64,
                    None => continue,
                };
                let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let length_norm = 1.0 - B + B * self.lengths[idx] as f64 / self.avg_length.max(1.0);
                score += idf * tf * (K1 + 1.0) / (tf + K1 * length_norm);
            }
            if score > 0.0 {
                scored.push((idx, score));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k.min(self.term_freqs.len()));
        scored
    }
}

/// Lowercase alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            metadata: Default::default(),
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("0", "the quick brown fox jumps over the lazy dog"),
            chunk("1", "a slow green turtle crawls under the log"),
            chunk("2", "fox fox fox den in the forest"),
            chunk("3", "completely unrelated text about pricing plans"),
        ]
    }

    #[test]
    fn matching_chunks_ranked_by_score() {
        let index = LexicalIndex::build(&corpus());
        let results = index.search("fox", 10);
        assert_eq!(results.len(), 2);
        // Chunk 2 repeats "fox" and is shorter, so it outranks chunk 0.
        assert_eq!(results[0].0, 2);
        assert_eq!(results[1].0, 0);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn non_matching_chunks_omitted() {
        let index = LexicalIndex::build(&corpus());
        let results = index.search("zeppelin", 10);
        assert!(results.is_empty());
    }

    #[test]
    fn k_clamps_result_count() {
        let index = LexicalIndex::build(&corpus());
        assert_eq!(index.search("the", 1).len(), 1);
        assert!(index.search("the", 100).len() <= 4);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let index = LexicalIndex::build(&corpus());
        assert!(index.search("", 5).is_empty());
        assert!(index.search("   ...   ", 5).is_empty());
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let chunks = vec![
            chunk("0", "apple banana"),
            chunk("1", "apple banana"),
            chunk("2", "apple banana"),
        ];
        let index = LexicalIndex::build(&chunks);
        let results = index.search("apple", 10);
        let order: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn tokenization_is_case_and_punctuation_insensitive() {
        let chunks = vec![chunk("0", "Refund-Policy: contact SUPPORT.")];
        let index = LexicalIndex::build(&chunks);
        assert_eq!(index.search("refund policy support", 5).len(), 1);
    }

    #[test]
    fn empty_corpus_yields_no_results() {
        let index = LexicalIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.search("anything", 3).is_empty());
    }
}
