//! Hybrid score fusion.
//!
//! Pure functions combining one keyword candidate set and one semantic
//! candidate set into a single ranked list:
//!
//! 1. Min-max normalize each side's raw scores to `[0, 1]`.
//! 2. Fuse per chunk: `score = (1 - α)·keyword + α·semantic`. A chunk
//!    present in both sets collects both terms, which is what rewards
//!    agreement between the two retrievers.
//! 3. Order by fused score desc, then semantic desc, then keyword desc,
//!    then insertion order. Truncate to `k`.
//!
//! Candidates are `(insertion index, raw score)` pairs; both indexes are
//! built over the same chunk set, so insertion order is a shared key.

use std::collections::HashMap;

/// A fused candidate with its score breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    /// Chunk insertion index within the build.
    pub index: usize,
    /// Fused score in `[0, 1]`.
    pub score: f64,
    /// Normalized keyword score (0.0 when absent from keyword candidates).
    pub keyword_score: f64,
    /// Normalized semantic score (0.0 when absent from vector candidates).
    pub semantic_score: f64,
}

/// Min-max normalize raw scores to `[0.0, 1.0]`. All-equal scores map to 1.0.
pub fn normalize_scores(candidates: &[(usize, f64)]) -> Vec<(usize, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|(idx, s)| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            };
            (*idx, norm)
        })
        .collect()
}

/// Fuse keyword and semantic candidate sets into at most `k` ranked hits.
pub fn fuse(
    keyword: &[(usize, f64)],
    semantic: &[(usize, f64)],
    alpha: f64,
    k: usize,
) -> Vec<FusedHit> {
    let kw_map: HashMap<usize, f64> = normalize_scores(keyword).into_iter().collect();
    let sem_map: HashMap<usize, f64> = normalize_scores(semantic).into_iter().collect();

    let mut indices: Vec<usize> = kw_map.keys().chain(sem_map.keys()).copied().collect();
    indices.sort_unstable();
    indices.dedup();

    let mut hits: Vec<FusedHit> = indices
        .into_iter()
        .map(|index| {
            let keyword_score = kw_map.get(&index).copied().unwrap_or(0.0);
            let semantic_score = sem_map.get(&index).copied().unwrap_or(0.0);
            FusedHit {
                index,
                score: (1.0 - alpha) * keyword_score + alpha * semantic_score,
                keyword_score,
                semantic_score,
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.semantic_score
                    .partial_cmp(&a.semantic_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                b.keyword_score
                    .partial_cmp(&a.keyword_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.index.cmp(&b.index))
    });
    hits.truncate(k);
    hits
}
