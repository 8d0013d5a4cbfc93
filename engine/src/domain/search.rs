//! Free-text relevance ranking over the POI snapshot.

use serde::Serialize;

use super::poi::Poi;

/// Queries shorter than this, after trimming, match nothing.
pub const MIN_QUERY_CHARS: usize = 2;

/// Upper bound on returned results.
pub const MAX_RESULTS: usize = 50;

const NAME_POINTS: u32 = 10;
const CATEGORY_POINTS: u32 = 5;
const DESCRIPTION_POINTS: u32 = 2;
const QUALITY_RATING: f64 = 4.0;

/// A POI paired with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// Matched POI.
    pub poi: Poi,
    /// Accumulated score; always positive.
    pub score: u32,
}

/// Score one POI against pre-lowercased query terms.
///
/// Each term contributes the points of the first field it appears in
/// (name, then category, then description). The rating and verified
/// bonuses apply whether or not any term matched.
pub fn score(poi: &Poi, terms: &[&str]) -> u32 {
    let name = poi.name.to_lowercase();
    let category = poi.category.to_lowercase();
    let description = poi.description.to_lowercase();

    let matched: u32 = terms
        .iter()
        .map(|term| {
            if name.contains(term) {
                NAME_POINTS
            } else if category.contains(term) {
                CATEGORY_POINTS
            } else if description.contains(term) {
                DESCRIPTION_POINTS
            } else {
                0
            }
        })
        .sum();
    matched + u32::from(poi.rating >= QUALITY_RATING) + u32::from(poi.is_verified)
}

/// Rank `pois` against `query`.
///
/// Results are ordered by descending score; equal scores keep their input
/// order. At most [`MAX_RESULTS`] are returned.
///
/// # Examples
/// ```
/// use map_engine::domain::search::search;
///
/// assert!(search(" a ", &[]).is_empty());
/// ```
pub fn search(query: &str, pois: &[Poi]) -> Vec<RankedResult> {
    let normalized = query.trim().to_lowercase();
    if normalized.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }
    let terms: Vec<&str> = normalized.split_whitespace().collect();

    let mut ranked: Vec<RankedResult> = pois
        .iter()
        .filter_map(|poi| {
            let score = score(poi, &terms);
            (score > 0).then(|| RankedResult {
                poi: poi.clone(),
                score,
            })
        })
        .collect();
    ranked.sort_by(|left, right| right.score.cmp(&left.score));
    ranked.truncate(MAX_RESULTS);
    ranked
}
