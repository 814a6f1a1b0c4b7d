//! Pairwise image similarity from tag and color overlap.

use std::collections::HashSet;

use crate::models::annotation::AnnotationResult;

/// Weight of tag overlap in the combined score.
const TAG_WEIGHT: f64 = 0.7;

/// Weight of color overlap in the combined score.
const COLOR_WEIGHT: f64 = 0.3;

/// Rank `candidates` by similarity to `target`.
///
/// Each candidate scores `0.7 * jaccard(tags) + 0.3 * jaccard(colors)`.
/// Zero-scoring candidates are excluded, the rest are sorted descending with
/// a stable tie-break on input order, and the result is truncated to `limit`.
pub fn rank(
    target: &AnnotationResult,
    candidates: &[(i64, AnnotationResult)],
    limit: usize,
) -> Vec<(i64, f64)> {
    let mut scored: Vec<(i64, f64)> = candidates
        .iter()
        .map(|(id, candidate)| (*id, score(target, candidate)))
        .filter(|(_, s)| *s > 0.0)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Combined similarity of two annotation results, in [0, 1].
pub fn score(a: &AnnotationResult, b: &AnnotationResult) -> f64 {
    TAG_WEIGHT * jaccard(&a.tags, &b.tags) + COLOR_WEIGHT * jaccard(&a.colors, &b.colors)
}

/// Jaccard index of two string sets; 0 when the union is empty.
fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(tags: &[&str], colors: &[&str]) -> AnnotationResult {
        AnnotationResult {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            description: "test image".to_string(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_identical_sets_score_one() {
        let a = annotations(&["cat", "dog"], &["#112233", "#445566", "#778899"]);
        let b = a.clone();
        assert!((score(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_sets_excluded_from_ranking() {
        let target = annotations(&["cat"], &["#000000", "#111111", "#222222"]);
        let other = annotations(&["boat"], &["#333333", "#444444", "#555555"]);
        assert_eq!(score(&target, &other), 0.0);
        assert!(rank(&target, &[(1, other)], 10).is_empty());
    }

    #[test]
    fn test_tag_overlap_outweighs_color_overlap() {
        let target = annotations(&["cat", "dog"], &["#000000", "#111111", "#222222"]);
        let tag_match = annotations(&["cat", "dog"], &["#333333", "#444444", "#555555"]);
        let color_match = annotations(&["boat"], &["#000000", "#111111", "#222222"]);

        let ranked = rank(&target, &[(1, color_match), (2, tag_match)], 10);
        assert_eq!(ranked[0].0, 2);
        assert!((ranked[0].1 - TAG_WEIGHT).abs() < 1e-9);
        assert!((ranked[1].1 - COLOR_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_stable_order_on_equal_scores() {
        let target = annotations(&["cat"], &["#000000", "#111111", "#222222"]);
        let twin = annotations(&["cat"], &["#000000", "#111111", "#222222"]);
        let ranked = rank(&target, &[(5, twin.clone()), (3, twin)], 10);
        assert_eq!(ranked.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![5, 3]);
    }

    #[test]
    fn test_truncates_to_limit() {
        let target = annotations(&["cat"], &["#000000", "#111111", "#222222"]);
        let candidates: Vec<(i64, AnnotationResult)> = (0..8)
            .map(|i| (i, annotations(&["cat"], &["#000000", "#111111", "#222222"])))
            .collect();
        assert_eq!(rank(&target, &candidates, 3).len(), 3);
    }

    #[test]
    fn test_partial_overlap() {
        // tags: {cat, dog} vs {cat, bird} -> 1/3; colors identical -> 1.0
        let a = annotations(&["cat", "dog"], &["#000000", "#111111", "#222222"]);
        let b = annotations(&["cat", "bird"], &["#000000", "#111111", "#222222"]);
        let expected = TAG_WEIGHT / 3.0 + COLOR_WEIGHT;
        assert!((score(&a, &b) - expected).abs() < 1e-9);
    }
}
