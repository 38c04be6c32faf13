//! Similarity scoring between songs.
//!
//! This module contains:
//! - Edit distance and string similarity (0-100)
//! - Weighted artist/title combination into one duplicate-likelihood score
//! - Length-only upper bounds used to skip comparisons that cannot matter

use crate::models::{MatchWeights, NormalizedIdentity, SimilarityResult, SongIdentity};

// ============================================================================
// String Similarity
// ============================================================================

/// Levenshtein distance counted in chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Similarity of two strings as a percentage, from normalized edit distance.
///
/// Equal strings score 100, including two empty strings. Callers decide
/// whether an empty-vs-empty comparison means anything.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 100.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }

    let distance = edit_distance(a, b);
    (100.0 * (1.0 - distance as f64 / max_len as f64)).clamp(0.0, 100.0)
}

/// Best similarity two strings of these lengths could possibly reach.
/// Edit distance is at least the length difference.
pub fn similarity_upper_bound(len_a: usize, len_b: usize) -> f64 {
    let max_len = len_a.max(len_b);
    if max_len == 0 {
        return 100.0;
    }
    let min_distance = len_a.abs_diff(len_b);
    100.0 * (1.0 - min_distance as f64 / max_len as f64)
}

// ============================================================================
// Song Similarity
// ============================================================================

fn combine(artist_similarity: f64, title_similarity: f64, weights: &MatchWeights) -> f64 {
    let total = weights.title + weights.artist;
    let raw = (weights.title * title_similarity + weights.artist * artist_similarity) / total;
    // Two decimals: identical songs land on exactly 100 for any weight split.
    ((raw * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

/// Score two already-normalized identities.
pub fn score_normalized(
    a: &NormalizedIdentity,
    b: &NormalizedIdentity,
    weights: &MatchWeights,
) -> SimilarityResult {
    let artist_similarity = string_similarity(&a.artist, &b.artist);
    let title_similarity = string_similarity(&a.title, &b.title);

    SimilarityResult {
        artist_similarity,
        title_similarity,
        combined_score: combine(artist_similarity, title_similarity, weights),
    }
}

/// Normalize both songs and score them with the given weights.
pub fn score_songs(a: &SongIdentity, b: &SongIdentity, weights: &MatchWeights) -> SimilarityResult {
    score_normalized(
        &NormalizedIdentity::from_song(a),
        &NormalizedIdentity::from_song(b),
        weights,
    )
}

/// Combined similarity of two songs (0-100) with the default weights.
/// Symmetric in `a` and `b`.
pub fn calculate_song_similarity(a: &SongIdentity, b: &SongIdentity) -> f64 {
    score_songs(a, b, &MatchWeights::default()).combined_score
}

/// Upper bound on `score_normalized(a, b, weights).combined_score` computed
/// from field lengths alone. Never below the real score.
pub fn max_possible_score(
    a: &NormalizedIdentity,
    b: &NormalizedIdentity,
    weights: &MatchWeights,
) -> f64 {
    let artist = similarity_upper_bound(a.artist.chars().count(), b.artist.chars().count());
    let title = similarity_upper_bound(a.title.chars().count(), b.title.chars().count());
    combine(artist, title, weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(artist: &str, title: &str) -> SongIdentity {
        SongIdentity::new(artist, title)
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("same", "same"), 0);
        assert_eq!(edit_distance("flaw", "lawn"), 2);
        // Counted in chars, not bytes
        assert_eq!(edit_distance("café", "cafe"), 1);
    }

    #[test]
    fn test_string_similarity() {
        assert_eq!(string_similarity("", ""), 100.0);
        assert_eq!(string_similarity("abc", "abc"), 100.0);
        assert_eq!(string_similarity("abc", ""), 0.0);
        assert_eq!(string_similarity("abc", "xyz"), 0.0);
        // kitten/sitting: 3 edits over 7 chars
        let s = string_similarity("kitten", "sitting");
        assert!((s - 100.0 * (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_identity_scores_100() {
        let s = song("Daft Punk", "One More Time");
        assert_eq!(calculate_song_similarity(&s, &s), 100.0);
        let empty = song("", "");
        assert_eq!(calculate_song_similarity(&empty, &empty), 100.0);
    }

    #[test]
    fn test_version_tag_invariance() {
        let a = song("Daft Punk", "One More Time");
        let b = song("Daft Punk", "One More Time (Radio Edit)");
        assert_eq!(calculate_song_similarity(&a, &b), 100.0);
    }

    #[test]
    fn test_article_invariance() {
        let a = song("The Beatles", "Let It Be");
        let b = song("Beatles", "Let It Be");
        assert!(calculate_song_similarity(&a, &b) >= 85.0);
    }

    #[test]
    fn test_distinct_titles_score_low() {
        let a = song("Daft Punk", "One More Time");
        let b = song("Daft Punk", "Around the World");
        assert!(calculate_song_similarity(&a, &b) < 60.0);
    }

    #[test]
    fn test_plain_ft_in_title_is_compared() {
        let a = song("Calvin Harris", "6 Ft Under");
        let b = song("Calvin Harris", "6 Ft Deep");
        let result = score_songs(&a, &b, &MatchWeights::default());
        assert_eq!(result.title_similarity, 60.0);
        assert_eq!(result.combined_score, 76.0);

        let c = song("Calvin Harris", "Hello (Clean Slate)");
        let d = song("Calvin Harris", "Hello");
        assert!(calculate_song_similarity(&c, &d) < 100.0);
    }

    #[test]
    fn test_title_match_survives_artist_typo() {
        let a = song("Daft Punk", "Harder Better Faster Stronger");
        let b = song("Daft Pnuk", "Harder, Better, Faster, Stronger");
        assert!(calculate_song_similarity(&a, &b) >= 90.0);
    }

    #[test]
    fn test_same_title_different_artist_is_weak() {
        let a = song("Leonard Cohen", "Hallelujah");
        let b = song("Jeff Buckley", "Hallelujah");
        assert!(calculate_song_similarity(&a, &b) < 70.0);
    }

    #[test]
    fn test_title_weighs_more_than_artist() {
        let w = MatchWeights::default();
        let title_only = score_songs(&song("aaaa", "same"), &song("zzzz", "same"), &w);
        let artist_only = score_songs(&song("same", "aaaa"), &song("same", "zzzz"), &w);
        assert!(title_only.combined_score > artist_only.combined_score);
    }

    #[test]
    fn test_upper_bound_dominates_score() {
        let w = MatchWeights::default();
        let pairs = [
            (song("Daft Punk", "One More Time"), song("Daft Punk", "Around the World")),
            (song("Beatles", "Yesterday"), song("Rolling Stones", "Angie")),
            (song("", "x"), song("abc", "")),
        ];
        for (a, b) in pairs {
            let na = NormalizedIdentity::from_song(&a);
            let nb = NormalizedIdentity::from_song(&b);
            assert!(max_possible_score(&na, &nb, &w) >= score_normalized(&na, &nb, &w).combined_score);
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn song_text() -> impl Strategy<Value = String> {
        prop::string::string_regex(r"[A-Za-z0-9 ()&'.-]{0,30}").unwrap()
    }

    fn any_song() -> impl Strategy<Value = SongIdentity> {
        (song_text(), song_text()).prop_map(|(artist, title)| SongIdentity::new(artist, title))
    }

    fn weights() -> impl Strategy<Value = MatchWeights> {
        (0.5f64..=1.0).prop_map(|share| MatchWeights::from_title_share(share).unwrap())
    }

    proptest! {
        #[test]
        fn song_similarity_is_symmetric(a in any_song(), b in any_song()) {
            prop_assert_eq!(calculate_song_similarity(&a, &b), calculate_song_similarity(&b, &a));
        }

        #[test]
        fn song_similarity_identity(a in any_song(), w in weights()) {
            prop_assert_eq!(score_songs(&a, &a, &w).combined_score, 100.0);
        }

        #[test]
        fn song_similarity_is_bounded(a in any_song(), b in any_song(), w in weights()) {
            let r = score_songs(&a, &b, &w);
            for v in [r.artist_similarity, r.title_similarity, r.combined_score] {
                prop_assert!(!v.is_nan());
                prop_assert!((0.0..=100.0).contains(&v), "out of range: {}", v);
            }
        }

        #[test]
        fn string_similarity_is_bounded(a in any::<String>(), b in any::<String>()) {
            let s = string_similarity(&a, &b);
            prop_assert!(!s.is_nan());
            prop_assert!((0.0..=100.0).contains(&s));
            prop_assert_eq!(s, string_similarity(&b, &a));
        }

        #[test]
        fn upper_bound_never_below_score(a in any_song(), b in any_song(), w in weights()) {
            let na = NormalizedIdentity::from_song(&a);
            let nb = NormalizedIdentity::from_song(&b);
            prop_assert!(max_possible_score(&na, &nb, &w) >= score_normalized(&na, &nb, &w).combined_score);
        }
    }
}
