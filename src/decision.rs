//! Duplicate decision for a single pair of songs.
//!
//! `are_songs_duplicate` is the pure threshold check. `classify_pair` is the
//! full caller-side decision tree: identifier first, then the empty-field
//! guard, then fuzzy scoring.

use serde::Serialize;

use crate::models::{MatchWeights, NormalizedIdentity, SimilarityResult, SongIdentity};
use crate::normalize::normalize_external_id;
use crate::similarity::{calculate_song_similarity, score_normalized};

/// True when the combined similarity of `a` and `b` reaches `threshold`.
///
/// Does not look at external ids. Thresholds above 100 never match.
pub fn are_songs_duplicate(a: &SongIdentity, b: &SongIdentity, threshold: u8) -> bool {
    calculate_song_similarity(a, b) >= f64::from(threshold)
}

/// True when both songs carry the same canonical external id (ISRC).
pub fn is_exact_identifier_match(a: &SongIdentity, b: &SongIdentity) -> bool {
    let a_id = a.external_id.as_deref().and_then(normalize_external_id);
    let b_id = b.external_id.as_deref().and_then(normalize_external_id);
    matches!((a_id, b_id), (Some(x), Some(y)) if x == y)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PairVerdict {
    ExactIdentifier,
    /// One side has an empty normalized artist or title.
    Unscorable,
    FuzzyDuplicate(SimilarityResult),
    Distinct(SimilarityResult),
}

impl PairVerdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            PairVerdict::ExactIdentifier | PairVerdict::FuzzyDuplicate(_)
        )
    }
}

/// Decide whether two songs are the same recording.
pub fn classify_pair(
    a: &SongIdentity,
    b: &SongIdentity,
    threshold: u8,
    weights: &MatchWeights,
) -> PairVerdict {
    if is_exact_identifier_match(a, b) {
        return PairVerdict::ExactIdentifier;
    }

    let na = NormalizedIdentity::from_song(a);
    let nb = NormalizedIdentity::from_song(b);
    if na.is_incomplete() || nb.is_incomplete() {
        return PairVerdict::Unscorable;
    }

    let result = score_normalized(&na, &nb, weights);
    if result.meets(threshold) {
        PairVerdict::FuzzyDuplicate(result)
    } else {
        PairVerdict::Distinct(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        let a = SongIdentity::new("Daft Punk", "One More Time");
        let b = SongIdentity::new("Daft Punk", "Around the World");
        let score = calculate_song_similarity(&a, &b);

        assert!(are_songs_duplicate(&a, &b, 0));
        assert!(!are_songs_duplicate(&a, &b, 70));
        assert!(are_songs_duplicate(&a, &a, 100));
        assert!(!are_songs_duplicate(&a, &a, 101));
        assert!(are_songs_duplicate(&a, &b, score.floor() as u8));
    }

    #[test]
    fn test_exact_identifier_match() {
        let a = SongIdentity::new("Queen", "Bohemian Rhapsody").with_external_id("GB-UM7-10-00001");
        let b = SongIdentity::new("Totally Different", "Text").with_external_id("gbum71000001");
        let c = SongIdentity::new("Queen", "Bohemian Rhapsody");
        let blank = SongIdentity::new("Queen", "Bohemian Rhapsody").with_external_id("  ");

        assert!(is_exact_identifier_match(&a, &b));
        assert!(!is_exact_identifier_match(&a, &c));
        assert!(!is_exact_identifier_match(&c, &c));
        assert!(!is_exact_identifier_match(&blank, &blank));
    }

    #[test]
    fn test_identifier_dominates_fuzzy_score() {
        let a = SongIdentity::new("Queen", "Bohemian Rhapsody").with_external_id("GBUM71029604");
        let b = SongIdentity::new("Zzz", "Nothing Alike At All").with_external_id("GBUM71029604");
        let w = MatchWeights::default();

        assert!(!are_songs_duplicate(&a, &b, 70));
        assert_eq!(classify_pair(&a, &b, 70, &w), PairVerdict::ExactIdentifier);
    }

    #[test]
    fn test_classify_pair_empty_fields_are_unscorable() {
        let w = MatchWeights::default();
        let missing_title = SongIdentity::from_optional(Some("Daft Punk"), None, None);

        // Raw scoring still calls them identical
        assert!(are_songs_duplicate(&missing_title, &missing_title, 70));
        assert_eq!(
            classify_pair(&missing_title, &missing_title, 70, &w),
            PairVerdict::Unscorable
        );
    }

    #[test]
    fn test_classify_pair_fuzzy_and_distinct() {
        let w = MatchWeights::default();
        let a = SongIdentity::new("Daft Punk", "One More Time");
        let b = SongIdentity::new("Daft Punk", "One More Time (Radio Edit)");
        let c = SongIdentity::new("Daft Punk", "Around the World");

        let v = classify_pair(&a, &b, 70, &w);
        assert!(v.is_duplicate());
        assert!(matches!(v, PairVerdict::FuzzyDuplicate(r) if r.combined_score == 100.0));
        assert!(matches!(classify_pair(&a, &c, 70, &w), PairVerdict::Distinct(_)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_song() -> impl Strategy<Value = SongIdentity> {
        ("[A-Za-z ]{0,20}", "[A-Za-z ()]{0,20}")
            .prop_map(|(artist, title)| SongIdentity::new(artist, title))
    }

    proptest! {
        #[test]
        fn threshold_monotonicity(a in any_song(), b in any_song(), t1 in 0u8..=100, t2 in 0u8..=100) {
            let (hi, lo) = if t1 >= t2 { (t1, t2) } else { (t2, t1) };
            if are_songs_duplicate(&a, &b, hi) {
                prop_assert!(are_songs_duplicate(&a, &b, lo));
            }
        }
    }
}
