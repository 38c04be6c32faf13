//! Core data models for duplicate detection.
//!
//! This module contains the song identities fed into the matcher, the derived
//! normalized/scored values, and the outcome types produced by the scanner.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;

use crate::normalize::normalize;

// ============================================================================
// Input Models
// ============================================================================

/// Song as supplied by a caller (CSV row, manual entry, catalog record).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SongIdentity {
    pub artist: String,
    pub title: String,
    /// Canonical recording identifier such as an ISRC.
    pub external_id: Option<String>,
}

impl SongIdentity {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Build from nullable fields. Absent artist/title become empty strings.
    pub fn from_optional(
        artist: Option<&str>,
        title: Option<&str>,
        external_id: Option<&str>,
    ) -> Self {
        Self {
            artist: artist.unwrap_or_default().to_string(),
            title: title.unwrap_or_default().to_string(),
            external_id: external_id.map(str::to_string),
        }
    }
}

/// Existing song with its catalog id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SongRecord {
    pub id: i64,
    pub song: SongIdentity,
}

/// Pair of songs with a human verdict, used to tune weights and thresholds.
#[derive(Clone, Debug)]
pub struct LabeledPair {
    pub a: SongIdentity,
    pub b: SongIdentity,
    pub is_duplicate: bool,
}

// ============================================================================
// Derived Models
// ============================================================================

/// Canonical comparison form of a song's artist and title.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct NormalizedIdentity {
    pub artist: String,
    pub title: String,
}

impl NormalizedIdentity {
    pub fn from_song(song: &SongIdentity) -> Self {
        Self {
            artist: normalize(&song.artist),
            title: normalize(&song.title),
        }
    }

    /// True when either field normalized away to nothing. Such songs are not
    /// fuzzy-matched: empty vs empty scores 100 but means nothing.
    pub fn is_incomplete(&self) -> bool {
        self.artist.is_empty() || self.title.is_empty()
    }
}

/// Per-field and combined similarity, each in [0, 100].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub artist_similarity: f64,
    pub title_similarity: f64,
    pub combined_score: f64,
}

impl SimilarityResult {
    pub fn meets(&self, threshold: u8) -> bool {
        self.combined_score >= f64::from(threshold)
    }
}

/// Relative contribution of title and artist similarity to the combined score.
///
/// Title is the more discriminating field, so it is never weighted below artist.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MatchWeights {
    pub title: f64,
    pub artist: f64,
}

impl MatchWeights {
    pub fn new(title: f64, artist: f64) -> Result<Self> {
        if !title.is_finite() || !artist.is_finite() || title < 0.0 || artist < 0.0 {
            bail!("weights must be finite and non-negative (title={title}, artist={artist})");
        }
        if title + artist <= 0.0 {
            bail!("weights must not both be zero");
        }
        if title < artist {
            bail!("title weight ({title}) must be at least the artist weight ({artist})");
        }
        Ok(Self { title, artist })
    }

    /// Title weight as a fraction of the total; artist gets the remainder.
    pub fn from_title_share(title_share: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&title_share) {
            bail!("title weight must be within 0.0..=1.0, got {title_share}");
        }
        Self::new(title_share, 1.0 - title_share)
    }
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            title: 0.6,
            artist: 0.4,
        }
    }
}

// ============================================================================
// Scan Outcomes
// ============================================================================

/// Database a matched record came from. Catalog and incoming ids overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Catalog,
    /// An earlier song of the batch being checked.
    Incoming,
}

/// Id of an indexed record, qualified by the database it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RecordRef {
    pub source: RecordSource,
    pub id: i64,
}

impl RecordRef {
    pub fn catalog(id: i64) -> Self {
        Self {
            source: RecordSource::Catalog,
            id,
        }
    }

    pub fn incoming(id: i64) -> Self {
        Self {
            source: RecordSource::Incoming,
            id,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            RecordSource::Catalog => write!(f, "catalog:{}", self.id),
            RecordSource::Incoming => write!(f, "incoming:{}", self.id),
        }
    }
}

/// One existing record that cleared the threshold for a candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub record: RecordRef,
    pub similarity: SimilarityResult,
}

/// Terminal state of the caller-side matching workflow for one candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ScanVerdict {
    /// Identifier matched an existing record; fuzzy scoring was skipped.
    ExactDuplicate { record: RecordRef },
    /// At least one record scored at or above the threshold. `candidates`
    /// is ranked by descending score and starts with `best`.
    FuzzyDuplicate {
        best: DuplicateMatch,
        candidates: Vec<DuplicateMatch>,
    },
    /// Every scored record fell below the threshold.
    Unique,
    /// Candidate's artist or title normalized to empty; only identifier
    /// matching was attempted.
    Unscorable,
}

impl ScanVerdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            ScanVerdict::ExactDuplicate { .. } | ScanVerdict::FuzzyDuplicate { .. }
        )
    }
}

/// Work done while checking one candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonCounts {
    /// Full similarity computations.
    pub scored: usize,
    /// Skipped because the length bound could not reach the threshold.
    pub pruned: usize,
    /// Skipped because the existing record had an empty normalized field.
    pub incomplete: usize,
    /// Indexed records sharing no blocking key with the candidate.
    pub blocked: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub candidate: SongIdentity,
    pub normalized: NormalizedIdentity,
    pub verdict: ScanVerdict,
    pub comparisons: ComparisonCounts,
}

// ============================================================================
// Statistics
// ============================================================================

/// Aggregate counts over a scan, for logging and JSON reports.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ScanStats {
    pub blocking: String,
    pub threshold: u8,
    pub catalog_size: usize,

    pub candidates: usize,
    pub exact_duplicates: usize,
    pub fuzzy_duplicates: usize,
    pub unique: usize,
    pub unscorable: usize,

    pub comparisons_scored: usize,
    pub comparisons_pruned: usize,
    pub comparisons_incomplete: usize,
    /// Records never considered because no blocking key matched.
    pub comparisons_blocked: usize,

    pub elapsed_seconds: f64,
}

impl ScanStats {
    pub fn record(&mut self, outcome: &ScanOutcome) {
        self.candidates += 1;
        match outcome.verdict {
            ScanVerdict::ExactDuplicate { .. } => self.exact_duplicates += 1,
            ScanVerdict::FuzzyDuplicate { .. } => self.fuzzy_duplicates += 1,
            ScanVerdict::Unique => self.unique += 1,
            ScanVerdict::Unscorable => self.unscorable += 1,
        }

        let c = outcome.comparisons;
        self.comparisons_scored += c.scored;
        self.comparisons_pruned += c.pruned;
        self.comparisons_incomplete += c.incomplete;
        self.comparisons_blocked += c.blocked;
    }

    /// Percentage of candidates flagged as exact or fuzzy duplicates.
    pub fn duplicate_rate(&self) -> f64 {
        if self.candidates == 0 {
            0.0
        } else {
            100.0 * (self.exact_duplicates + self.fuzzy_duplicates) as f64 / self.candidates as f64
        }
    }

    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!(phase, "scan stats\n{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_optional_coerces_missing_fields() {
        let song = SongIdentity::from_optional(None, Some("Let It Be"), None);
        assert_eq!(song.artist, "");
        assert_eq!(song.title, "Let It Be");
        assert_eq!(song.external_id, None);
    }

    #[test]
    fn test_weights_validation() {
        assert!(MatchWeights::new(0.6, 0.4).is_ok());
        assert!(MatchWeights::new(0.5, 0.5).is_ok());
        assert!(MatchWeights::new(0.3, 0.7).is_err());
        assert!(MatchWeights::new(0.0, 0.0).is_err());
        assert!(MatchWeights::new(-1.0, 0.0).is_err());
        assert!(MatchWeights::new(f64::NAN, 0.1).is_err());
        assert!(MatchWeights::from_title_share(1.2).is_err());
        assert_eq!(
            MatchWeights::from_title_share(1.0).unwrap(),
            MatchWeights { title: 1.0, artist: 0.0 }
        );
    }

    #[test]
    fn test_incomplete_identity() {
        let n = NormalizedIdentity::from_song(&SongIdentity::new("Daft Punk", "(Remix)"));
        assert!(n.is_incomplete());
        let n = NormalizedIdentity::from_song(&SongIdentity::new("Daft Punk", "Da Funk"));
        assert!(!n.is_incomplete());
    }

    #[test]
    fn test_stats_counts_blocked_comparisons() {
        let mut stats = ScanStats {
            catalog_size: 10,
            ..Default::default()
        };
        stats.record(&ScanOutcome {
            candidate: SongIdentity::new("a", "b"),
            normalized: NormalizedIdentity::default(),
            verdict: ScanVerdict::Unique,
            comparisons: ComparisonCounts {
                scored: 2,
                pruned: 1,
                incomplete: 1,
                blocked: 9,
            },
        });
        stats.record(&ScanOutcome {
            candidate: SongIdentity::new("a", "b"),
            normalized: NormalizedIdentity::default(),
            verdict: ScanVerdict::ExactDuplicate {
                record: RecordRef::catalog(3),
            },
            comparisons: ComparisonCounts::default(),
        });
        assert_eq!(stats.candidates, 2);
        // Taken from the index at check time, not from the catalog size
        assert_eq!(stats.comparisons_blocked, 9);
        assert_eq!(stats.exact_duplicates, 1);
        assert!((stats.duplicate_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_ref_display_and_json() {
        assert_eq!(RecordRef::catalog(1).to_string(), "catalog:1");
        assert_eq!(RecordRef::incoming(1).to_string(), "incoming:1");
        assert_ne!(RecordRef::catalog(1), RecordRef::incoming(1));
        let json = serde_json::to_string(&RecordRef::incoming(7)).unwrap();
        assert_eq!(json, r#"{"source":"incoming","id":7}"#);
    }
}
