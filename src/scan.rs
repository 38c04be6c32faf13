//! Two-stage duplicate search over a catalog of existing songs.
//!
//! Stage 1 is an exact lookup by canonical external id. Stage 2 scores the
//! candidate only against records sharing a blocking key, skipping any record
//! whose length bound cannot reach the threshold. With `FullScan` blocking the
//! result is identical to comparing against every record.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::models::{
    ComparisonCounts, DuplicateMatch, MatchWeights, NormalizedIdentity, RecordRef, RecordSource,
    ScanOutcome, ScanVerdict, SongIdentity, SongRecord,
};
use crate::normalize::normalize_external_id;
use crate::similarity::{max_possible_score, score_normalized};

// ============================================================================
// Blocking Strategies
// ============================================================================

/// Chooses which existing records a candidate is compared against.
///
/// Two songs are compared only if they share at least one key.
pub trait BlockingStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn keys(&self, song: &NormalizedIdentity) -> Vec<String>;
}

/// Every record lands in one block: plain linear scan.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullScan;

impl BlockingStrategy for FullScan {
    fn name(&self) -> &'static str {
        "full-scan"
    }

    fn keys(&self, _song: &NormalizedIdentity) -> Vec<String> {
        vec![String::new()]
    }
}

/// Block on the first `prefix_len` non-space chars of the normalized title.
/// Cheapest, but misses typos in the first few chars.
#[derive(Debug, Clone, Copy)]
pub struct TitlePrefixBlocking {
    pub prefix_len: usize,
}

impl BlockingStrategy for TitlePrefixBlocking {
    fn name(&self) -> &'static str {
        "title-prefix"
    }

    fn keys(&self, song: &NormalizedIdentity) -> Vec<String> {
        let key: String = song
            .title
            .chars()
            .filter(|c| *c != ' ')
            .take(self.prefix_len.max(1))
            .collect();
        vec![key]
    }
}

/// Block on each title word of at least `min_token_len` chars, so a typo
/// has to hit every long word before a match is lost.
#[derive(Debug, Clone, Copy)]
pub struct TitleTokenBlocking {
    pub min_token_len: usize,
}

impl BlockingStrategy for TitleTokenBlocking {
    fn name(&self) -> &'static str {
        "title-token"
    }

    fn keys(&self, song: &NormalizedIdentity) -> Vec<String> {
        let mut keys: Vec<String> = song
            .title
            .split_whitespace()
            .filter(|t| t.len() >= self.min_token_len)
            .map(str::to_string)
            .collect();
        // Titles made only of short words block on the whole title.
        if keys.is_empty() {
            keys.push(song.title.clone());
        }
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    pub threshold: u8,
    pub weights: MatchWeights,
    /// How many ranked fuzzy matches to keep per candidate.
    pub max_candidates: usize,
}

impl ScanConfig {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            weights: MatchWeights::default(),
            max_candidates: 5,
        }
    }

    pub fn with_weights(mut self, weights: MatchWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self
    }
}

// ============================================================================
// Index
// ============================================================================

struct IndexedRecord {
    record: RecordRef,
    normalized: NormalizedIdentity,
}

/// Existing songs, indexed for duplicate checks.
pub struct DuplicateIndex {
    config: ScanConfig,
    blocking: Box<dyn BlockingStrategy>,
    records: Vec<IndexedRecord>,
    by_external_id: FxHashMap<String, usize>,
    blocks: FxHashMap<String, Vec<usize>>,
}

impl DuplicateIndex {
    pub fn new(config: ScanConfig, blocking: Box<dyn BlockingStrategy>) -> Self {
        Self {
            config,
            blocking,
            records: Vec::new(),
            by_external_id: FxHashMap::default(),
            blocks: FxHashMap::default(),
        }
    }

    pub fn build(
        records: impl IntoIterator<Item = SongRecord>,
        config: ScanConfig,
        blocking: Box<dyn BlockingStrategy>,
    ) -> Self {
        let mut index = Self::new(config, blocking);
        for record in records {
            index.insert(record);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn blocking_name(&self) -> &'static str {
        self.blocking.name()
    }

    /// Add a catalog record. The first record seen with an external id owns it.
    pub fn insert(&mut self, record: SongRecord) {
        self.insert_from(record, RecordSource::Catalog);
    }

    /// Add a record from the given database.
    pub fn insert_from(&mut self, record: SongRecord, source: RecordSource) {
        let idx = self.records.len();
        let normalized = NormalizedIdentity::from_song(&record.song);

        if let Some(id) = record.song.external_id.as_deref().and_then(normalize_external_id) {
            self.by_external_id.entry(id).or_insert(idx);
        }
        for key in self.blocking.keys(&normalized) {
            self.blocks.entry(key).or_default().push(idx);
        }

        self.records.push(IndexedRecord {
            record: RecordRef {
                source,
                id: record.id,
            },
            normalized,
        });
    }

    /// Run the matching workflow for one candidate.
    pub fn check(&self, candidate: &SongIdentity) -> ScanOutcome {
        let normalized = NormalizedIdentity::from_song(candidate);
        let mut comparisons = ComparisonCounts::default();

        let verdict = self.decide(candidate, &normalized, &mut comparisons);
        debug!(
            artist = %candidate.artist,
            title = %candidate.title,
            ?verdict,
            scored = comparisons.scored,
            pruned = comparisons.pruned,
            "duplicate check"
        );

        ScanOutcome {
            candidate: candidate.clone(),
            normalized,
            verdict,
            comparisons,
        }
    }

    /// Check many candidates in parallel. The index is not modified, so
    /// candidates are not compared with each other.
    pub fn check_batch(&self, candidates: &[SongIdentity]) -> Vec<ScanOutcome> {
        candidates.par_iter().map(|c| self.check(c)).collect()
    }

    /// Check an incoming record, then add it to the index unless it is a
    /// duplicate. Feeding a batch through `ingest` in order also catches
    /// duplicates within the batch; those matches point at `RecordSource::Incoming`.
    pub fn ingest(&mut self, record: SongRecord) -> ScanOutcome {
        let outcome = self.check(&record.song);
        if !outcome.verdict.is_duplicate() {
            self.insert_from(record, RecordSource::Incoming);
        }
        outcome
    }

    fn decide(
        &self,
        candidate: &SongIdentity,
        normalized: &NormalizedIdentity,
        comparisons: &mut ComparisonCounts,
    ) -> ScanVerdict {
        let exact = candidate
            .external_id
            .as_deref()
            .and_then(normalize_external_id)
            .and_then(|id| self.by_external_id.get(&id));
        if let Some(&idx) = exact {
            return ScanVerdict::ExactDuplicate {
                record: self.records[idx].record,
            };
        }

        if normalized.is_incomplete() {
            return ScanVerdict::Unscorable;
        }

        let indices = self.candidate_indices(normalized);
        comparisons.blocked = self.records.len() - indices.len();

        let mut matches: Vec<(usize, DuplicateMatch)> = Vec::new();
        for idx in indices {
            let record = &self.records[idx];
            if record.normalized.is_incomplete() {
                comparisons.incomplete += 1;
                continue;
            }
            let bound = max_possible_score(normalized, &record.normalized, &self.config.weights);
            if bound < f64::from(self.config.threshold) {
                comparisons.pruned += 1;
                continue;
            }

            comparisons.scored += 1;
            let similarity = score_normalized(normalized, &record.normalized, &self.config.weights);
            if similarity.meets(self.config.threshold) {
                matches.push((
                    idx,
                    DuplicateMatch {
                        record: record.record,
                        similarity,
                    },
                ));
            }
        }

        // Highest score first; equal scores keep catalog order.
        matches.sort_by(|(ia, a), (ib, b)| {
            b.similarity
                .combined_score
                .total_cmp(&a.similarity.combined_score)
                .then_with(|| ia.cmp(ib))
        });
        matches.truncate(self.config.max_candidates);

        let candidates: Vec<DuplicateMatch> = matches.into_iter().map(|(_, m)| m).collect();
        match candidates.first() {
            Some(best) => ScanVerdict::FuzzyDuplicate {
                best: best.clone(),
                candidates,
            },
            None => ScanVerdict::Unique,
        }
    }

    /// Record indices sharing at least one blocking key, in catalog order.
    fn candidate_indices(&self, normalized: &NormalizedIdentity) -> Vec<usize> {
        let keys = self.blocking.keys(normalized);
        if let [key] = keys.as_slice() {
            return self.blocks.get(key).cloned().unwrap_or_default();
        }

        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut indices: Vec<usize> = keys
            .iter()
            .filter_map(|k| self.blocks.get(k))
            .flatten()
            .copied()
            .filter(|idx| seen.insert(*idx))
            .collect();
        indices.sort_unstable();
        indices
    }
}
