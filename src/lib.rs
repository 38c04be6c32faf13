//! Song duplicate detection - shared modules for all binaries.

pub mod calibration;
pub mod decision;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod safety;
pub mod scan;
pub mod similarity;
pub mod store;

pub use decision::{are_songs_duplicate, classify_pair, is_exact_identifier_match, PairVerdict};
pub use models::{MatchWeights, NormalizedIdentity, SimilarityResult, SongIdentity, SongRecord};
pub use normalize::normalize;
pub use scan::{DuplicateIndex, ScanConfig};
pub use similarity::{calculate_song_similarity, string_similarity};
