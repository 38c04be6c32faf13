//! Normalization of artist and title strings for duplicate matching.
//!
//! Both fields go through the same pipeline. Output only ever contains
//! `[a-z0-9 ]`, which is what makes `normalize` idempotent: none of the
//! bracket, dash, ampersand or apostrophe rules can fire on its own output.
//!
//! CRITICAL: changing a pattern here changes which songs are reported as
//! duplicates. Run the tests after changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Known version/edit tags, applied in order to folded lowercase text.
/// First tier: these describe the same recording in another release form.
pub static VERSION_TAG_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Featured credits: "(feat. X)", "[ft. X]", "(featuring X)", "(with X)"
        Regex::new(r"\s*[\(\[](?:feat\.?|ft\.?|featuring|with)\s+[^\(\)\[\]]*[\)\]]").unwrap(),
        // Edits and mixes: "(Radio Edit)", "(Extended Mix)", "[Album Version]"
        Regex::new(r"\s*[\(\[](?:radio|single|album|club|extended|original|clean|explicit|dirty|short|long|uk|us)\s+(?:edit|mix|version)[\)\]]").unwrap(),
        // Remixes with or without credit: "(Remix)", "(Skrillex Remix)", "[VIP Remixed]"
        Regex::new(r"\s*[\(\[][^\(\)\[\]]*\bre-?mix(?:ed)?\b[^\(\)\[\]]*[\)\]]").unwrap(),
        // Remasters: "(Remastered)", "(2011 Remaster)", "[Digitally Remastered 2009]"
        Regex::new(r"\s*[\(\[](?:\d{4}\s+)?(?:digital(?:ly)?\s+)?remaster(?:ed)?(?:\s+\d{4})?(?:\s+version)?[\)\]]").unwrap(),
        // Live recordings: "(Live)", "(Live at Wembley)", "[Live 1995]". Not "(Live Forever)".
        Regex::new(r"\s*[\(\[]live(?:\s+(?:at|in|from|on)\b[^\(\)\[\]]*|\s+\d{4})?[\)\]]").unwrap(),
        // Credited mixes and edits: "(Tiesto's Big Room Mix)", "[Kygo Edit]"
        Regex::new(r"\s*[\(\[][^\(\)\[\]]*\b(?:mix|edit)[\)\]]").unwrap(),
        // Other release forms: "(Acoustic Version)", "(Demo)", "(Mono)", "(Explicit)"
        Regex::new(r"\s*[\(\[](?:acoustic|demo|instrumental|mono|stereo|explicit|clean|edit|unplugged|karaoke|bonus\s+track)(?:\s+version)?[\)\]]").unwrap(),
        // Dash suffixes: "- Radio Edit", "- 2011 Remaster", "- 2019 Mix", "- Live at X", "- DJ Remix"
        Regex::new(r"\s+[-–—]\s+(?:\d{4}\s+(?:mix|version|edit)|(?:\d{4}\s+)?(?:digital\s+)?remaster(?:ed)?(?:\s+\d{4})?(?:\s+version)?|live(?:\s+(?:at|in|from|on)\b.*|\s+\d{4})?|(?:radio|single|album|extended|original|mono|stereo)\s+(?:edit|mix|version)|acoustic(?:\s+version)?|edit|demo|instrumental|[^-–—]*\bremix(?:ed)?)\s*$").unwrap(),
    ]
});

/// Second tier: a bracketed group made only of version keywords and years,
/// such as "[2020 Deluxe Bonus]". "(Clean Slate)" has a real word and stays.
pub static VERSION_KEYWORD_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    const WORD: &str = r"(?:re-?mix(?:ed)?|mix|edit|version|live|remaster(?:ed)?|acoustic|demo|instrumental|explicit|clean|dirty|mono|stereo|bonus|track|deluxe|edition|radio|single|album|extended|original|club|dub|\d{4})";
    Regex::new(&format!(r"\s*[\(\[]\s*{WORD}(?:[\s,/&-]+{WORD})*\s*[\)\]]")).unwrap()
});

/// Featured-artist clause: "feat."/"ft." with the dot, or the full word "featuring".
/// Never at the very start, so "Ft. Lauderdale" is a title, not a credit.
static FEATURING_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)[^a-z0-9](?:(?:feat|ft)\.|featuring(?:[^a-z0-9]|$)).*$").unwrap()
});

/// Anything that is not a lowercase ASCII letter or digit.
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Straighten curly quotes and stray accents used as apostrophes.
pub fn normalize_quotes(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
}

/// Remove release-form annotations (smart patterns, then keyword fallback).
/// Expects folded lowercase text.
pub fn strip_version_tags(s: &str) -> String {
    let mut result = s.to_string();
    for pattern in VERSION_TAG_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }
    VERSION_KEYWORD_FALLBACK.replace_all(&result, "").to_string()
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Reduce a raw artist or title to its canonical comparison form.
///
/// Lowercases and folds to ASCII, drops version/edit/featuring annotations,
/// reads `&` as "and", removes apostrophes and other punctuation, strips
/// leading "the" and collapses whitespace. Never fails; input that is pure
/// noise normalizes to an empty string.
pub fn normalize(raw: &str) -> String {
    let folded = fold_to_ascii(&normalize_quotes(raw));
    let stripped = strip_version_tags(&folded);

    let spelled = stripped.replace('&', " and ").replace('\'', "");
    // "daft punk feat. pharrell" → "daft punk"; "6 ft under" keeps its words.
    let credited = FEATURING_CLAUSE.replace(&spelled, "");
    let cleaned = NON_ALNUM.replace_all(&credited, " ");

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();

    // "The Beatles" → "beatles", but "The The" keeps one "the".
    while tokens.len() > 1 && tokens[0] == "the" {
        tokens.remove(0);
    }

    tokens.join(" ")
}

/// Canonical form of an external identifier such as an ISRC.
/// "us-rc1-76-07839" → "USRC17607839". Blank ids are treated as absent.
pub fn normalize_external_id(raw: &str) -> Option<String> {
    let id: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
