//! Name-based relevance screening for search hits.
//!
//! Screening is an ordered pipeline with early exit. Only hits that come
//! out `Accepted` are worth a detail lookup.

use places_client::RawHit;

use crate::ledger::DedupLedger;

/// Names containing any of these are unrelated businesses...
pub const EXCLUDED_TERMS: &[&str] = &[
    "tattoo",
    "yoga",
    "pilates",
    "dance",
    "photo",
    "photography",
    "fitness",
    "crossfit",
    "martial",
    "hair",
    "salon",
    "nail",
];

/// ...unless they also contain one of these.
pub const EXCLUSION_OVERRIDES: &[&str] = &["record", "mix", "master", "audio", "music", "recording"];

/// Hints that make a "studio" name count as an audio studio.
pub const STUDIO_HINTS: &[&str] = &["record", "mix", "master", "audio", "music", "studio", "recording"];

/// Terms that are enough on their own.
pub const STANDALONE_TERMS: &[&str] = &["music", "audio", "mix", "master"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    MissingId,
    /// Already in the destination or seen earlier this run.
    Known,
    Excluded,
    NotRelevant,
    Accepted,
}

impl Screening {
    pub fn is_accepted(self) -> bool {
        self == Screening::Accepted
    }
}

pub fn screen(hit: &RawHit, ledger: &DedupLedger) -> Screening {
    let Some(id) = hit.external_id.as_deref().filter(|id| !id.is_empty()) else {
        return Screening::MissingId;
    };
    if ledger.contains(id) {
        return Screening::Known;
    }
    let name = hit.name.to_lowercase();
    if is_excluded(&name) {
        return Screening::Excluded;
    }
    if !looks_like_audio_studio(&name) {
        return Screening::NotRelevant;
    }
    Screening::Accepted
}

/// `name_lower` must already be lowercased.
pub fn is_excluded(name_lower: &str) -> bool {
    contains_any(name_lower, EXCLUDED_TERMS) && !contains_any(name_lower, EXCLUSION_OVERRIDES)
}

/// `name_lower` must already be lowercased.
pub fn looks_like_audio_studio(name_lower: &str) -> bool {
    if name_lower.is_empty() {
        return false;
    }
    (name_lower.contains("studio") && contains_any(name_lower, STUDIO_HINTS))
        || name_lower.contains("recording")
        || contains_any(name_lower, STANDALONE_TERMS)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
