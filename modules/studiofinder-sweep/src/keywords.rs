//! Turning the configured keyword list into per-center queries.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use studiofinder_common::{KeywordStrategy, SweepConfig};

/// Tokens that lead a combined query.
pub const PRIORITY_TOKENS: &[&str] = &["recording", "studio", "music", "audio", "mix", "master"];

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));

/// Lowercased word tokens longer than two characters, unique, in order of
/// first appearance.
pub fn tokenize(keywords: &[String]) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for keyword in keywords {
        let lower = keyword.to_lowercase();
        for m in WORD.find_iter(&lower) {
            let token = m.as_str();
            if token.chars().count() > 2 && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
    }
    tokens
}

/// Merge every keyword into one query: priority tokens first, then the
/// rest, capped at `max_tokens`.
pub fn combine(keywords: &[String], max_tokens: usize) -> String {
    let tokens = tokenize(keywords);
    let (priority, other): (Vec<String>, Vec<String>) = tokens
        .into_iter()
        .partition(|t| PRIORITY_TOKENS.contains(&t.as_str()));
    priority
        .into_iter()
        .chain(other)
        .take(max_tokens.max(1))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The queries issued at every center, in order.
pub fn effective_keywords(config: &SweepConfig) -> Vec<String> {
    let mut keywords = match config.keyword_strategy {
        KeywordStrategy::All => config.keywords.clone(),
        KeywordStrategy::First => config.keywords.iter().take(1).cloned().collect(),
        KeywordStrategy::Combined => {
            let combined = combine(&config.keywords, config.combined_max_tokens);
            info!(
                from = config.keywords.len(),
                query = combined.as_str(),
                "Combined keywords into one query"
            );
            if combined.is_empty() {
                Vec::new()
            } else {
                vec![combined]
            }
        }
    };
    if let Some(max) = config.max_keywords_per_center {
        if max < keywords.len() {
            keywords.truncate(max);
            info!(max, "Limiting keywords per center");
        }
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_keywords_combine_deterministically() {
        let config = SweepConfig::default();
        assert_eq!(
            combine(&config.keywords, 8),
            "recording studio music mixing mastering rehearsal production"
        );
    }

    #[test]
    fn short_tokens_are_dropped_and_cap_applies() {
        let kws = strings(&["DJ booth", "mix tape studio", "audio lab", "music of LA"]);
        assert_eq!(combine(&kws, 3), "mix studio audio");
        assert_eq!(tokenize(&kws), strings(&["booth", "mix", "tape", "studio", "audio", "lab", "music"]));
    }

    #[test]
    fn strategies_shape_the_query_list() {
        let mut config = SweepConfig {
            keywords: strings(&["recording studio", "music studio", "mixing studio"]),
            ..SweepConfig::default()
        };
        assert_eq!(effective_keywords(&config).len(), 3);

        config.keyword_strategy = KeywordStrategy::First;
        assert_eq!(effective_keywords(&config), strings(&["recording studio"]));

        config.keyword_strategy = KeywordStrategy::Combined;
        assert_eq!(effective_keywords(&config), strings(&["recording studio music mixing"]));
    }

    #[test]
    fn per_center_limit_truncates() {
        let config = SweepConfig {
            max_keywords_per_center: Some(2),
            ..SweepConfig::default()
        };
        assert_eq!(
            effective_keywords(&config),
            strings(&["recording studio", "music studio"])
        );
    }
}
