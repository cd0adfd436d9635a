//! Keyword matching over profile text
//!
//! Matching is a case-insensitive substring test of every keyword against
//! every text field of a candidate, plus any recent activity supplied by the
//! caller. Each (keyword, field) pair hits independently.

use crate::api::CandidateProfile;
use serde::{Deserialize, Serialize};

/// Synthetic field name under which activity items are matched
pub const RECENT_ACTIVITY_FIELD: &str = "recent_activity";

/// Maximum characters kept in a hit excerpt
pub const EXCERPT_MAX_CHARS: usize = 200;

/// One keyword found in one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchHit {
    pub keyword: String,
    pub field: String,
    pub excerpt: String,
}

/// Whether a candidate is worth scanning at all
///
/// Closed profiles and profiles without an avatar are filtered out before
/// evaluation and are not counted as checked.
pub fn is_eligible(candidate: &CandidateProfile) -> bool {
    !candidate.is_closed && candidate.has_avatar()
}

/// Evaluates a candidate against lowercased keywords
///
/// Hits are ordered by field, then by keyword order. Returns an empty list
/// for ineligible candidates without scanning any field.
pub fn evaluate(
    candidate: &CandidateProfile,
    keywords_lower: &[String],
    recent_activity: Option<&[String]>,
) -> Vec<MatchHit> {
    if !is_eligible(candidate) {
        return Vec::new();
    }

    let mut hits = Vec::new();

    for (field, text) in candidate.text_fields() {
        if let Some(text) = text {
            scan(field, text, keywords_lower, &mut hits);
        }
    }

    for text in recent_activity.unwrap_or_default() {
        scan(RECENT_ACTIVITY_FIELD, text, keywords_lower, &mut hits);
    }

    hits
}

fn scan(field: &str, text: &str, keywords_lower: &[String], hits: &mut Vec<MatchHit>) {
    if text.is_empty() {
        return;
    }
    let haystack = text.to_lowercase();

    for keyword in keywords_lower {
        if !keyword.is_empty() && haystack.contains(keyword.as_str()) {
            hits.push(MatchHit {
                keyword: keyword.clone(),
                field: field.to_string(),
                excerpt: excerpt(text),
            });
        }
    }
}

/// Truncates text to [`EXCERPT_MAX_CHARS`] characters, marking the cut
pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_lowercase()).collect()
    }

    fn candidate() -> CandidateProfile {
        CandidateProfile {
            id: 7,
            first_name: "Lisa".to_string(),
            photo_200: Some("https://img.example.com/7.jpg".to_string()),
            status: Some("Jazz forever".to_string()),
            about: Some("Saxophone, CHESS and more chess".to_string()),
            interests: Some("chess, jazz".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_hits_per_keyword_and_field() {
        let hits = evaluate(&candidate(), &keywords(&["chess", "jazz"]), None);

        let pairs: Vec<(&str, &str)> = hits
            .iter()
            .map(|h| (h.field.as_str(), h.keyword.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("status", "jazz"),
                ("about", "chess"),
                ("interests", "chess"),
                ("interests", "jazz"),
            ]
        );
    }

    #[test]
    fn test_case_insensitive() {
        let hits = evaluate(&candidate(), &keywords(&["SAXOPHONE"]), None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].excerpt, "Saxophone, CHESS and more chess");
    }

    #[test]
    fn test_closed_or_faceless_profiles_yield_nothing() {
        let mut closed = candidate();
        closed.is_closed = true;
        assert!(evaluate(&closed, &keywords(&["chess"]), None).is_empty());

        let mut faceless = candidate();
        faceless.photo_200 = None;
        assert!(!is_eligible(&faceless));
        assert!(evaluate(&faceless, &keywords(&["chess"]), None).is_empty());
    }

    #[test]
    fn test_recent_activity_matched_under_synthetic_field() {
        let activity = vec!["Chess club tonight".to_string(), "nothing here".to_string()];
        let hits = evaluate(&candidate(), &keywords(&["club"]), Some(&activity));

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field, RECENT_ACTIVITY_FIELD);
        assert_eq!(hits[0].excerpt, "Chess club tonight");
    }

    #[test]
    fn test_evaluation_is_stable() {
        let kw = keywords(&["jazz", "chess"]);
        assert_eq!(evaluate(&candidate(), &kw, None), evaluate(&candidate(), &kw, None));
    }

    #[test]
    fn test_excerpt_truncation_is_char_safe() {
        let short = "короткий текст";
        assert_eq!(excerpt(short), short);

        let long = "ж".repeat(250);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_MAX_CHARS + 3);
        assert!(cut.ends_with("..."));

        let exact = "a".repeat(EXCERPT_MAX_CHARS);
        assert_eq!(excerpt(&exact), exact);
    }
}
