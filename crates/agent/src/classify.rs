//! Rule-based query classification.
//!
//! Rules are tried in order and the first match wins:
//! 1. lesson phrasing → lesson responder
//! 2. raga phrasing, unless the query also asks for patterns → raga info
//! 3. pattern / practice phrasing → swara pattern responder
//!
//! Matching is case-insensitive substring search against configured keywords,
//! so the same query always lands on the same responder regardless of
//! session history.

use carnaticguru_config::RouterConfig;
use carnaticguru_core::error::RoutingError;
use carnaticguru_core::responder::{ResponderKind, ResponderRequest};

/// Words that introduce a raga name: "patterns for Kalyani".
const NAME_PREPOSITIONS: [&str; 5] = ["for", "in", "of", "using", "on"];
/// Words that follow a raga name: "Kalyani raga".
const RAGA_NOUNS: [&str; 3] = ["raga", "ragam", "raagam"];
const STOPWORDS: [&str; 34] = [
    "a", "an", "the", "me", "my", "some", "give", "generate", "create", "show", "make", "please",
    "can", "you", "i", "want", "what", "is", "are", "about", "tell", "and", "with", "to", "swara",
    "swaras", "notes", "patterns", "sequences", "phrases", "exercises", "information", "info",
    "details",
];

/// Where a query goes and with what structured input.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub kind: ResponderKind,
    pub request: ResponderRequest,
}

#[derive(Debug, Clone)]
pub struct QueryClassifier {
    lesson_keywords: Vec<String>,
    raga_keywords: Vec<String>,
    pattern_keywords: Vec<String>,
}

impl QueryClassifier {
    pub fn new(
        lesson_keywords: Vec<String>,
        raga_keywords: Vec<String>,
        pattern_keywords: Vec<String>,
    ) -> Self {
        let lower = |v: Vec<String>| -> Vec<String> { v.into_iter().map(|k| k.to_lowercase()).collect() };
        Self {
            lesson_keywords: lower(lesson_keywords),
            raga_keywords: lower(raga_keywords),
            pattern_keywords: lower(pattern_keywords),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            config.lesson_keywords.clone(),
            config.raga_keywords.clone(),
            config.pattern_keywords.clone(),
        )
    }

    pub fn classify(&self, query: &str) -> Result<Route, RoutingError> {
        let lowered = query.to_lowercase();
        let has = |keywords: &[String]| keywords.iter().any(|k| lowered.contains(k.as_str()));

        let kind = if has(&self.lesson_keywords) {
            ResponderKind::Lesson
        } else if has(&self.raga_keywords) && !has(&self.pattern_keywords) {
            ResponderKind::RagaInfo
        } else if has(&self.pattern_keywords) {
            ResponderKind::SwaraPattern
        } else {
            return Err(RoutingError::UnroutableQuery(query.to_string()));
        };

        let mut request = ResponderRequest::new(query);
        if kind != ResponderKind::Lesson {
            if let Some(raga) = self.extract_raga_name(query) {
                request = request.with_field("raga", raga);
            }
        }
        Ok(Route { kind, request })
    }

    /// Best-effort raga name: the word before "raga", else the word after a
    /// preposition, else the only word that is neither a keyword nor filler.
    pub fn extract_raga_name(&self, query: &str) -> Option<String> {
        let tokens: Vec<&str> = query
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !(c.is_alphanumeric() || c == '\'')))
            .filter(|t| !t.is_empty())
            .collect();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        for (i, word) in lowered.iter().enumerate() {
            if RAGA_NOUNS.contains(&word.as_str()) && i > 0 && self.is_candidate(&lowered[i - 1]) {
                return Some(tokens[i - 1].to_string());
            }
        }

        for (i, word) in lowered.iter().enumerate() {
            if NAME_PREPOSITIONS.contains(&word.as_str()) {
                if let Some(next) = lowered.get(i + 1) {
                    if self.is_candidate(next) {
                        return Some(tokens[i + 1].to_string());
                    }
                }
            }
        }

        let candidates: Vec<usize> = (0..tokens.len())
            .filter(|&i| self.is_candidate(&lowered[i]))
            .collect();
        match candidates.as_slice() {
            [only] => Some(tokens[*only].to_string()),
            _ => None,
        }
    }

    fn is_candidate(&self, word: &str) -> bool {
        !(STOPWORDS.contains(&word)
            || NAME_PREPOSITIONS.contains(&word)
            || RAGA_NOUNS.contains(&word)
            || word.chars().all(|c| c.is_ascii_digit())
            || self.is_keyword(word))
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.lesson_keywords
            .iter()
            .chain(&self.raga_keywords)
            .chain(&self.pattern_keywords)
            .any(|k| word.contains(k.as_str()))
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(q: &str) -> Route {
        QueryClassifier::default().classify(q).unwrap()
    }

    #[test]
    fn lesson_phrasing_routes_to_lesson() {
        assert_eq!(classify("Show me the Sarali Varisai lesson").kind, ResponderKind::Lesson);
        assert_eq!(classify("janta varisai please").kind, ResponderKind::Lesson);
    }

    #[test]
    fn lesson_wins_over_other_rules() {
        assert_eq!(
            classify("lesson on practice patterns in Mayamalavagowla raga").kind,
            ResponderKind::Lesson
        );
    }

    #[test]
    fn raga_phrasing_routes_to_raga_info() {
        let route = classify("What is the arohanam of Kalyani raga?");
        assert_eq!(route.kind, ResponderKind::RagaInfo);
        assert_eq!(route.request.field_str("raga"), Some("Kalyani"));
    }

    #[test]
    fn pattern_phrasing_routes_to_swara_pattern() {
        let route = classify("Give me practice patterns for Mohanam");
        assert_eq!(route.kind, ResponderKind::SwaraPattern);
        assert_eq!(route.request.field_str("raga"), Some("Mohanam"));
    }

    #[test]
    fn raga_word_with_pattern_word_is_pattern() {
        let route = classify("Hamsadhwani raga swara patterns");
        assert_eq!(route.kind, ResponderKind::SwaraPattern);
        assert_eq!(route.request.field_str("raga"), Some("Hamsadhwani"));
    }

    #[test]
    fn pattern_without_raga_has_no_field() {
        let route = classify("random practice patterns");
        assert_eq!(route.kind, ResponderKind::SwaraPattern);
        assert_eq!(route.request.field_str("raga"), None);
    }

    #[test]
    fn sole_remaining_word_is_the_raga() {
        let route = classify("Shankarabharanam practice");
        assert_eq!(route.request.field_str("raga"), Some("Shankarabharanam"));
    }

    #[test]
    fn category_prefix_is_ignored_for_names() {
        let route = classify("[patterns] sequences in Hindolam");
        assert_eq!(route.kind, ResponderKind::SwaraPattern);
        assert_eq!(route.request.field_str("raga"), Some("Hindolam"));
    }

    #[test]
    fn unmatched_query_is_unroutable() {
        let err = QueryClassifier::default().classify("hello there").unwrap_err();
        assert!(matches!(err, RoutingError::UnroutableQuery(_)));
        assert!(QueryClassifier::default().classify("").is_err());
    }

    #[test]
    fn classification_is_deterministic() {
        let c = QueryClassifier::default();
        for _ in 0..5 {
            assert_eq!(
                c.classify("practice sequence for Abhogi").unwrap().kind,
                ResponderKind::SwaraPattern
            );
        }
    }

    #[test]
    fn custom_keywords() {
        let c = QueryClassifier::new(vec!["PAATAM".into()], vec!["raga".into()], vec!["drill".into()]);
        assert_eq!(c.classify("paatam 3").unwrap().kind, ResponderKind::Lesson);
        assert_eq!(c.classify("drill on Kalyani").unwrap().kind, ResponderKind::SwaraPattern);
    }
}
