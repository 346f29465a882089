//! Regex-based search engine.
//!
//! Natural-language queries are reduced to their significant terms and compiled
//! into a case-insensitive alternation. Every entry of the session is scored by
//! how often and how early the pattern matches its name and description.

use std::collections::HashSet;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};

use super::engine::{DEFAULT_MAX_RESULTS, SearchEngine, SessionHousekeeping};
use super::index::{SessionRegistry, next_entry_id};
use crate::types::{SearchRequest, SearchResponse, SearchType, ToolReference};

/// Upper bound on the length of a generated pattern.
pub const MAX_PATTERN_LENGTH: usize = 200;

const MATCH_ALL: &str = ".*";
const MIN_TOKEN_CHARS: usize = 2;
const NAME_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;
const DESCRIPTION_POSITION_FACTOR: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by",
    "from", "as", "into", "through", "during", "before", "after", "above", "below", "between",
    "and", "or", "but", "if", "because", "until", "while", "although", "this", "that", "these",
    "those", "what", "which", "who", "whom", "whose", "i", "me", "my", "we", "our", "you",
    "your", "he", "him", "his", "she", "her", "it", "its", "they", "them", "their", "all",
    "any", "both", "each", "every", "some", "no", "not", "only", "just", "also", "very", "too",
    "so",
];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | ':' | '.' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\'')
}

#[derive(Debug, Clone)]
struct PatternEntry {
    #[allow(dead_code)]
    id: u64,
    tool_name: String,
    description: String,
}

#[derive(Debug, Default)]
struct PatternIndex {
    entries: RwLock<Vec<PatternEntry>>,
}

impl PatternIndex {
    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[derive(Default)]
pub struct PatternSearchEngine {
    sessions: SessionRegistry<PatternIndex>,
}

impl PatternSearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a natural-language query into a case-insensitive alternation.
    ///
    /// Stop words and single characters are dropped unless nothing else is
    /// left. Trailing terms are removed until the pattern fits
    /// [`MAX_PATTERN_LENGTH`], always keeping at least one.
    pub fn convert_query_to_pattern(query: &str) -> String {
        if query.trim().is_empty() {
            return MATCH_ALL.to_string();
        }

        let lowered = query.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(is_delimiter)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        let mut terms = dedup_escaped(tokens.iter().copied().filter(|t| {
            t.chars().count() >= MIN_TOKEN_CHARS && !STOP_WORDS.contains(t)
        }));
        if terms.is_empty() {
            terms = dedup_escaped(tokens.iter().copied());
        }
        if terms.is_empty() {
            return MATCH_ALL.to_string();
        }

        let mut pattern = alternation(&terms);
        if pattern.len() > MAX_PATTERN_LENGTH {
            while pattern.len() > MAX_PATTERN_LENGTH && terms.len() > 1 {
                terms.pop();
                pattern = alternation(&terms);
            }
            debug!(terms = terms.len(), "Pattern truncated to fit max length");
        }
        pattern
    }

    /// Whether `pattern` is non-blank, within the length bound, and compiles.
    pub fn is_valid_pattern(pattern: &str) -> bool {
        !pattern.trim().is_empty()
            && pattern.len() <= MAX_PATTERN_LENGTH
            && Regex::new(pattern).is_ok()
    }

    fn score(regex: &Regex, entry: &PatternEntry) -> f64 {
        let mut score = 0.0;
        if let Some((count, earliest)) = field_matches(regex, &entry.tool_name) {
            score += NAME_WEIGHT * count as f64 + position_bonus(earliest);
        }
        if let Some((count, earliest)) = field_matches(regex, &entry.description) {
            score += DESCRIPTION_WEIGHT * count as f64
                + position_bonus(earliest) * DESCRIPTION_POSITION_FACTOR;
        }
        score
    }
}

fn dedup_escaped<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .map(regex::escape)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn alternation(terms: &[String]) -> String {
    format!("(?i)({})", terms.join("|"))
}

/// Match count and the character offset of the earliest match.
fn field_matches(regex: &Regex, text: &str) -> Option<(usize, usize)> {
    let mut matches = regex.find_iter(text);
    let first = matches.next()?;
    let earliest = text[..first.start()].chars().count();
    Some((1 + matches.count(), earliest))
}

fn position_bonus(offset: usize) -> f64 {
    1.0 / (1.0 + offset as f64 * 0.1)
}

impl SearchEngine for PatternSearchEngine {
    fn search_type(&self) -> SearchType {
        SearchType::Pattern
    }

    fn index_tool(&self, session_id: &str, reference: &ToolReference) -> crate::Result<()> {
        if session_id.trim().is_empty() {
            warn!(tool = %reference.tool_name, "No session id provided, skipping indexing");
            return Ok(());
        }

        let id = next_entry_id();
        let index = self.sessions.get_or_create(session_id, PatternIndex::default);
        index
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PatternEntry {
                id,
                tool_name: reference.tool_name.clone(),
                description: reference.summary.clone(),
            });
        debug!(session_id, tool = %reference.tool_name, id, "Indexed tool");
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> crate::Result<SearchResponse> {
        let start = Instant::now();

        if !request.has_session() {
            warn!("No session id provided in search request, returning empty results");
            return Ok(SearchResponse::empty(self.search_type(), &request.query));
        }
        let Some(index) = self.sessions.get(&request.session_id) else {
            debug!(session_id = %request.session_id, "No index found for session");
            return Ok(SearchResponse::empty(self.search_type(), &request.query));
        };

        let pattern = Self::convert_query_to_pattern(&request.query);
        debug!(query = %request.query, %pattern, "Converted query to pattern");

        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(%pattern, error = %e, "Invalid search pattern");
                return Ok(SearchResponse::empty(self.search_type(), &request.query)
                    .with_search_time(start.elapsed().as_millis() as u64));
            }
        };

        let entries = index.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<(f64, &PatternEntry)> = entries
            .iter()
            .map(|entry| (Self::score(&regex, entry), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        hits.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let references = hits
            .into_iter()
            .take(request.limit_or(DEFAULT_MAX_RESULTS))
            .map(|(score, entry)| {
                ToolReference::new(&entry.tool_name, &entry.description).with_score(score)
            })
            .collect();

        Ok(SearchResponse::new(
            self.search_type(),
            &request.query,
            references,
            start.elapsed().as_millis() as u64,
        ))
    }

    fn clear_index(&self, session_id: &str) -> crate::Result<()> {
        if let Some(index) = self.sessions.remove(session_id) {
            index
                .entries
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
            debug!(session_id, "Cleared index for session");
        }
        Ok(())
    }
}

impl SessionHousekeeping for PatternSearchEngine {
    fn size(&self, session_id: &str) -> crate::Result<usize> {
        Ok(self.sessions.get(session_id).map_or(0, |i| i.len()))
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn idle_sessions(&self, max_idle: Duration) -> Vec<String> {
        self.sessions.idle_sessions(max_idle)
    }

    fn total_size(&self) -> crate::Result<usize> {
        Ok(self.sessions.indexes().iter().map(|i| i.len()).sum())
    }
}
