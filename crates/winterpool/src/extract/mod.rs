//! Applicant identifier extraction.
//!
//! Recognized text is noisy, so no single match is trusted. Every line
//! that announces a UCAS Personal ID casts a vote; the winning value is
//! only accepted once enough votes agree. Names ride along on the same
//! lines and are voted on the same way, with "Unknown" as the fallback.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Matches an identifier announcement and captures the digits.
static PERSONAL_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"UCAS Personal ID:? ([0-9]+)").unwrap());

/// On identifier lines, captures the applicant name printed before the
/// id column.
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s].*)\s+[0-9]+\sUCAS Personal ID").unwrap());

/// Votes the winning identifier needs before it is trusted.
pub const MIN_CONSISTENT_MATCHES: usize = 3;

/// Name recorded when no name candidate was found.
pub const UNKNOWN_NAME: &str = "Unknown";

/// An accepted extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierVote {
    /// Winning identifier, kept as the exact digit string that matched.
    pub personal_id: String,

    /// Winning name candidate, or [`UNKNOWN_NAME`].
    pub name: String,

    /// How many identifier lines agreed on the winner.
    pub consistent_matches: usize,

    /// How many identifier lines the text had in total.
    pub total_matches: usize,
}

/// What a scan concluded about one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The winning identifier cleared the confidence threshold.
    Accepted(IdentifierVote),

    /// Identifier lines were found but no value repeated often enough.
    BelowThreshold { candidate: String, count: usize },

    /// Nothing in the text looked like an identifier line.
    NoMatches,
}

/// Line-oriented scanner with a configurable confidence threshold.
pub struct IdentifierScanner {
    min_consistent: usize,
}

impl IdentifierScanner {
    pub fn new() -> Self {
        Self {
            min_consistent: MIN_CONSISTENT_MATCHES,
        }
    }

    /// Scanner with a non-default confidence threshold.
    pub fn with_threshold(min_consistent: usize) -> Self {
        Self { min_consistent }
    }

    /// Scans one recognized text.
    ///
    /// Each line contributes at most one identifier vote. Name candidates
    /// are only taken from lines that voted, so stray text cannot outvote
    /// the identifier column.
    pub fn scan(&self, text: &str) -> ScanOutcome {
        let mut ids: Vec<&str> = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for line in text.lines() {
            let Some(id) = PERSONAL_ID_PATTERN
                .captures(line)
                .and_then(|caps| caps.get(1))
            else {
                continue;
            };
            ids.push(id.as_str());

            if let Some(name) = NAME_PATTERN.captures(line).and_then(|caps| caps.get(1)) {
                names.push(name.as_str());
            }
        }

        if ids.is_empty() {
            return ScanOutcome::NoMatches;
        }

        let ranked = rank_by_count(&ids);
        let Some(&(winner, count)) = ranked.first() else {
            return ScanOutcome::NoMatches;
        };

        if count < self.min_consistent {
            return ScanOutcome::BelowThreshold {
                candidate: winner.to_string(),
                count,
            };
        }

        let name = rank_by_count(&names)
            .first()
            .map(|&(name, _)| name.to_string())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        ScanOutcome::Accepted(IdentifierVote {
            personal_id: winner.to_string(),
            name,
            consistent_matches: count,
            total_matches: ids.len(),
        })
    }
}

impl Default for IdentifierScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Tallies values and ranks them by descending count. The sort is
/// stable, so equal counts keep first-encounter order.
fn rank_by_count<'a>(values: &[&'a str]) -> Vec<(&'a str, usize)> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for value in values {
        if !counts.contains_key(value) {
            order.push(value);
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = order
        .into_iter()
        .map(|value| (value, counts.get(value).copied().unwrap_or(0)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_vote_wins_with_counts() {
        let text = "\
UCAS Personal ID: 123456
Janet Smith 123456 UCAS Personal ID: 123456
noise line
UCAS Personal ID: 999999
UCAS Personal ID: 123456
UCAS Personal ID: 999999
UCAS Personal ID: 123456
";

        match IdentifierScanner::new().scan(text) {
            ScanOutcome::Accepted(vote) => {
                assert_eq!(vote.personal_id, "123456");
                assert_eq!(vote.consistent_matches, 4);
                assert_eq!(vote.total_matches, 6);
            }
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_too_few_consistent_matches_rejected() {
        let text = "UCAS Personal ID: 123456\nUCAS Personal ID: 123456\n";

        match IdentifierScanner::new().scan(text) {
            ScanOutcome::BelowThreshold { candidate, count } => {
                assert_eq!(candidate, "123456");
                assert_eq!(count, 2);
            }
            other => panic!("Expected below-threshold, got {:?}", other),
        }
    }

    #[test]
    fn test_text_without_identifier_lines() {
        let outcome = IdentifierScanner::new().scan("Dear Admissions Team,\nplease find attached");
        assert_eq!(outcome, ScanOutcome::NoMatches);
    }

    #[test]
    fn test_tied_vote_keeps_first_encountered() {
        let text = "UCAS Personal ID: 111111\nUCAS Personal ID: 222222\n";

        match IdentifierScanner::with_threshold(1).scan(text) {
            ScanOutcome::Accepted(vote) => assert_eq!(vote.personal_id, "111111"),
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_name_extracted_from_identifier_lines() {
        let text = "\
Janet Smith 123456 UCAS Personal ID: 123456
Janet Smith 123456 UCAS Personal ID: 123456
Janet Smith 123456 UCAS Personal ID: 123456
";

        match IdentifierScanner::new().scan(text) {
            ScanOutcome::Accepted(vote) => {
                assert_eq!(vote.name, "Janet Smith");
                assert_eq!(vote.consistent_matches, 3);
            }
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_name_falls_back_to_unknown() {
        let text = "UCAS Personal ID: 123456\n".repeat(3);

        match IdentifierScanner::new().scan(&text) {
            ScanOutcome::Accepted(vote) => assert_eq!(vote.name, UNKNOWN_NAME),
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_names_only_counted_on_voting_lines() {
        // The Bob Jones lines carry no identifier announcement with
        // digits, so they must not take part in the name vote.
        let text = "\
Ann Lee 555555 UCAS Personal ID: 555555
Bob Jones 11 UCAS Personal ID
Bob Jones 11 UCAS Personal ID
";

        match IdentifierScanner::with_threshold(1).scan(text) {
            ScanOutcome::Accepted(vote) => {
                assert_eq!(vote.name, "Ann Lee");
                assert_eq!(vote.total_matches, 1);
            }
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_one_vote_per_line() {
        let text = "UCAS Personal ID: 777777 and again UCAS Personal ID: 777777\n";

        match IdentifierScanner::with_threshold(1).scan(text) {
            ScanOutcome::Accepted(vote) => {
                assert_eq!(vote.consistent_matches, 1);
                assert_eq!(vote.total_matches, 1);
            }
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_identifier_kept_as_exact_digit_string() {
        let text = "UCAS Personal ID: 0012345\n".repeat(3);

        match IdentifierScanner::new().scan(&text) {
            ScanOutcome::Accepted(vote) => assert_eq!(vote.personal_id, "0012345"),
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_colon_optional_in_announcement() {
        let text = "UCAS Personal ID 424242\n".repeat(3);

        match IdentifierScanner::new().scan(&text) {
            ScanOutcome::Accepted(vote) => assert_eq!(vote.personal_id, "424242"),
            other => panic!("Expected acceptance, got {:?}", other),
        }
    }
}
