//! Free-text email list parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Separators accepted between addresses: comma, semicolon, newline, CR and tab.
const SEPARATORS: [char; 5] = [',', ';', '\n', '\r', '\t'];

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Simple syntactic check: one `@`, non-empty local and domain parts, a `.` in
/// the domain and no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Splits `input` into normalized (trimmed, lowercased) addresses, dropping
/// anything that fails [`is_valid_email`]. Order is preserved; duplicates are kept.
pub fn parse_emails(input: &str) -> Vec<String> {
    input
        .split(|c: char| SEPARATORS.contains(&c))
        .map(|candidate| candidate.trim().to_lowercase())
        .filter(|candidate| !candidate.is_empty())
        .filter(|candidate| {
            let ok = is_valid_email(candidate);
            if !ok {
                tracing::debug!("Skipping invalid email candidate: {}", candidate);
            }
            ok
        })
        .collect()
}

/// Normalizes each entry of an already-split list the same way [`parse_emails`] does.
pub fn parse_email_list<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|entry| parse_emails(entry.as_ref()))
        .collect()
}

/// Removes repeated addresses keeping the first occurrence.
///
/// Returns the unique addresses and how many entries were removed.
pub fn dedupe(emails: Vec<String>) -> (Vec<String>, usize) {
    let original = emails.len();
    let mut seen = HashSet::with_capacity(original);
    let unique: Vec<String> = emails
        .into_iter()
        .filter(|email| seen.insert(email.clone()))
        .collect();
    let removed = original - unique.len();
    (unique, removed)
}
