//! Mutual gender/preference eligibility.
//!
//! Pure and symmetric: two users match only when each one's gender is
//! accepted by the other's preference set. Preferences are comma-separated,
//! case-insensitive tokens; "both" or "any" accepts every gender, and an
//! empty preference defaults to that wildcard.

use std::collections::HashSet;

const WILDCARDS: [&str; 2] = ["both", "any"];

/// Parse a preference string into lowercase trimmed tokens.
pub fn parse_preferences(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn accepts(preferences: &HashSet<String>, gender: &str) -> bool {
    if preferences.is_empty() {
        return true;
    }
    if WILDCARDS.iter().any(|w| preferences.contains(*w)) {
        return true;
    }
    preferences.contains(&gender.trim().to_lowercase())
}

/// Symmetric compatibility predicate over two users' declared gender and
/// partner preference.
pub fn compatible(a_gender: &str, a_preference: &str, b_gender: &str, b_preference: &str) -> bool {
    let a_prefs = parse_preferences(a_preference);
    let b_prefs = parse_preferences(b_preference);

    accepts(&b_prefs, a_gender) && accepts(&a_prefs, b_gender)
}
