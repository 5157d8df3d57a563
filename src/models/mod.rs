use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ranked tiers, best to worst. The weight feeds the user embedding: items
/// placed higher contribute proportionally more to the averaged vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
    E,
    F,
}

/// Canonical tier ordering used when grouping items into training sentences.
pub const TIER_ORDER: [Tier; 7] = [
    Tier::S,
    Tier::A,
    Tier::B,
    Tier::C,
    Tier::D,
    Tier::E,
    Tier::F,
];

impl Tier {
    /// Static tier -> weight table. Monotonically decreasing from S to F.
    pub fn weight(&self) -> f32 {
        match self {
            Tier::S => 6.0,
            Tier::A => 5.0,
            Tier::B => 4.0,
            Tier::C => 3.0,
            Tier::D => 2.0,
            Tier::E => 1.0,
            Tier::F => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::S => "S",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
            Tier::E => "E",
            Tier::F => "F",
        }
    }
}

/// A user's current tier list: catalog item id -> tier. Unranked items are
/// simply absent. BTreeMap keeps item iteration order stable for a given
/// snapshot, which keeps training corpora and tests reproducible.
pub type TierList = BTreeMap<String, Tier>;

/// Tier list as persisted, with submission time for resubmission auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTierList {
    pub user_id: String,
    pub tier_list: TierList,
    pub submitted_at: DateTime<Utc>,
}

/// Gender / partner-preference profile, owned by the user directory.
/// `preference` is a comma-separated list of accepted genders; "both" or
/// "any" accepts unconditionally, as does an empty preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub gender: String,
    #[serde(default)]
    pub preference: String,
}

/// Computed match list for one user. Superseded wholesale by each
/// recomputation; `computed_at` drives last-writer-wins reconciliation
/// between the submission path and the periodic rescan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub matches: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(matches: Vec<String>) -> Self {
        Self {
            matches,
            computed_at: Utc::now(),
        }
    }

    /// Same-day check used by the rescan path to skip fresh results.
    pub fn is_same_day_as(&self, now: DateTime<Utc>) -> bool {
        self.computed_at.date_naive() == now.date_naive()
    }
}

/// Outcome of a single tier-list submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub stored: bool,
    pub match_count: usize,
}

/// Outcome of a bulk rescan pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescanOutcome {
    pub processed_count: usize,
    pub new_match_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_weights_decrease_monotonically() {
        let weights: Vec<f32> = TIER_ORDER.iter().map(|t| t.weight()).collect();
        for pair in weights.windows(2) {
            assert!(pair[0] > pair[1], "weights must strictly decrease");
        }
        assert_eq!(Tier::F.weight(), 0.0);
    }

    #[test]
    fn tier_round_trips_through_json() {
        let list: TierList = [
            ("Nami".to_string(), Tier::S),
            ("Usopp".to_string(), Tier::F),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&list).unwrap();
        let back: TierList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn match_record_same_day() {
        let record = MatchRecord::new(vec!["u2".to_string()]);
        assert!(record.is_same_day_as(Utc::now()));
    }
}
