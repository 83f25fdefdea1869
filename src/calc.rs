use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// A registered student. The stored password never leaves the database
/// layer, so it is not part of this type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub fullname: String,
    pub username: String,
    pub student_no: String,
    pub birth_date: Option<String>,
    pub source_of_truth: Option<String>,
}

/// One quiz attempt for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub language: String,
    pub score: f64,
    pub time_seconds: f64,
}

/// All quiz attempts for one username, in the order the languages were
/// first attempted. At most one entry per language; `apply_entry` is the
/// only way entries get in, and it enforces that regardless of what the
/// store does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub username: String,
    pub entries: Vec<ResultEntry>,
}

impl ResultRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            entries: Vec::new(),
        }
    }

    /// Insert-or-update keyed by language. A retake overwrites the score
    /// and time in place, keeping the entry's position; a first attempt
    /// appends at the end.
    pub fn apply_entry(&mut self, language: &str, score: f64, time_seconds: f64) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.language == language) {
            existing.score = score;
            existing.time_seconds = time_seconds;
        } else {
            self.entries.push(ResultEntry {
                language: language.to_string(),
                score,
                time_seconds,
            });
        }
    }
}

/// Ranked row for one language's leaderboard. Rank is the row's 1-based
/// position in the returned sequence, not a stored field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub name: String,
    pub score: f64,
    pub time_seconds: f64,
}

/// Per-student aggregate across every language attempted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStanding {
    pub name: String,
    pub total_score: f64,
    pub scores: BTreeMap<String, f64>,
    pub status: String,
    pub areas_for_improvement: Vec<String>,
    pub skill_level: SkillLevel,
}

/// A total at or above this counts as a pass.
pub const PASS_MARK: f64 = 50.0;

/// Languages scored below this show up under "areas for improvement".
pub const IMPROVEMENT_THRESHOLD: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillLevel {
    Basic,
    Moderate,
    Advance,
    Expert,
}

impl SkillLevel {
    /// Classifies a total score into the dashboard's skill bands:
    /// below 50 BASIC, 50-70 MODERATE, 71-105 ADVANCE, above 105 EXPERT.
    ///
    /// The legacy dashboard checked `< 50` then `>= 51`, leaving exactly 50
    /// unclassified; here 50 is MODERATE, matching the published band labels.
    pub fn from_total_score(total: f64) -> Self {
        if total < PASS_MARK {
            SkillLevel::Basic
        } else if total <= 70.0 {
            SkillLevel::Moderate
        } else if total <= 105.0 {
            SkillLevel::Advance
        } else {
            SkillLevel::Expert
        }
    }

    #[allow(dead_code)]
    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::Basic => "BASIC",
            SkillLevel::Moderate => "MODERATE",
            SkillLevel::Advance => "ADVANCE",
            SkillLevel::Expert => "EXPERT",
        }
    }
}

fn fullname_by_username(accounts: &[Account]) -> HashMap<&str, &str> {
    let mut map: HashMap<&str, &str> = HashMap::with_capacity(accounts.len());
    for a in accounts {
        map.entry(a.username.as_str()).or_insert(a.fullname.as_str());
    }
    map
}

fn display_name(names: &HashMap<&str, &str>, username: &str) -> String {
    names.get(username).copied().unwrap_or(username).to_string()
}

/// Builds the ranked leaderboard for one language from store snapshots.
///
/// Each record contributes at most one row (entries are unique per
/// language). Rows are ordered by score descending, ties broken by time
/// ascending (faster first); the sort is stable beyond that. A student
/// with no matching account keeps the raw username as display name. An
/// unknown language yields an empty list.
pub fn build_leaderboard(
    records: &[ResultRecord],
    accounts: &[Account],
    language: &str,
) -> Vec<LeaderboardRow> {
    let names = fullname_by_username(accounts);

    let mut rows: Vec<LeaderboardRow> = Vec::new();
    for rec in records {
        let name = display_name(&names, &rec.username);
        for e in &rec.entries {
            if e.language == language {
                rows.push(LeaderboardRow {
                    name: name.clone(),
                    score: e.score,
                    time_seconds: e.time_seconds,
                });
            }
        }
    }

    rows.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                a.time_seconds
                    .partial_cmp(&b.time_seconds)
                    .unwrap_or(Ordering::Equal)
            })
    });
    rows
}

/// Builds one standing per result record, in store enumeration order.
pub fn build_overall_standings(
    records: &[ResultRecord],
    accounts: &[Account],
) -> Vec<OverallStanding> {
    let names = fullname_by_username(accounts);

    let mut out: Vec<OverallStanding> = Vec::with_capacity(records.len());
    for rec in records {
        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        let mut total_score = 0.0_f64;
        let mut areas_for_improvement: Vec<String> = Vec::new();

        for e in &rec.entries {
            scores.insert(e.language.clone(), e.score);
            total_score += e.score;
            if e.score < IMPROVEMENT_THRESHOLD {
                areas_for_improvement.push(e.language.to_uppercase());
            }
        }

        let status = if total_score >= PASS_MARK {
            "Pass"
        } else {
            "Fail"
        };

        out.push(OverallStanding {
            name: display_name(&names, &rec.username),
            total_score,
            scores,
            status: status.to_string(),
            areas_for_improvement,
            skill_level: SkillLevel::from_total_score(total_score),
        });
    }
    out
}
