//! Suggestion engine.
//!
//! A fixed, ordered table of independent rules. Every rule runs over the full
//! track list; a rule yields a [`Suggestion`] only when its match count reaches
//! the rule's minimum size. Rules overlap freely: a track can land in several
//! suggestions or none.

use chrono::{DateTime, Utc};

use crate::models::{History, Suggestion, Track, UsageIndex, UsageRecord};
use crate::thresholds::ThresholdConfig;

const OLD_SCHOOL_MAX_YEAR: i32 = 2005;
const NEW_MIN_YEAR: i32 = 2016;
const HITS_MIN_POPULARITY: u8 = 70;
const DEEP_MAX_POPULARITY: u8 = 40;
const METADATA_MIN_SIZE: usize = 10;

const LONG_AGO_MIN_PLAYS: u32 = 5;
const LONG_AGO_MIN_AGE_DAYS: f64 = 180.0;
const SKIPPED_MIN_PLAYS: u32 = 3;
const SKIPPED_MIN_SKIPS: u32 = 2;
const SKIPPED_MIN_RATE: f64 = 0.5;
const USAGE_MIN_SIZE: usize = 5;
const SKIPPED_MIN_SIZE: usize = 3;

/// Everything a rule predicate may look at.
pub struct RuleContext<'a> {
    pub usage: Option<&'a UsageIndex>,
    pub thresholds: &'a ThresholdConfig,
    pub now: DateTime<Utc>,
}

type Predicate = Box<dyn Fn(&Track, &RuleContext<'_>) -> bool>;

/// One row of the rule table.
pub struct Rule {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub min_size: usize,
    pub needs_usage: bool,
    /// The predicate as shown to the user, with threshold values filled in.
    pub rule_description: String,
    predicate: Predicate,
}

impl Rule {
    pub fn matches(&self, track: &Track, ctx: &RuleContext<'_>) -> bool {
        (self.predicate)(track, ctx)
    }
}

fn predicate(f: impl Fn(&Track, &RuleContext<'_>) -> bool + 'static) -> Predicate {
    Box::new(f)
}

/// Frequently skipped: at least 3 plays, 2 skips, and half of plays skipped.
/// The play floor keeps the ratio away from a zero divisor.
pub fn is_frequently_skipped(record: &UsageRecord) -> bool {
    record.plays >= SKIPPED_MIN_PLAYS
        && record.skips >= SKIPPED_MIN_SKIPS
        && record
            .skip_rate()
            .is_some_and(|rate| rate >= SKIPPED_MIN_RATE)
}

/// Build the rule table for the given thresholds, in evaluation order.
pub fn rules(thresholds: &ThresholdConfig) -> Vec<Rule> {
    let bp = thresholds.barely_played;
    let tr = thresholds.tourists;
    let cf = thresholds.core_favorites;

    vec![
        Rule {
            id: "era-old-school",
            label: "Old school",
            description: "Tracks released in 2005 or earlier",
            min_size: METADATA_MIN_SIZE,
            needs_usage: false,
            rule_description: format!("year ≤ {OLD_SCHOOL_MAX_YEAR}"),
            predicate: predicate(|t, _| t.year.is_some_and(|y| y <= OLD_SCHOOL_MAX_YEAR)),
        },
        Rule {
            id: "era-mid",
            label: "2006–2015",
            description: "Tracks released between 2006 and 2015",
            min_size: METADATA_MIN_SIZE,
            needs_usage: false,
            rule_description: format!(
                "{} ≤ year ≤ {}",
                OLD_SCHOOL_MAX_YEAR + 1,
                NEW_MIN_YEAR - 1
            ),
            predicate: predicate(|t, _| {
                t.year
                    .is_some_and(|y| (OLD_SCHOOL_MAX_YEAR + 1..NEW_MIN_YEAR).contains(&y))
            }),
        },
        Rule {
            id: "era-new",
            label: "New releases",
            description: "Tracks released in 2016 or later",
            min_size: METADATA_MIN_SIZE,
            needs_usage: false,
            rule_description: format!("year ≥ {NEW_MIN_YEAR}"),
            predicate: predicate(|t, _| t.year.is_some_and(|y| y >= NEW_MIN_YEAR)),
        },
        Rule {
            id: "pop-hits",
            label: "Hits",
            description: "The most popular tracks in the catalog",
            min_size: METADATA_MIN_SIZE,
            needs_usage: false,
            rule_description: format!("popularity ≥ {HITS_MIN_POPULARITY}"),
            predicate: predicate(|t, _| t.popularity.is_some_and(|p| p >= HITS_MIN_POPULARITY)),
        },
        Rule {
            id: "pop-deep",
            label: "Deep cuts",
            description: "Lesser-known tracks",
            min_size: METADATA_MIN_SIZE,
            needs_usage: false,
            rule_description: format!("popularity ≤ {DEEP_MAX_POPULARITY}"),
            predicate: predicate(|t, _| t.popularity.is_some_and(|p| p <= DEEP_MAX_POPULARITY)),
        },
        Rule {
            id: "usage-barely-played",
            label: "Barely played",
            description: "Tracks you have hardly listened to (or never, per your history)",
            min_size: USAGE_MIN_SIZE,
            needs_usage: true,
            rule_description: format!(
                "plays ≤ {} OR minutes ≤ {} (no history counts as barely played)",
                bp.max_plays, bp.max_minutes
            ),
            predicate: predicate(|t, ctx| match history(t, ctx) {
                History::NoRecord => true,
                History::Unplayed(r) | History::Played(r) => {
                    let bp = ctx.thresholds.barely_played;
                    r.plays as f64 <= bp.max_plays || r.minutes() <= bp.max_minutes
                }
            }),
        },
        Rule {
            id: "usage-long-ago",
            label: "Old favorites",
            description: "Tracks you played a lot but not in the last six months",
            min_size: USAGE_MIN_SIZE,
            needs_usage: true,
            rule_description: format!(
                "plays ≥ {LONG_AGO_MIN_PLAYS} AND last played > {LONG_AGO_MIN_AGE_DAYS} days ago"
            ),
            predicate: predicate(|t, ctx| match history(t, ctx) {
                History::NoRecord | History::Unplayed(_) => false,
                History::Played(r) => {
                    r.plays >= LONG_AGO_MIN_PLAYS
                        && r
                            .last_played_age_days(ctx.now)
                            .is_some_and(|age| age > LONG_AGO_MIN_AGE_DAYS)
                }
            }),
        },
        Rule {
            id: "usage-frequently-skipped",
            label: "Frequently skipped",
            description: "Tracks you usually skip",
            min_size: SKIPPED_MIN_SIZE,
            needs_usage: true,
            rule_description: format!(
                "plays ≥ {SKIPPED_MIN_PLAYS} AND skips ≥ {SKIPPED_MIN_SKIPS} AND skips/plays ≥ {SKIPPED_MIN_RATE}"
            ),
            predicate: predicate(|t, ctx| match history(t, ctx) {
                History::NoRecord | History::Unplayed(_) => false,
                History::Played(r) => is_frequently_skipped(r),
            }),
        },
        Rule {
            id: "usage-core-favorites",
            label: "Core favorites",
            description: "The tracks you keep coming back to",
            min_size: USAGE_MIN_SIZE,
            needs_usage: true,
            rule_description: format!(
                "plays ≥ {} AND minutes ≥ {}",
                cf.min_plays, cf.min_minutes
            ),
            predicate: predicate(|t, ctx| match history(t, ctx) {
                History::NoRecord => false,
                History::Unplayed(r) | History::Played(r) => {
                    let cf = ctx.thresholds.core_favorites;
                    r.plays as f64 >= cf.min_plays && r.minutes() >= cf.min_minutes
                }
            }),
        },
        Rule {
            id: "usage-tourists",
            label: "Tourists",
            description: "Tracks that passed through briefly and never stuck",
            min_size: USAGE_MIN_SIZE,
            needs_usage: true,
            rule_description: format!(
                "plays ≤ {} AND minutes ≤ {} (no history counts as a tourist)",
                tr.max_plays, tr.max_minutes
            ),
            predicate: predicate(|t, ctx| match history(t, ctx) {
                History::NoRecord => true,
                History::Unplayed(r) | History::Played(r) => {
                    let tr = ctx.thresholds.tourists;
                    r.plays as f64 <= tr.max_plays && r.minutes() <= tr.max_minutes
                }
            }),
        },
    ]
}

fn history<'a>(track: &Track, ctx: &RuleContext<'a>) -> History<'a> {
    match ctx.usage {
        Some(index) => index.history(&track.id),
        None => History::NoRecord,
    }
}

/// Run every rule and return the suggestions that pass their size gate, in
/// rule order. Usage rules are skipped entirely without a usage index.
pub fn suggest(
    tracks: &[Track],
    usage: Option<&UsageIndex>,
    thresholds: &ThresholdConfig,
    now: DateTime<Utc>,
) -> Vec<Suggestion> {
    let ctx = RuleContext {
        usage,
        thresholds,
        now,
    };

    rules(thresholds)
        .into_iter()
        .filter(|rule| !rule.needs_usage || usage.is_some())
        .filter_map(|rule| {
            let matched: Vec<Track> = tracks
                .iter()
                .filter(|t| rule.matches(t, &ctx))
                .cloned()
                .collect();

            if matched.len() < rule.min_size {
                log::trace!(
                    "{}: {} matches, below minimum {}",
                    rule.id,
                    matched.len(),
                    rule.min_size
                );
                return None;
            }

            log::debug!("{}: {} tracks", rule.id, matched.len());
            Some(Suggestion {
                id: rule.id.to_string(),
                label: rule.label.to_string(),
                description: rule.description.to_string(),
                rule_description: rule.rule_description,
                tracks: matched,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AudioFeatures;
    use crate::thresholds::{Preset, ThresholdField, ThresholdState};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn make_track(id: &str, year: Option<i32>, popularity: Option<u8>) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Song {id}"),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
            year,
            popularity,
            audio: AudioFeatures::default(),
        }
    }

    fn tracks(prefix: &str, n: usize, year: Option<i32>, popularity: Option<u8>) -> Vec<Track> {
        (0..n)
            .map(|i| make_track(&format!("{prefix}{i}"), year, popularity))
            .collect()
    }

    fn record(plays: u32, total_ms: u64, days_ago: Option<i64>, skips: u32) -> UsageRecord {
        UsageRecord {
            plays,
            total_listened_ms: total_ms,
            last_played: days_ago.map(|d| now() - Duration::days(d)),
            skips,
            skip_ms: 0,
        }
    }

    fn ids(s: &Suggestion) -> Vec<&str> {
        s.tracks.iter().map(|t| t.id.as_str()).collect()
    }

    fn find<'a>(suggestions: &'a [Suggestion], id: &str) -> Option<&'a Suggestion> {
        suggestions.iter().find(|s| s.id == id)
    }

    #[test]
    fn test_era_gate_below_minimum() {
        let mut all = tracks("old", 6, Some(2001), None);
        all.extend(tracks("x", 6, None, None));
        let out = suggest(&all, None, &ThresholdConfig::default(), now());
        assert!(out.is_empty());
    }

    #[test]
    fn test_metadata_rules_and_order() {
        let mut all = tracks("old", 10, Some(2005), Some(75));
        all.extend(tracks("mid", 10, Some(2006), Some(40)));
        all.extend(tracks("new", 10, Some(2016), None));
        let out = suggest(&all, None, &ThresholdConfig::default(), now());

        let order: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["era-old-school", "era-mid", "era-new", "pop-hits", "pop-deep"]);
        assert_eq!(out[0].tracks.len(), 10);
        assert!(ids(&out[3]).iter().all(|id| id.starts_with("old")));
        assert!(ids(&out[4]).iter().all(|id| id.starts_with("mid")));
    }

    #[test]
    fn test_missing_metadata_excluded_from_pool() {
        let mut all = tracks("a", 9, Some(2010), Some(80));
        all.extend(tracks("b", 5, None, None));
        let out = suggest(&all, None, &ThresholdConfig::default(), now());
        assert!(find(&out, "era-mid").is_none());
        assert!(find(&out, "pop-hits").is_none());
    }

    #[test]
    fn test_no_usage_index_skips_usage_rules() {
        let all = tracks("t", 20, None, None);
        let out = suggest(&all, None, &ThresholdConfig::default(), now());
        assert!(out.is_empty());

        // An empty index is still an index: every track has no history.
        let empty = UsageIndex::new();
        let out = suggest(&all, Some(&empty), &ThresholdConfig::default(), now());
        let order: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["usage-barely-played", "usage-tourists"]);
    }

    #[test]
    fn test_absent_history_policy() {
        let mut all = tracks("none", 5, None, None);
        all.extend(tracks("fav", 5, None, None));
        let mut usage = UsageIndex::new();
        for t in &all[5..] {
            usage.insert(t.id.clone(), record(50, 10_000_000, Some(200), 40));
        }

        let out = suggest(&all, Some(&usage), &ThresholdConfig::default(), now());
        let barely = find(&out, "usage-barely-played").unwrap();
        let tourists = find(&out, "usage-tourists").unwrap();
        assert!(ids(barely).iter().all(|id| id.starts_with("none")));
        assert!(ids(tourists).iter().all(|id| id.starts_with("none")));

        for id in ["usage-long-ago", "usage-frequently-skipped", "usage-core-favorites"] {
            let s = find(&out, id).unwrap();
            assert!(ids(s).iter().all(|id| id.starts_with("fav")), "{id}");
        }
    }

    #[test]
    fn test_long_ago_favorite_scenario() {
        let all = tracks("a", 5, None, None);
        let mut usage = UsageIndex::new();
        for t in &all {
            usage.insert(t.id.clone(), record(20, 2_000_000, Some(200), 0));
        }
        let out = suggest(&all, Some(&usage), &ThresholdConfig::default(), now());
        assert!(find(&out, "usage-long-ago").is_some());
        assert!(find(&out, "usage-barely-played").is_none());
        assert!(find(&out, "usage-tourists").is_none());

        let thresholds = ThresholdConfig::default();
        let ctx = RuleContext {
            usage: Some(&usage),
            thresholds: &thresholds,
            now: now(),
        };
        let table = rules(&ThresholdConfig::default());
        let matched: Vec<&str> = table
            .iter()
            .filter(|r| r.matches(&all[0], &ctx))
            .map(|r| r.id)
            .collect();
        assert_eq!(matched, vec!["usage-long-ago"]);
    }

    #[test]
    fn test_long_ago_boundary_and_missing_timestamp() {
        let t = make_track("a", None, None);
        let table = rules(&ThresholdConfig::default());
        let rule = table.iter().find(|r| r.id == "usage-long-ago").unwrap();

        let mut usage = UsageIndex::new();
        usage.insert("a", record(5, 0, Some(180), 0));
        let cfg = ThresholdConfig::default();
        let ctx = RuleContext { usage: Some(&usage), thresholds: &cfg, now: now() };
        assert!(!rule.matches(&t, &ctx));

        usage.insert("a", record(5, 0, Some(181), 0));
        let ctx = RuleContext { usage: Some(&usage), thresholds: &cfg, now: now() };
        assert!(rule.matches(&t, &ctx));

        usage.insert("a", record(5, 0, None, 0));
        let ctx = RuleContext { usage: Some(&usage), thresholds: &cfg, now: now() };
        assert!(!rule.matches(&t, &ctx));
    }

    #[test]
    fn test_skip_rule_never_divides_by_zero() {
        assert!(!is_frequently_skipped(&record(0, 0, None, 10)));
        assert!(!is_frequently_skipped(&record(2, 0, None, 2)));
        assert!(!is_frequently_skipped(&record(5, 0, None, 2)));
        assert!(is_frequently_skipped(&record(4, 0, None, 2)));
        // skips > plays is tolerated
        assert!(is_frequently_skipped(&record(3, 0, None, 9)));
    }

    #[test]
    fn test_frequently_skipped_gate_is_three() {
        let all = tracks("s", 3, None, None);
        let mut usage = UsageIndex::new();
        for t in &all {
            usage.insert(t.id.clone(), record(4, 600_000, Some(1), 3));
        }
        let out = suggest(&all, Some(&usage), &ThresholdConfig::default(), now());
        assert_eq!(find(&out, "usage-frequently-skipped").map(|s| s.tracks.len()), Some(3));
    }

    #[test]
    fn test_zero_play_record_is_not_absence() {
        // A record with zero plays is barely played by its numbers, not by absence.
        let all = tracks("z", 5, None, None);
        let mut usage = UsageIndex::new();
        for t in &all {
            usage.insert(t.id.clone(), UsageRecord::default());
        }
        let mut cfg = ThresholdConfig::default();
        cfg.core_favorites.min_plays = 0.0;
        cfg.core_favorites.min_minutes = 0.0;
        let out = suggest(&all, Some(&usage), &cfg, now());
        assert!(find(&out, "usage-core-favorites").is_some());
        assert!(find(&out, "usage-long-ago").is_none());
    }

    #[test]
    fn test_threshold_boundaries_inclusive() {
        let t = make_track("a", None, None);
        let mut usage = UsageIndex::new();
        // Exactly 10 minutes and 20 plays: on both the barely-played and core-favorite edges.
        usage.insert("a", record(20, 600_000, Some(1), 0));
        let mut cfg = ThresholdConfig::default();
        cfg.core_favorites.min_minutes = 10.0;
        let ctx = RuleContext { usage: Some(&usage), thresholds: &cfg, now: now() };
        let table = rules(&cfg);
        let hit = |id: &str| table.iter().find(|r| r.id == id).unwrap().matches(&t, &ctx);

        assert!(hit("usage-barely-played"));
        assert!(hit("usage-core-favorites"));
        assert!(!hit("usage-tourists"));
    }

    #[test]
    fn test_rule_descriptions_carry_thresholds() {
        let mut state = ThresholdState::from_preset(Preset::Aggressive);
        state.edit(ThresholdField::TouristsMaxMinutes, 7.5);
        let table = rules(&state.config);
        let desc = |id: &str| table.iter().find(|r| r.id == id).unwrap().rule_description.clone();

        assert_eq!(desc("era-old-school"), "year ≤ 2005");
        assert_eq!(desc("era-mid"), "2006 ≤ year ≤ 2015");
        assert!(desc("usage-barely-played").starts_with("plays ≤ 5 OR minutes ≤ 20"));
        assert!(desc("usage-tourists").starts_with("plays ≤ 3 AND minutes ≤ 7.5"));
        assert_eq!(desc("usage-core-favorites"), "plays ≥ 10 AND minutes ≥ 30");
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let mut all = tracks("a", 12, Some(1999), Some(90));
        all.extend(tracks("b", 12, Some(2020), Some(10)));
        let mut usage = UsageIndex::new();
        for (i, t) in all.iter().enumerate() {
            let n = i as u32;
            usage.insert(
                t.id.clone(),
                record(n, n as u64 * 100_000, Some(n as i64 * 20), n / 2),
            );
        }
        let cfg = ThresholdConfig::default();
        let first = suggest(&all, Some(&usage), &cfg, now());
        let second = suggest(&all, Some(&usage), &cfg, now());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
