//! Playlist-level listening statistics.

use chrono::{DateTime, Utc};

use crate::models::{PlaylistHealth, Track, UsageIndex};
use crate::suggest::is_frequently_skipped;

/// Summarize how a playlist is actually listened to.
///
/// Returns `None` when there are no tracks or the usage index is missing or
/// empty. Tracks without history count as zero plays.
pub fn summarize(
    tracks: &[Track],
    usage: Option<&UsageIndex>,
    now: DateTime<Utc>,
) -> Option<PlaylistHealth> {
    let usage = usage.filter(|u| !u.is_empty())?;
    if tracks.is_empty() {
        return None;
    }

    let total = tracks.len() as f64;
    let records: Vec<_> = tracks.iter().map(|t| usage.get(&t.id)).collect();

    let never_played = records
        .iter()
        .filter(|r| r.is_none_or(|r| r.plays == 0))
        .count();
    let frequently_skipped = records
        .iter()
        .flatten()
        .filter(|r| is_frequently_skipped(r))
        .count();

    let mut plays: Vec<u32> = records
        .iter()
        .map(|r| r.map(|r| r.plays).unwrap_or(0))
        .collect();

    let ages: Vec<f64> = records
        .iter()
        .flatten()
        .filter_map(|r| r.last_played_age_days(now))
        .filter(|age| *age >= 0.0)
        .collect();
    let avg_age = if ages.is_empty() {
        None
    } else {
        Some(round(ages.iter().sum::<f64>() / ages.len() as f64))
    };

    Some(PlaylistHealth {
        never_played_pct: round(100.0 * never_played as f64 / total),
        frequently_skipped_pct: round(100.0 * frequently_skipped as f64 / total),
        median_plays: round(median(&mut plays)),
        avg_last_play_age_days: avg_age,
    })
}

/// Median of play counts; even lengths average the two middle values.
pub fn median(values: &mut [u32]) -> f64 {
    values.sort_unstable();
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        values[n / 2] as f64
    } else {
        (values[n / 2 - 1] as f64 + values[n / 2] as f64) / 2.0
    }
}

/// Half-up rounding of a non-negative value.
fn round(v: f64) -> u32 {
    (v + 0.5).floor().max(0.0) as u32
}
