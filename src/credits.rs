use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use crate::historical_dataset::{HistoryIndex, PlayerMatchRecord};
use crate::match_data::RosterPlayer;
use crate::roles::{Role, RoleLookup};

pub const CREDITS_MIN: f64 = 4.0;
pub const CREDITS_MAX: f64 = 11.0;

/// Players with fewer eligible records than this are valued by the newcomer
/// clamp instead of the percentile path.
pub const MIN_HISTORY_FOR_PERCENTILE: usize = 10;

const COMPOSITE_WINDOW: usize = 10;
const DEFAULT_PERCENTILE: f64 = 50.0;

/// A roster player after the enrichment pass: role resolved, credits
/// assigned. Produced fresh per request; nothing upstream is mutated.
#[derive(Debug, Clone)]
pub struct AnnotatedPlayer {
    pub player_id: String,
    pub name: String,
    pub team: String,
    pub role: Role,
    pub credits: f64,
}

/// Resolve roles and assign credits for a whole roster as of `match_date`.
/// Every roster player gets exactly one annotation; sparse or absent history
/// falls back to documented defaults rather than erroring.
pub fn annotate_roster(
    players: &[RosterPlayer],
    match_date: NaiveDate,
    roles: &RoleLookup,
    history: &HistoryIndex,
) -> Vec<AnnotatedPlayer> {
    let season = match_date.year();
    players
        .iter()
        .map(|p| {
            let role = roles.resolve(&p.player_id, season);
            let credits = credits_for_player(&p.player_id, role, match_date, roles, history);
            AnnotatedPlayer {
                player_id: p.player_id.clone(),
                name: p.name.clone(),
                team: p.team.clone(),
                role,
                credits,
            }
        })
        .collect()
}

/// Credits map view of [`annotate_roster`].
pub fn credits_map(annotated: &[AnnotatedPlayer]) -> HashMap<String, f64> {
    annotated
        .iter()
        .map(|p| (p.player_id.clone(), p.credits))
        .collect()
}

fn credits_for_player(
    player_id: &str,
    role: Role,
    match_date: NaiveDate,
    roles: &RoleLookup,
    history: &HistoryIndex,
) -> f64 {
    let eligible = history.records_before(player_id, match_date);

    if eligible.len() < MIN_HISTORY_FOR_PERCENTILE {
        let median = role_median_credits(role);
        // The medians are fixed today, but the clamp is the contract: a
        // per-player median source must still land within +-0.5 of it.
        return round2(median.clamp(median - 0.5, median + 0.5));
    }

    let composite = composite_score(last_window(eligible));
    let percentile = percentile_within_role(player_id, role, composite, match_date, roles, history);
    round2(credits_from_percentile(percentile)).clamp(CREDITS_MIN, CREDITS_MAX)
}

/// Fixed per-role medians backing the newcomer clamp.
pub fn role_median_credits(role: Role) -> f64 {
    match role {
        Role::Keeper => 7.5,
        Role::Batter => 8.0,
        Role::AllRounder => 7.8,
        Role::Bowler => 7.2,
    }
}

fn last_window(records: &[PlayerMatchRecord]) -> &[PlayerMatchRecord] {
    let start = records.len().saturating_sub(COMPOSITE_WINDOW);
    &records[start..]
}

/// Recency-weighted, volatility-penalized summary of the last ten matches:
/// `0.7 * mean + 0.3 * (mean - std)`.
pub fn composite_score(records: &[PlayerMatchRecord]) -> f64 {
    let mu = mean(records);
    let std = sample_std(records, mu);
    0.7 * mu + 0.3 * (mu - std)
}

fn mean(records: &[PlayerMatchRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.fantasy_points).sum::<f64>() / records.len() as f64
}

fn sample_std(records: &[PlayerMatchRecord], mu: f64) -> f64 {
    if records.len() < 2 {
        return 0.0;
    }
    let var = records
        .iter()
        .map(|r| {
            let d = r.fantasy_points - mu;
            d * d
        })
        .sum::<f64>()
        / (records.len() - 1) as f64;
    let std = var.sqrt();
    if std.is_finite() { std } else { 0.0 }
}

/// Rank `composite` among every OTHER player of the same resolved role with
/// a full history window as of the same date. Strict-less-than counting
/// keeps ties order-insensitive; no comparable peers defaults to 50.
fn percentile_within_role(
    player_id: &str,
    role: Role,
    composite: f64,
    match_date: NaiveDate,
    roles: &RoleLookup,
    history: &HistoryIndex,
) -> f64 {
    let season = match_date.year();
    let mut peers = 0usize;
    let mut below = 0usize;

    for pid in history.player_ids() {
        if pid == player_id {
            continue;
        }
        if roles.resolve(pid, season) != role {
            continue;
        }
        let records = history.records_before(pid, match_date);
        if records.len() < MIN_HISTORY_FOR_PERCENTILE {
            continue;
        }
        let score = composite_score(last_window(records));
        peers += 1;
        if score < composite {
            below += 1;
        }
    }

    if peers == 0 {
        DEFAULT_PERCENTILE
    } else {
        100.0 * below as f64 / peers as f64
    }
}

/// Piecewise-linear percentile-to-credits bands.
pub fn credits_from_percentile(percentile: f64) -> f64 {
    if percentile >= 90.0 {
        10.5 + ((percentile - 90.0) / 10.0) * 0.5
    } else if percentile >= 70.0 {
        9.0 + ((percentile - 70.0) / 20.0) * 1.0
    } else if percentile >= 30.0 {
        7.0 + ((percentile - 30.0) / 40.0) * 1.5
    } else {
        4.0 + (percentile / 30.0) * 2.5
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical_dataset::HistoryIndex;

    fn record(player_id: &str, n: u32, fp: f64) -> PlayerMatchRecord {
        PlayerMatchRecord {
            player_id: player_id.to_string(),
            match_id: format!("m{n:03}"),
            match_date: NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .checked_add_days(chrono::Days::new(n as u64))
                .unwrap(),
            team: "T1".to_string(),
            opponent: "T2".to_string(),
            venue: "V".to_string(),
            fantasy_points: fp,
            runs: 0,
            balls_faced: 0,
            fours: 0,
            sixes: 0,
            wickets: 0,
            catches: 0,
        }
    }

    fn flat_history(player_id: &str, matches: u32, fp: f64) -> Vec<PlayerMatchRecord> {
        (0..matches).map(|n| record(player_id, n, fp)).collect()
    }

    fn roster_player(player_id: &str) -> RosterPlayer {
        RosterPlayer {
            player_id: player_id.to_string(),
            name: player_id.to_uppercase(),
            team: "T1".to_string(),
        }
    }

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn band_edges_map_to_documented_ranges() {
        assert_eq!(credits_from_percentile(0.0), 4.0);
        assert_eq!(credits_from_percentile(30.0), 7.0);
        assert_eq!(credits_from_percentile(50.0), 7.75);
        assert_eq!(credits_from_percentile(70.0), 9.0);
        assert_eq!(credits_from_percentile(90.0), 10.5);
        assert_eq!(credits_from_percentile(100.0), 11.0);
        // Just under a band edge stays in the lower band.
        assert!(credits_from_percentile(69.99) < 9.0);
    }

    #[test]
    fn constant_history_has_zero_std() {
        let records = flat_history("p1", 10, 40.0);
        // std 0 means the composite collapses to the mean.
        assert!((composite_score(&records) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn single_record_window_does_not_produce_nan() {
        let records = flat_history("p1", 1, 25.0);
        let score = composite_score(&records);
        assert!(score.is_finite());
        assert!((score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn newcomer_with_nine_records_gets_role_median() {
        let history = HistoryIndex::from_records(flat_history("p1", 9, 90.0));
        let roles = RoleLookup::default();
        let annotated = annotate_roster(&[roster_player("p1")], cutoff(), &roles, &history);
        // Nine records is below the window; default role is BAT.
        assert_eq!(annotated[0].credits, 8.0);
    }

    #[test]
    fn ten_records_switch_to_percentile_path() {
        let history = HistoryIndex::from_records(flat_history("p1", 10, 90.0));
        let roles = RoleLookup::default();
        let annotated = annotate_roster(&[roster_player("p1")], cutoff(), &roles, &history);
        // No peers: percentile defaults to 50, the middle band.
        assert_eq!(annotated[0].credits, 7.75);
    }

    #[test]
    fn newcomer_clamp_respects_each_role_median() {
        let mut roles = RoleLookup::default();
        roles.insert_global("wk", Role::Keeper);
        roles.insert_global("ar", Role::AllRounder);
        roles.insert_global("bowl", Role::Bowler);
        let history = HistoryIndex::default();

        let players: Vec<RosterPlayer> =
            ["wk", "ar", "bowl"].iter().map(|id| roster_player(id)).collect();
        let annotated = annotate_roster(&players, cutoff(), &roles, &history);
        assert_eq!(annotated[0].credits, 7.5);
        assert_eq!(annotated[1].credits, 7.8);
        assert_eq!(annotated[2].credits, 7.2);
    }

    #[test]
    fn top_of_role_maps_into_top_band() {
        // p1 outscores three same-role peers: percentile 100 -> 11.0.
        let mut records = flat_history("p1", 10, 80.0);
        records.extend(flat_history("p2", 10, 30.0));
        records.extend(flat_history("p3", 10, 35.0));
        records.extend(flat_history("p4", 10, 40.0));
        let history = HistoryIndex::from_records(records);
        let roles = RoleLookup::default();

        let annotated = annotate_roster(&[roster_player("p1")], cutoff(), &roles, &history);
        assert_eq!(annotated[0].credits, 11.0);
    }

    #[test]
    fn percentile_is_monotonic_in_composite() {
        // Shared peer pool, different own scores.
        let mut records = flat_history("hi", 10, 70.0);
        records.extend(flat_history("lo", 10, 20.0));
        for (i, fp) in [10.0, 30.0, 50.0, 60.0].iter().enumerate() {
            records.extend(flat_history(&format!("peer{i}"), 10, *fp));
        }
        let history = HistoryIndex::from_records(records);
        let roles = RoleLookup::default();

        let annotated = annotate_roster(
            &[roster_player("hi"), roster_player("lo")],
            cutoff(),
            &roles,
            &history,
        );
        assert!(annotated[0].credits >= annotated[1].credits);
    }

    #[test]
    fn peers_of_other_roles_are_ignored() {
        let mut roles = RoleLookup::default();
        roles.insert_global("p1", Role::Bowler);
        // Every would-be peer is a batter, so p1 has no comparison pool.
        let mut records = flat_history("p1", 10, 5.0);
        records.extend(flat_history("p2", 10, 90.0));
        records.extend(flat_history("p3", 10, 95.0));
        let history = HistoryIndex::from_records(records);

        let annotated = annotate_roster(&[roster_player("p1")], cutoff(), &roles, &history);
        // Default percentile 50 despite a weak composite.
        assert_eq!(annotated[0].credits, 7.75);
    }

    #[test]
    fn credits_stay_in_bounds_across_extremes() {
        let mut records = flat_history("low", 10, -40.0);
        records.extend(flat_history("high", 10, 500.0));
        for i in 0..5 {
            records.extend(flat_history(&format!("peer{i}"), 10, i as f64 * 30.0));
        }
        let history = HistoryIndex::from_records(records);
        let roles = RoleLookup::default();

        let players: Vec<RosterPlayer> = ["low", "high", "peer0", "fresh"]
            .iter()
            .map(|id| roster_player(id))
            .collect();
        for p in annotate_roster(&players, cutoff(), &roles, &history) {
            assert!(
                (CREDITS_MIN..=CREDITS_MAX).contains(&p.credits),
                "{} out of bounds: {}",
                p.player_id,
                p.credits
            );
        }
    }

    #[test]
    fn only_records_before_the_match_count() {
        // Ten records, but half land after the cutoff: newcomer path.
        let records = flat_history("p1", 10, 60.0);
        let history = HistoryIndex::from_records(records);
        let mid_cutoff = NaiveDate::from_ymd_opt(2023, 1, 6).unwrap();
        let roles = RoleLookup::default();

        let annotated = annotate_roster(&[roster_player("p1")], mid_cutoff, &roles, &history);
        assert_eq!(annotated[0].credits, 8.0);
    }

    #[test]
    fn credits_map_covers_every_roster_player() {
        let history = HistoryIndex::default();
        let roles = RoleLookup::default();
        let players: Vec<RosterPlayer> =
            ["a", "b", "c"].iter().map(|id| roster_player(id)).collect();
        let annotated = annotate_roster(&players, cutoff(), &roles, &history);
        let map = credits_map(&annotated);
        assert_eq!(map.len(), 3);
        assert!(["a", "b", "c"].iter().all(|id| map.contains_key(*id)));
    }
}
