use std::collections::HashMap;

use crate::match_data::{MatchData, RosterPlayer};

// Batting.
const POINTS_PER_RUN: f64 = 1.0;
const FOUR_BONUS: f64 = 1.0;
const SIX_BONUS: f64 = 2.0;
const FIFTY_BONUS: f64 = 8.0;
const HUNDRED_BONUS: f64 = 16.0;
const DUCK_PENALTY: f64 = -2.0;

// Bowling.
const POINTS_PER_WICKET: f64 = 25.0;
const FOUR_WICKET_BONUS: f64 = 8.0;
const FIVE_WICKET_BONUS: f64 = 16.0;

// Fielding.
const CATCH_POINTS: f64 = 8.0;
const STUMPING_POINTS: f64 = 12.0;
const RUN_OUT_POINTS: f64 = 6.0;

/// Fantasy points plus the raw tallies they were computed from, accumulated
/// across every innings a player appears in.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerPerformance {
    pub points: f64,
    pub runs: u32,
    pub balls_faced: u32,
    pub fours: u32,
    pub sixes: u32,
    pub wickets: u32,
    pub balls_bowled: u32,
    pub runs_conceded: u32,
    pub catches: u32,
    pub stumpings: u32,
    pub run_outs: u32,
}

#[derive(Debug, Default)]
struct BattingTally {
    runs: u32,
    balls: u32,
    fours: u32,
    sixes: u32,
    dismissed: bool,
}

#[derive(Debug, Default)]
struct BowlingTally {
    wickets: u32,
    balls: u32,
    runs_conceded: u32,
}

#[derive(Debug, Default)]
struct FieldingTally {
    catches: u32,
    stumpings: u32,
    run_outs: u32,
}

/// Score one match from its ball-by-ball log.
///
/// Every rostered player gets an entry, zeroed if they never appear in the
/// log. Names that do not resolve to a rostered id are dropped without
/// error. An empty log yields all zeros. The bonus table is applied once per
/// player per innings; innings totals accumulate.
pub fn score_match(data: &MatchData, roster: &[RosterPlayer]) -> HashMap<String, PlayerPerformance> {
    let mut out: HashMap<String, PlayerPerformance> = roster
        .iter()
        .map(|p| (p.player_id.clone(), PlayerPerformance::default()))
        .collect();
    let name_to_id: HashMap<&str, &str> = roster
        .iter()
        .map(|p| (p.name.as_str(), p.player_id.as_str()))
        .collect();

    for innings in &data.innings {
        let mut batting: HashMap<&str, BattingTally> = HashMap::new();
        let mut bowling: HashMap<&str, BowlingTally> = HashMap::new();
        let mut fielding: HashMap<&str, FieldingTally> = HashMap::new();

        for over in &innings.overs {
            for delivery in &over.deliveries {
                {
                    let bat = batting.entry(delivery.batter.as_str()).or_default();
                    bat.runs += delivery.runs.batter;
                    bat.balls += 1;
                    // Boundary bonuses count runs off the bat only; a wide or
                    // bye worth 4 earns nothing here.
                    if delivery.runs.batter == 4 {
                        bat.fours += 1;
                    } else if delivery.runs.batter == 6 {
                        bat.sixes += 1;
                    }
                }
                {
                    let bowl = bowling.entry(delivery.bowler.as_str()).or_default();
                    bowl.balls += 1;
                    // Conceded runs include extras.
                    bowl.runs_conceded += delivery.runs.total;
                }

                for wicket in &delivery.wickets {
                    batting
                        .entry(wicket.player_out.as_str())
                        .or_default()
                        .dismissed = true;
                    bowling.entry(delivery.bowler.as_str()).or_default().wickets += 1;

                    let fielder = wicket
                        .fielders
                        .first()
                        .map(|f| f.name.as_str())
                        .unwrap_or("");
                    if !fielder.is_empty() {
                        let tally = fielding.entry(fielder).or_default();
                        match wicket.kind.as_str() {
                            "caught" => tally.catches += 1,
                            "stumped" => tally.stumpings += 1,
                            "run out" => tally.run_outs += 1,
                            _ => {}
                        }
                    }
                }
            }
        }

        for (name, tally) in &batting {
            let Some(id) = name_to_id.get(name) else {
                continue;
            };
            let Some(perf) = out.get_mut(*id) else {
                continue;
            };
            perf.points += batting_points(tally);
            perf.runs += tally.runs;
            perf.balls_faced += tally.balls;
            perf.fours += tally.fours;
            perf.sixes += tally.sixes;
        }
        for (name, tally) in &bowling {
            let Some(id) = name_to_id.get(name) else {
                continue;
            };
            let Some(perf) = out.get_mut(*id) else {
                continue;
            };
            perf.points += bowling_points(tally);
            perf.wickets += tally.wickets;
            perf.balls_bowled += tally.balls;
            perf.runs_conceded += tally.runs_conceded;
        }
        for (name, tally) in &fielding {
            let Some(id) = name_to_id.get(name) else {
                continue;
            };
            let Some(perf) = out.get_mut(*id) else {
                continue;
            };
            perf.points += fielding_points(tally);
            perf.catches += tally.catches;
            perf.stumpings += tally.stumpings;
            perf.run_outs += tally.run_outs;
        }
    }

    out
}

/// Points-only view of [`score_match`].
pub fn actual_points(data: &MatchData, roster: &[RosterPlayer]) -> HashMap<String, f64> {
    score_match(data, roster)
        .into_iter()
        .map(|(id, perf)| (id, perf.points))
        .collect()
}

fn batting_points(t: &BattingTally) -> f64 {
    let mut pts = t.runs as f64 * POINTS_PER_RUN;
    pts += t.fours as f64 * FOUR_BONUS;
    pts += t.sixes as f64 * SIX_BONUS;
    // Higher milestone only.
    if t.runs >= 100 {
        pts += HUNDRED_BONUS;
    } else if t.runs >= 50 {
        pts += FIFTY_BONUS;
    }
    if t.dismissed && t.runs == 0 && t.balls > 0 {
        pts += DUCK_PENALTY;
    }
    pts
}

fn bowling_points(t: &BowlingTally) -> f64 {
    let mut pts = t.wickets as f64 * POINTS_PER_WICKET;
    if t.wickets >= 5 {
        pts += FIVE_WICKET_BONUS;
    } else if t.wickets >= 4 {
        pts += FOUR_WICKET_BONUS;
    }
    pts
}

fn fielding_points(t: &FieldingTally) -> f64 {
    t.catches as f64 * CATCH_POINTS
        + t.stumpings as f64 * STUMPING_POINTS
        + t.run_outs as f64 * RUN_OUT_POINTS
}
