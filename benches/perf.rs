use std::hint::black_box;

use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fantasy_xi::credits::annotate_roster;
use fantasy_xi::fantasy_points::score_match;
use fantasy_xi::historical_dataset::{HistoryIndex, PlayerMatchRecord};
use fantasy_xi::match_data::{MatchData, RosterPlayer, parse_match_json};
use fantasy_xi::optimizer::{RosterEntry, ScoreField, select_optimal_xi};
use fantasy_xi::roles::{Role, RoleLookup};

fn synthetic_match(rng: &mut StdRng) -> (MatchData, Vec<RosterPlayer>) {
    let mut roster = Vec::new();
    for team in ["Alpha", "Beta"] {
        for i in 0..11 {
            roster.push(RosterPlayer {
                player_id: format!("{}_{i}", team.to_lowercase()),
                name: format!("{team} Player {i}"),
                team: team.to_string(),
            });
        }
    }

    let mut innings_json = Vec::new();
    for (batting, bowling) in [("Alpha", "Beta"), ("Beta", "Alpha")] {
        let mut overs = Vec::new();
        for over in 0..20 {
            let bowler = format!("{bowling} Player {}", 6 + over % 5);
            let mut deliveries = Vec::new();
            for ball in 0..6 {
                let batter = format!("{batting} Player {}", (over + ball) % 6);
                let runs: u32 = [0, 1, 1, 2, 4, 6][rng.gen_range(0..6)];
                deliveries.push(format!(
                    r#"{{"batter": "{batter}", "bowler": "{bowler}",
                        "runs": {{"batter": {runs}, "extras": 0, "total": {runs}}}}}"#
                ));
            }
            overs.push(format!(
                r#"{{"over": {over}, "deliveries": [{}]}}"#,
                deliveries.join(",")
            ));
        }
        innings_json.push(format!(
            r#"{{"team": "{batting}", "overs": [{}]}}"#,
            overs.join(",")
        ));
    }

    let raw = format!(r#"{{"innings": [{}]}}"#, innings_json.join(","));
    (parse_match_json(&raw).unwrap(), roster)
}

fn synthetic_history(rng: &mut StdRng, players: usize, matches: u32) -> HistoryIndex {
    let mut records = Vec::new();
    for p in 0..players {
        for n in 0..matches {
            records.push(PlayerMatchRecord {
                player_id: format!("p{p}"),
                match_id: format!("m{n:03}"),
                match_date: NaiveDate::from_ymd_opt(2022, 1, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(3 * n as u64))
                    .unwrap(),
                team: "T1".to_string(),
                opponent: "T2".to_string(),
                venue: "V".to_string(),
                fantasy_points: rng.gen_range(0.0..120.0),
                runs: rng.gen_range(0..80),
                balls_faced: rng.gen_range(0..60),
                fours: rng.gen_range(0..8),
                sixes: rng.gen_range(0..4),
                wickets: rng.gen_range(0..4),
                catches: rng.gen_range(0..2),
            });
        }
    }
    HistoryIndex::from_records(records)
}

fn bench_score_match(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let (data, roster) = synthetic_match(&mut rng);
    c.bench_function("score_match_two_innings", |b| {
        b.iter(|| {
            let scores = score_match(black_box(&data), black_box(&roster));
            black_box(scores.len());
        })
    });
}

fn bench_annotate_roster(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let history = synthetic_history(&mut rng, 30, 40);
    let roles = RoleLookup::default();
    let roster: Vec<RosterPlayer> = (0..22)
        .map(|i| RosterPlayer {
            player_id: format!("p{i}"),
            name: format!("P {i}"),
            team: if i < 11 { "Alpha" } else { "Beta" }.to_string(),
        })
        .collect();
    let match_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

    c.bench_function("annotate_roster_22_players", |b| {
        b.iter(|| {
            let annotated = annotate_roster(
                black_box(&roster),
                black_box(match_date),
                &roles,
                &history,
            );
            black_box(annotated.len());
        })
    });
}

fn bench_select_xi(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(13);
    let layout = [
        (Role::Keeper, 2),
        (Role::Batter, 5),
        (Role::AllRounder, 3),
        (Role::Bowler, 5),
    ];
    let mut roster = Vec::new();
    for team in ["Alpha", "Beta"] {
        let mut i = 0;
        for (role, n) in layout {
            for _ in 0..n {
                roster.push(RosterEntry {
                    player_id: format!("{team}_{i}"),
                    name: format!("{team} {i}"),
                    team: team.to_string(),
                    role,
                    predicted_fp: rng.gen_range(10.0..90.0),
                    actual_fp: 0.0,
                    credits: rng.gen_range(4.0..11.0),
                });
                i += 1;
            }
        }
    }

    c.bench_function("select_optimal_xi_30_players", |b| {
        b.iter(|| {
            let result =
                select_optimal_xi(black_box(&roster), "Alpha", "Beta", ScoreField::PredictedFp)
                    .unwrap();
            black_box(result.feasible);
        })
    });
}

criterion_group!(
    benches,
    bench_score_match,
    bench_annotate_roster,
    bench_select_xi
);
criterion_main!(benches);
