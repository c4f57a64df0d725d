use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use fantasy_xi::credits::{self, AnnotatedPlayer};
use fantasy_xi::historical_dataset;
use fantasy_xi::match_data;
use fantasy_xi::optimizer::{self, RosterEntry, ScoreField};
use fantasy_xi::predictor;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let match_path = parse_positional_arg()
        .ok_or_else(|| anyhow!("usage: fantasy_xi <match.json> [--db path] [--predicted path]"))?;
    let db_path = parse_path_arg("--db")
        .or_else(historical_dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    let conn = historical_dataset::open_db(&db_path)?;
    let history = historical_dataset::load_history_index(&conn)?;
    let roles = historical_dataset::load_role_lookup(&conn)?;
    if roles.is_empty() {
        tracing::warn!("no role tables loaded; every player will default to BAT");
    }

    let data = match_data::load_match_file(&match_path)?;
    let ctx = data.context()?;
    if ctx.players.is_empty() {
        return Err(anyhow!("match file has no resolvable roster"));
    }

    let annotated = credits::annotate_roster(&ctx.players, ctx.match_date, &roles, &history);
    let predicted = match parse_path_arg("--predicted") {
        Some(path) => predictor::load_predictions_file(&path)?,
        None => predictor::predict_scores(&annotated, ctx.match_date, &history),
    };

    let roster = build_roster(&annotated, &predicted);
    let result = optimizer::select_optimal_xi(&roster, &ctx.team1, &ctx.team2, ScoreField::PredictedFp)?;

    println!(
        "{} | {} vs {} | {} | {}",
        ctx.match_id, ctx.team1, ctx.team2, ctx.venue, ctx.match_date
    );
    println!(
        "history: {} players, {} records",
        history.player_count(),
        history.record_count()
    );
    println!();

    if !result.feasible {
        println!("no valid team found (solver status: {})", result.status);
        return Ok(());
    }

    println!("recommended XI (status: {})", result.status);
    println!(
        "{:<24} {:<14} {:>4} {:>8} {:>10}",
        "player", "team", "role", "credits", "predicted"
    );
    for p in &result.players {
        println!(
            "{:<24} {:<14} {:>4} {:>8.2} {:>10.2}",
            p.name,
            p.team,
            p.role.code(),
            p.credits,
            p.predicted_fp
        );
    }
    println!();
    println!(
        "total credits: {:.2} / {:.0}",
        result.total_credits,
        optimizer::CREDITS_BUDGET
    );
    println!("total predicted points: {:.2}", result.total_objective);

    let mut role_line = Vec::new();
    for role in fantasy_xi::roles::Role::ALL {
        role_line.push(format!("{} {}", role.code(), result.role_counts[&role]));
    }
    println!("roles: {}", role_line.join(" | "));
    println!(
        "teams: {} {} | {} {}",
        ctx.team1,
        result.team_counts.get(&ctx.team1).copied().unwrap_or(0),
        ctx.team2,
        result.team_counts.get(&ctx.team2).copied().unwrap_or(0)
    );

    Ok(())
}

fn build_roster(
    annotated: &[AnnotatedPlayer],
    predicted: &HashMap<String, f64>,
) -> Vec<RosterEntry> {
    annotated
        .iter()
        .map(|p| RosterEntry {
            player_id: p.player_id.clone(),
            name: p.name.clone(),
            team: p.team.clone(),
            role: p.role,
            predicted_fp: predicted.get(&p.player_id).copied().unwrap_or(0.0),
            actual_fp: 0.0,
            credits: p.credits,
        })
        .collect()
}

fn parse_positional_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if let Some(flag) = arg.strip_prefix("--") {
            // `--flag value` consumes the value; `--flag=value` is one token.
            skip_next = !flag.contains('=');
            continue;
        }
        return Some(PathBuf::from(arg));
    }
    None
}

fn parse_path_arg(flag: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
