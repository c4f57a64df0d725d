use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use fantasy_xi::credits;
use fantasy_xi::evaluation::{self, EvalSummaryRow};
use fantasy_xi::fantasy_points;
use fantasy_xi::historical_dataset::{self, HistoryIndex};
use fantasy_xi::match_data;
use fantasy_xi::optimizer::{RosterEntry, ScoreField, select_optimal_xi};
use fantasy_xi::predictor;
use fantasy_xi::roles::RoleLookup;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches_dir = parse_path_arg("--matches")
        .ok_or_else(|| anyhow!("usage: backtest --matches <dir> [--db path] [--limit n]"))?;
    let db_path = parse_path_arg("--db")
        .or_else(historical_dataset::default_db_path)
        .context("unable to resolve sqlite path")?;
    let limit = parse_usize_arg("--limit");

    let conn = historical_dataset::open_db(&db_path)?;
    let history = historical_dataset::load_history_index(&conn)?;
    let roles = historical_dataset::load_role_lookup(&conn)?;

    let mut files = list_match_files(&matches_dir)?;
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    if files.is_empty() {
        return Err(anyhow!("no .json match files under {}", matches_dir.display()));
    }

    // The history index and role tables are read-only from here on, so each
    // match backtests independently.
    let mut outcomes: Vec<(PathBuf, Result<EvalSummaryRow>)> = files
        .par_iter()
        .map(|file| (file.clone(), backtest_match(file, &history, &roles)))
        .collect();
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rows = Vec::new();
    let mut failures = Vec::new();
    for (file, outcome) in outcomes {
        match outcome {
            Ok(row) => rows.push(row),
            Err(err) => failures.push(format!("{}: {err}", file.display())),
        }
    }

    println!(
        "{:<28} {:<12} {:<24} {:>10}",
        "match", "date", "teams", "ae_total"
    );
    for row in &rows {
        println!(
            "{:<28} {:<12} {:<24} {:>10.2}",
            row.match_id,
            row.match_date,
            format!("{} v {}", row.team1, row.team2),
            row.ae_team_total
        );
    }

    if !rows.is_empty() {
        let mae = rows.iter().map(|r| r.ae_team_total).sum::<f64>() / rows.len() as f64;
        println!();
        println!("matches evaluated: {}", rows.len());
        println!("MAE (team total): {mae:.2}");
    }
    if !failures.is_empty() {
        println!("failures: {}", failures.len());
        for failure in failures.iter().take(6) {
            println!(" - {failure}");
        }
    }

    Ok(())
}

fn backtest_match(
    file: &Path,
    history: &HistoryIndex,
    roles: &RoleLookup,
) -> Result<EvalSummaryRow> {
    let data = match_data::load_match_file(file)?;
    let ctx = data.context()?;
    if ctx.players.is_empty() {
        return Err(anyhow!("no resolvable roster"));
    }

    let annotated = credits::annotate_roster(&ctx.players, ctx.match_date, roles, history);
    let predicted_scores = predictor::predict_scores(&annotated, ctx.match_date, history);
    let actual_scores = fantasy_points::actual_points(&data, &ctx.players);

    let roster: Vec<RosterEntry> = annotated
        .iter()
        .map(|p| RosterEntry {
            player_id: p.player_id.clone(),
            name: p.name.clone(),
            team: p.team.clone(),
            role: p.role,
            predicted_fp: predicted_scores.get(&p.player_id).copied().unwrap_or(0.0),
            actual_fp: actual_scores.get(&p.player_id).copied().unwrap_or(0.0),
            credits: p.credits,
        })
        .collect();

    let predicted = select_optimal_xi(&roster, &ctx.team1, &ctx.team2, ScoreField::PredictedFp)?;
    if !predicted.feasible {
        return Err(anyhow!("recommendation infeasible ({})", predicted.status));
    }
    let dream = evaluation::compute_dream_xi(&roster, &ctx.team1, &ctx.team2)?;
    if !dream.feasible {
        return Err(anyhow!("dream XI infeasible ({})", dream.status));
    }

    Ok(evaluation::eval_summary_row(&ctx, &predicted, &dream))
}

fn list_match_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.context("read dir entry")?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
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

fn parse_usize_arg(flag: &str) -> Option<usize> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            if let Ok(n) = raw.trim().parse::<usize>() {
                return Some(n);
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && let Ok(n) = next.trim().parse::<usize>()
        {
            return Some(n);
        }
    }
    None
}
