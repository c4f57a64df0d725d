use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use fantasy_xi::historical_dataset;
use fantasy_xi::roles;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches_dir = parse_path_arg("--matches")
        .ok_or_else(|| anyhow!("usage: hist_ingest --matches <dir> [--db path] [--roles file]"))?;
    let db_path = parse_path_arg("--db")
        .or_else(historical_dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    let mut conn = historical_dataset::open_db(&db_path)?;

    if let Some(roles_path) = parse_path_arg("--roles") {
        let roles_file = roles::load_roles_file(&roles_path)?;
        let rows = historical_dataset::upsert_roles(&mut conn, &roles_file)?;
        println!("roles upserted: {rows}");
    }

    let summary = historical_dataset::ingest_match_dir(&mut conn, db_path.clone(), &matches_dir)?;

    println!("Historical ingest complete");
    println!("DB: {}", summary.db_path.display());
    println!(
        "Files: {}/{}",
        summary.files_succeeded, summary.files_total
    );
    println!("Rows upserted: {}", summary.rows_upserted);
    if !summary.errors.is_empty() {
        println!("errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(6) {
            println!(" - {err}");
        }
    }

    Ok(())
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
