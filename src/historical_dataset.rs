use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::fantasy_points;
use crate::match_data::{self, MatchContext};
use crate::roles::{Role, RoleLookup, RolesFile};

const CACHE_DIR: &str = "fantasy_xi";
const DB_FILE: &str = "player_matches.sqlite";

/// One historical row: how a player fared in one past match.
#[derive(Debug, Clone)]
pub struct PlayerMatchRecord {
    pub player_id: String,
    pub match_id: String,
    pub match_date: NaiveDate,
    pub team: String,
    pub opponent: String,
    pub venue: String,
    pub fantasy_points: f64,
    pub runs: u32,
    pub balls_faced: u32,
    pub fours: u32,
    pub sixes: u32,
    pub wickets: u32,
    pub catches: u32,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub files_total: usize,
    pub files_succeeded: usize,
    pub rows_upserted: usize,
    pub errors: Vec<String>,
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("HIST_DB_PATH")
        && !raw.trim().is_empty()
    {
        return Some(PathBuf::from(raw.trim()));
    }
    cache_dir().map(|dir| dir.join(DB_FILE))
}

fn cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS player_matches (
            player_id TEXT NOT NULL,
            match_id TEXT NOT NULL,
            match_date TEXT NOT NULL,
            team TEXT NOT NULL,
            opponent TEXT NOT NULL,
            venue TEXT NOT NULL,
            fantasy_points REAL NOT NULL,
            runs INTEGER NOT NULL,
            balls_faced INTEGER NOT NULL,
            fours INTEGER NOT NULL,
            sixes INTEGER NOT NULL,
            wickets INTEGER NOT NULL,
            catches INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (player_id, match_id)
        );
        CREATE INDEX IF NOT EXISTS idx_player_matches_player ON player_matches(player_id);
        CREATE INDEX IF NOT EXISTS idx_player_matches_date ON player_matches(match_date);

        CREATE TABLE IF NOT EXISTS roles_by_season (
            player_id TEXT NOT NULL,
            season INTEGER NOT NULL,
            role TEXT NOT NULL,
            PRIMARY KEY (player_id, season)
        );
        CREATE TABLE IF NOT EXISTS roles_global (
            player_id TEXT PRIMARY KEY,
            role TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            files_total INTEGER NOT NULL,
            files_succeeded INTEGER NOT NULL,
            rows_upserted INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Score every match file under `dir` and upsert the resulting per-player
/// rows. Files that fail to parse are recorded as errors and skipped; one
/// audit row is written per run.
pub fn ingest_match_dir(
    conn: &mut Connection,
    db_path: PathBuf,
    dir: &Path,
) -> Result<IngestSummary> {
    let files = list_match_files(dir)?;
    if files.is_empty() {
        return Err(anyhow!("no .json match files under {}", dir.display()));
    }

    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, files_total, files_succeeded, rows_upserted, errors_json)
         VALUES (?1, NULL, ?2, 0, 0, '[]')",
        params![started_at, files.len() as i64],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut files_succeeded = 0usize;
    let mut rows_upserted = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for file in &files {
        match ingest_match_file(conn, file) {
            Ok(rows) => {
                debug!(file = %file.display(), rows, "ingested match file");
                files_succeeded += 1;
                rows_upserted += rows;
            }
            Err(err) => {
                warn!(file = %file.display(), %err, "skipping match file");
                errors.push(format!("{}: {err}", file.display()));
            }
        }
    }

    let finished_at = Utc::now().to_rfc3339();
    let errors_json = serde_json::to_string(&errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, files_succeeded = ?2, rows_upserted = ?3, errors_json = ?4
         WHERE run_id = ?5",
        params![
            finished_at,
            files_succeeded as i64,
            rows_upserted as i64,
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;

    Ok(IngestSummary {
        db_path,
        files_total: files.len(),
        files_succeeded,
        rows_upserted,
        errors,
    })
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

fn ingest_match_file(conn: &mut Connection, path: &Path) -> Result<usize> {
    let data = match_data::load_match_file(path)?;
    let ctx = data.context()?;
    let performances = fantasy_points::score_match(&data, &ctx.players);
    let records = records_from_performances(&ctx, &performances);

    let tx = conn.transaction().context("begin ingest transaction")?;
    for rec in &records {
        upsert_player_match(&tx, rec)?;
    }
    tx.commit().context("commit ingest transaction")?;
    Ok(records.len())
}

fn records_from_performances(
    ctx: &MatchContext,
    performances: &HashMap<String, fantasy_points::PlayerPerformance>,
) -> Vec<PlayerMatchRecord> {
    let mut out = Vec::with_capacity(ctx.players.len());
    for player in &ctx.players {
        let perf = performances
            .get(&player.player_id)
            .copied()
            .unwrap_or_default();
        let opponent = if player.team == ctx.team1 {
            ctx.team2.clone()
        } else {
            ctx.team1.clone()
        };
        out.push(PlayerMatchRecord {
            player_id: player.player_id.clone(),
            match_id: ctx.match_id.clone(),
            match_date: ctx.match_date,
            team: player.team.clone(),
            opponent,
            venue: ctx.venue.clone(),
            fantasy_points: perf.points,
            runs: perf.runs,
            balls_faced: perf.balls_faced,
            fours: perf.fours,
            sixes: perf.sixes,
            wickets: perf.wickets,
            catches: perf.catches,
        });
    }
    out
}

pub fn upsert_player_match(tx: &rusqlite::Transaction<'_>, rec: &PlayerMatchRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO player_matches (
            player_id, match_id, match_date, team, opponent, venue,
            fantasy_points, runs, balls_faced, fours, sixes, wickets, catches,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(player_id, match_id) DO UPDATE SET
            match_date = excluded.match_date,
            team = excluded.team,
            opponent = excluded.opponent,
            venue = excluded.venue,
            fantasy_points = excluded.fantasy_points,
            runs = excluded.runs,
            balls_faced = excluded.balls_faced,
            fours = excluded.fours,
            sixes = excluded.sixes,
            wickets = excluded.wickets,
            catches = excluded.catches,
            updated_at = excluded.updated_at
        "#,
        params![
            rec.player_id,
            rec.match_id,
            rec.match_date.to_string(),
            rec.team,
            rec.opponent,
            rec.venue,
            rec.fantasy_points,
            rec.runs as i64,
            rec.balls_faced as i64,
            rec.fours as i64,
            rec.sixes as i64,
            rec.wickets as i64,
            rec.catches as i64,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert player match")?;
    Ok(())
}

pub fn load_all_records(conn: &Connection) -> Result<Vec<PlayerMatchRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                player_id, match_id, match_date, team, opponent, venue,
                fantasy_points, runs, balls_faced, fours, sixes, wickets, catches
            FROM player_matches
            ORDER BY match_date ASC, match_id ASC
            "#,
        )
        .context("prepare load records query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, i64>(9)?,
                row.get::<_, i64>(10)?,
                row.get::<_, i64>(11)?,
                row.get::<_, i64>(12)?,
            ))
        })
        .context("query load records")?;

    let mut out = Vec::new();
    for row in rows {
        let (
            player_id,
            match_id,
            date_raw,
            team,
            opponent,
            venue,
            fantasy_points,
            runs,
            balls_faced,
            fours,
            sixes,
            wickets,
            catches,
        ) = row.context("decode record row")?;
        let match_date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d")
            .with_context(|| format!("invalid match_date {date_raw:?} for {player_id}"))?;
        out.push(PlayerMatchRecord {
            player_id,
            match_id,
            match_date,
            team,
            opponent,
            venue,
            fantasy_points,
            runs: runs as u32,
            balls_faced: balls_faced as u32,
            fours: fours as u32,
            sixes: sixes as u32,
            wickets: wickets as u32,
            catches: catches as u32,
        });
    }
    Ok(out)
}

pub fn upsert_roles(conn: &mut Connection, roles: &RolesFile) -> Result<usize> {
    let tx = conn.transaction().context("begin roles transaction")?;
    let mut rows = 0usize;
    for entry in &roles.by_season {
        tx.execute(
            "INSERT INTO roles_by_season(player_id, season, role) VALUES (?1, ?2, ?3)
             ON CONFLICT(player_id, season) DO UPDATE SET role = excluded.role",
            params![entry.player_id, entry.season as i64, entry.role.code()],
        )
        .context("upsert season role")?;
        rows += 1;
    }
    for (player_id, role) in &roles.global {
        tx.execute(
            "INSERT INTO roles_global(player_id, role) VALUES (?1, ?2)
             ON CONFLICT(player_id) DO UPDATE SET role = excluded.role",
            params![player_id, role.code()],
        )
        .context("upsert global role")?;
        rows += 1;
    }
    tx.commit().context("commit roles transaction")?;
    Ok(rows)
}

pub fn load_role_lookup(conn: &Connection) -> Result<RoleLookup> {
    let mut by_season = HashMap::new();
    let mut stmt = conn
        .prepare("SELECT player_id, season, role FROM roles_by_season")
        .context("prepare season roles query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .context("query season roles")?;
    for row in rows {
        let (player_id, season, raw) = row.context("decode season role row")?;
        if let Some(role) = Role::from_code(&raw) {
            by_season.insert((player_id, season as i32), role);
        }
    }

    let mut global = HashMap::new();
    let mut stmt = conn
        .prepare("SELECT player_id, role FROM roles_global")
        .context("prepare global roles query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .context("query global roles")?;
    for row in rows {
        let (player_id, raw) = row.context("decode global role row")?;
        if let Some(role) = Role::from_code(&raw) {
            global.insert(player_id, role);
        }
    }

    Ok(RoleLookup::new(by_season, global))
}

/// In-memory, per-player, date-sorted view of the historical store. Built
/// once per process and shared read-only from then on.
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    by_player: HashMap<String, Vec<PlayerMatchRecord>>,
}

impl HistoryIndex {
    pub fn from_records(records: Vec<PlayerMatchRecord>) -> Self {
        let mut by_player: HashMap<String, Vec<PlayerMatchRecord>> = HashMap::new();
        for rec in records {
            by_player.entry(rec.player_id.clone()).or_default().push(rec);
        }
        for rows in by_player.values_mut() {
            rows.sort_by(|a, b| {
                a.match_date
                    .cmp(&b.match_date)
                    .then_with(|| a.match_id.cmp(&b.match_id))
            });
        }
        Self { by_player }
    }

    /// Records strictly before `cutoff`, ascending by date. The cutoff keeps
    /// valuation and prediction free of look-ahead.
    pub fn records_before(&self, player_id: &str, cutoff: NaiveDate) -> &[PlayerMatchRecord] {
        let Some(rows) = self.by_player.get(player_id) else {
            return &[];
        };
        let end = rows.partition_point(|r| r.match_date < cutoff);
        &rows[..end]
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &str> {
        self.by_player.keys().map(String::as_str)
    }

    pub fn player_count(&self) -> usize {
        self.by_player.len()
    }

    pub fn record_count(&self) -> usize {
        self.by_player.values().map(Vec::len).sum()
    }
}

pub fn load_history_index(conn: &Connection) -> Result<HistoryIndex> {
    Ok(HistoryIndex::from_records(load_all_records(conn)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(player_id: &str, match_id: &str, date: &str, fp: f64) -> PlayerMatchRecord {
        PlayerMatchRecord {
            player_id: player_id.to_string(),
            match_id: match_id.to_string(),
            match_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
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

    #[test]
    fn history_index_cutoff_is_strict() {
        let index = HistoryIndex::from_records(vec![
            record("p1", "m1", "2023-01-01", 10.0),
            record("p1", "m2", "2023-02-01", 20.0),
            record("p1", "m3", "2023-03-01", 30.0),
        ]);
        let cutoff = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap();
        let rows = index.records_before("p1", cutoff);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fantasy_points, 10.0);
        assert!(index.records_before("p2", cutoff).is_empty());
    }

    #[test]
    fn history_index_sorts_out_of_order_rows() {
        let index = HistoryIndex::from_records(vec![
            record("p1", "m2", "2023-02-01", 20.0),
            record("p1", "m1", "2023-01-01", 10.0),
        ]);
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = index.records_before("p1", cutoff);
        assert_eq!(rows[0].match_id, "m1");
        assert_eq!(rows[1].match_id, "m2");
    }

    #[test]
    fn sqlite_round_trip() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tx = conn.transaction().unwrap();
        upsert_player_match(&tx, &record("p1", "m1", "2023-01-01", 42.0)).unwrap();
        // Re-upsert overwrites rather than duplicating.
        upsert_player_match(&tx, &record("p1", "m1", "2023-01-01", 44.0)).unwrap();
        upsert_player_match(&tx, &record("p2", "m1", "2023-01-01", 7.0)).unwrap();
        tx.commit().unwrap();

        let records = load_all_records(&conn).unwrap();
        assert_eq!(records.len(), 2);
        let p1 = records.iter().find(|r| r.player_id == "p1").unwrap();
        assert_eq!(p1.fantasy_points, 44.0);
    }

    #[test]
    fn roles_round_trip() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut roles = RolesFile::default();
        roles.by_season.push(crate::roles::SeasonRole {
            player_id: "p1".to_string(),
            season: 2023,
            role: Role::Keeper,
        });
        roles.global.insert("p1".to_string(), Role::Batter);
        roles.global.insert("p2".to_string(), Role::Bowler);

        let rows = upsert_roles(&mut conn, &roles).unwrap();
        assert_eq!(rows, 3);

        let lookup = load_role_lookup(&conn).unwrap();
        assert_eq!(lookup.resolve("p1", 2023), Role::Keeper);
        assert_eq!(lookup.resolve("p1", 2024), Role::Batter);
        assert_eq!(lookup.resolve("p2", 2023), Role::Bowler);
        assert_eq!(lookup.resolve("p3", 2023), Role::Batter);
    }
}
