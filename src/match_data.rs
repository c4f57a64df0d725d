use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::Deserialize;

/// One match file as fed to the recommender and the scoring engine.
///
/// Two shapes are accepted: the full ball-by-ball archive format (an `info`
/// block plus `innings`) and a simplified roster-only request format
/// (`players` + `match_info`). A file with no `innings` key still parses and
/// simply scores to zero everywhere.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchData {
    #[serde(default)]
    pub info: Option<ArchiveInfo>,
    #[serde(default)]
    pub innings: Vec<Innings>,

    // Simplified request format.
    #[serde(default)]
    pub match_id: Option<String>,
    #[serde(default)]
    pub players: Vec<SimplePlayer>,
    #[serde(default)]
    pub match_info: Option<SimpleMatchInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveInfo {
    pub dates: Vec<String>,
    pub teams: Vec<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub season: Option<serde_json::Value>,
    #[serde(default)]
    pub players: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub registry: Registry,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub people: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplePlayer {
    pub player_id: String,
    pub player_name: String,
    pub team: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimpleMatchInfo {
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Innings {
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub overs: Vec<Over>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Over {
    #[serde(default)]
    pub over: u32,
    #[serde(default)]
    pub deliveries: Vec<Delivery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Delivery {
    pub batter: String,
    pub bowler: String,
    #[serde(default)]
    pub non_striker: Option<String>,
    #[serde(default)]
    pub runs: RunsBreakdown,
    #[serde(default)]
    pub wickets: Vec<Wicket>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RunsBreakdown {
    #[serde(default)]
    pub batter: u32,
    #[serde(default)]
    pub extras: u32,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wicket {
    pub kind: String,
    pub player_out: String,
    #[serde(default)]
    pub fielders: Vec<Fielder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fielder {
    // Substitute fielders carry no name in some archives.
    #[serde(default)]
    pub name: String,
}

/// One rostered player, identity-resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterPlayer {
    pub player_id: String,
    pub name: String,
    pub team: String,
}

/// The header a full request pipeline needs: identity, date, teams, roster.
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub match_id: String,
    pub match_date: NaiveDate,
    pub team1: String,
    pub team2: String,
    pub venue: String,
    pub season: String,
    pub players: Vec<RosterPlayer>,
}

pub fn load_match_file(path: &Path) -> Result<MatchData> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read match file {}", path.display()))?;
    parse_match_json(&raw).with_context(|| format!("parse match file {}", path.display()))
}

pub fn parse_match_json(raw: &str) -> Result<MatchData> {
    serde_json::from_str(raw.trim()).context("invalid match json")
}

impl MatchData {
    /// Extract the match header and roster from either accepted shape.
    /// Archive files resolve names through the people registry; names absent
    /// from the registry are left off the roster.
    pub fn context(&self) -> Result<MatchContext> {
        if let Some(info) = &self.info {
            return archive_context(info);
        }
        self.simple_context()
    }

    fn simple_context(&self) -> Result<MatchContext> {
        if self.players.is_empty() {
            return Err(anyhow!("match json has neither an info block nor players"));
        }

        let meta = self.match_info.clone().unwrap_or_default();
        let date_str = meta
            .date
            .ok_or_else(|| anyhow!("simplified match json missing match_info.date"))?;
        let match_date = parse_match_date(&date_str)?;

        let mut players = Vec::with_capacity(self.players.len());
        let mut teams: Vec<String> = Vec::new();
        for p in &self.players {
            if !teams.contains(&p.team) {
                teams.push(p.team.clone());
            }
            players.push(RosterPlayer {
                player_id: p.player_id.clone(),
                name: p.player_name.clone(),
                team: p.team.clone(),
            });
        }

        let team1 = teams.first().cloned().unwrap_or_default();
        let team2 = teams.get(1).cloned().unwrap_or_else(|| team1.clone());

        Ok(MatchContext {
            match_id: self
                .match_id
                .clone()
                .unwrap_or_else(|| format!("{date_str}_{team1}_{team2}")),
            match_date,
            team1,
            team2,
            venue: meta.venue.unwrap_or_else(|| "Unknown".to_string()),
            season: match_date.format("%Y").to_string(),
            players,
        })
    }
}

fn archive_context(info: &ArchiveInfo) -> Result<MatchContext> {
    let date_str = info
        .dates
        .first()
        .ok_or_else(|| anyhow!("match info has no dates"))?;
    let match_date = parse_match_date(date_str)?;

    if info.teams.len() < 2 {
        return Err(anyhow!("match info lists {} teams, need 2", info.teams.len()));
    }
    let team1 = info.teams[0].clone();
    let team2 = info.teams[1].clone();

    let mut players = Vec::new();
    for team in [&team1, &team2] {
        let Some(names) = info.players.get(team) else {
            continue;
        };
        for name in names {
            let Some(player_id) = info.registry.people.get(name) else {
                continue;
            };
            players.push(RosterPlayer {
                player_id: player_id.clone(),
                name: name.clone(),
                team: team.clone(),
            });
        }
    }

    let season = match info.season.as_ref() {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => match_date.format("%Y").to_string(),
    };

    Ok(MatchContext {
        match_id: format!("{date_str}_{team1}_{team2}"),
        match_date,
        team1,
        team2,
        venue: info.venue.clone().unwrap_or_else(|| "Unknown".to_string()),
        season,
        players,
    })
}

fn parse_match_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid match date {raw:?}"))
}
