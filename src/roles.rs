use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Playing role used for valuation percentiles and squad composition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "WK")]
    Keeper,
    #[serde(rename = "BAT")]
    Batter,
    #[serde(rename = "AR")]
    AllRounder,
    #[serde(rename = "BOWL")]
    Bowler,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Keeper, Role::Batter, Role::AllRounder, Role::Bowler];

    pub fn code(self) -> &'static str {
        match self {
            Role::Keeper => "WK",
            Role::Batter => "BAT",
            Role::AllRounder => "AR",
            Role::Bowler => "BOWL",
        }
    }

    pub fn from_code(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WK" => Some(Role::Keeper),
            "BAT" => Some(Role::Batter),
            "AR" => Some(Role::AllRounder),
            "BOWL" => Some(Role::Bowler),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonRole {
    pub player_id: String,
    pub season: i32,
    pub role: Role,
}

/// Role assignments as shipped alongside a historical dataset: a per-season
/// table plus a global fallback table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolesFile {
    #[serde(default)]
    pub by_season: Vec<SeasonRole>,
    #[serde(default)]
    pub global: HashMap<String, Role>,
}

pub fn load_roles_file(path: &Path) -> Result<RolesFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read roles file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse roles file {}", path.display()))
}

/// Season-specific role lookup with a global fallback. Absent entries resolve
/// to `BAT` rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct RoleLookup {
    by_season: HashMap<(String, i32), Role>,
    global: HashMap<String, Role>,
}

impl RoleLookup {
    pub fn new(by_season: HashMap<(String, i32), Role>, global: HashMap<String, Role>) -> Self {
        Self { by_season, global }
    }

    pub fn from_roles_file(file: &RolesFile) -> Self {
        let mut by_season = HashMap::with_capacity(file.by_season.len());
        for row in &file.by_season {
            by_season.insert((row.player_id.clone(), row.season), row.role);
        }
        Self {
            by_season,
            global: file.global.clone(),
        }
    }

    pub fn insert_season(&mut self, player_id: &str, season: i32, role: Role) {
        self.by_season.insert((player_id.to_string(), season), role);
    }

    pub fn insert_global(&mut self, player_id: &str, role: Role) {
        self.global.insert(player_id.to_string(), role);
    }

    pub fn resolve(&self, player_id: &str, season: i32) -> Role {
        if let Some(role) = self.by_season.get(&(player_id.to_string(), season)) {
            return *role;
        }
        if let Some(role) = self.global.get(player_id) {
            return *role;
        }
        Role::Batter
    }

    pub fn is_empty(&self) -> bool {
        self.by_season.is_empty() && self.global.is_empty()
    }
}
