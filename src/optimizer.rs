use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};
use good_lp::solvers::highs::highs;
use good_lp::{Expression, ResolutionError, Solution, SolverModel, constraint, variable, variables};
use tracing::debug;

use crate::roles::Role;

pub const SQUAD_SIZE: usize = 11;
pub const CREDITS_BUDGET: f64 = 100.0;
pub const MAX_PER_TEAM: usize = 7;

/// Squad composition bounds, enforced per role only when the roster has at
/// least one player of that role.
const ROLE_BOUNDS: [(Role, f64, f64); 4] = [
    (Role::Keeper, 1.0, 4.0),
    (Role::Batter, 3.0, 6.0),
    (Role::AllRounder, 1.0, 4.0),
    (Role::Bowler, 3.0, 6.0),
];

/// One candidate for selection, fully annotated. Carries both objective
/// fields so the same roster can be solved for a recommendation and,
/// retrospectively, for the best-possible XI.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub player_id: String,
    pub name: String,
    pub team: String,
    pub role: Role,
    pub predicted_fp: f64,
    pub actual_fp: f64,
    pub credits: f64,
}

/// Which per-player score the solver maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreField {
    PredictedFp,
    ActualFp,
}

impl RosterEntry {
    pub fn objective(&self, field: ScoreField) -> f64 {
        match field {
            ScoreField::PredictedFp => self.predicted_fp,
            ScoreField::ActualFp => self.actual_fp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionResult {
    /// Chosen entries, sorted by the objective field, descending.
    pub players: Vec<RosterEntry>,
    pub total_credits: f64,
    pub total_objective: f64,
    pub role_counts: HashMap<Role, usize>,
    pub team_counts: HashMap<String, usize>,
    pub feasible: bool,
    pub status: String,
}

/// Pick the optimal XI: maximize the chosen objective over binary
/// per-player variables, subject to squad size, budget, role bounds, and
/// team cap/floor. Constraint families referencing an empty category are
/// omitted rather than trivially violated. Infeasibility comes back as a
/// flagged result, never as an error; duplicate roster ids are the one
/// precondition violation that does fail.
pub fn select_optimal_xi(
    roster: &[RosterEntry],
    team1: &str,
    team2: &str,
    field: ScoreField,
) -> Result<SelectionResult> {
    let mut seen = HashSet::with_capacity(roster.len());
    for entry in roster {
        if !seen.insert(entry.player_id.as_str()) {
            bail!("duplicate player_id {:?} in roster", entry.player_id);
        }
    }

    if roster.len() < SQUAD_SIZE {
        return Ok(infeasible_result(team1, team2, "Infeasible"));
    }

    let mut vars = variables!();
    let var_list: Vec<_> = roster
        .iter()
        .map(|_| vars.add(variable().binary()))
        .collect();

    let objective: Expression = var_list
        .iter()
        .zip(roster.iter())
        .map(|(v, e)| e.objective(field) * *v)
        .sum();

    let mut model = vars.maximise(&objective).using(highs);

    let count: Expression = var_list.iter().map(|v| 1.0 * *v).sum();
    model = model.with(constraint!(count == SQUAD_SIZE as f64));

    let spend: Expression = var_list
        .iter()
        .zip(roster.iter())
        .map(|(v, e)| e.credits * *v)
        .sum();
    model = model.with(constraint!(spend <= CREDITS_BUDGET));

    for (role, lo, hi) in ROLE_BOUNDS {
        let members: Vec<usize> = roster
            .iter()
            .enumerate()
            .filter(|(_, e)| e.role == role)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        let picked: Expression = members.iter().map(|i| 1.0 * var_list[*i]).sum();
        model = model.with(constraint!(picked.clone() >= lo));
        model = model.with(constraint!(picked <= hi));
    }

    for team in [team1, team2] {
        let members: Vec<usize> = roster
            .iter()
            .enumerate()
            .filter(|(_, e)| e.team == team)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        let picked: Expression = members.iter().map(|i| 1.0 * var_list[*i]).sum();
        model = model.with(constraint!(picked.clone() <= MAX_PER_TEAM as f64));
        model = model.with(constraint!(picked >= 1.0));
    }

    match model.solve() {
        Ok(solution) => {
            let mut players = Vec::with_capacity(SQUAD_SIZE);
            for (entry, v) in roster.iter().zip(&var_list) {
                if solution.value(*v) > 0.5 {
                    players.push(entry.clone());
                }
            }
            players.sort_by(|a, b| b.objective(field).total_cmp(&a.objective(field)));

            let total_credits = players.iter().map(|p| p.credits).sum();
            let total_objective = players.iter().map(|p| p.objective(field)).sum();

            let mut role_counts = empty_role_counts();
            for p in &players {
                *role_counts.entry(p.role).or_insert(0) += 1;
            }
            let mut team_counts = empty_team_counts(team1, team2);
            for p in &players {
                *team_counts.entry(p.team.clone()).or_insert(0) += 1;
            }

            debug!(
                selected = players.len(),
                total_credits, total_objective, "squad solve optimal"
            );
            Ok(SelectionResult {
                players,
                total_credits,
                total_objective,
                role_counts,
                team_counts,
                feasible: true,
                status: "Optimal".to_string(),
            })
        }
        Err(err) => {
            let status = match err {
                ResolutionError::Infeasible => "Infeasible".to_string(),
                ResolutionError::Unbounded => "Unbounded".to_string(),
                other => other.to_string(),
            };
            debug!(%status, "squad solve terminated without an optimum");
            Ok(infeasible_result(team1, team2, &status))
        }
    }
}

fn infeasible_result(team1: &str, team2: &str, status: &str) -> SelectionResult {
    SelectionResult {
        players: Vec::new(),
        total_credits: 0.0,
        total_objective: 0.0,
        role_counts: empty_role_counts(),
        team_counts: empty_team_counts(team1, team2),
        feasible: false,
        status: status.to_string(),
    }
}

fn empty_role_counts() -> HashMap<Role, usize> {
    Role::ALL.into_iter().map(|r| (r, 0)).collect()
}

fn empty_team_counts(team1: &str, team2: &str) -> HashMap<String, usize> {
    let mut out = HashMap::new();
    out.insert(team1.to_string(), 0);
    out.insert(team2.to_string(), 0);
    out
}
