use anyhow::Result;
use serde::Serialize;

use crate::match_data::MatchContext;
use crate::optimizer::{RosterEntry, ScoreField, SelectionResult, select_optimal_xi};

/// The best XI in hindsight: the same optimizer, maximizing points actually
/// scored instead of the prediction.
pub fn compute_dream_xi(
    roster: &[RosterEntry],
    team1: &str,
    team2: &str,
) -> Result<SelectionResult> {
    select_optimal_xi(roster, team1, team2, ScoreField::ActualFp)
}

/// Absolute error between the recommended XI's predicted total and the
/// dream XI's actual total.
pub fn ae_team_total(predicted: &SelectionResult, dream: &SelectionResult) -> f64 {
    (dream.total_objective - predicted.total_objective).abs()
}

/// One backtest line for a single match.
#[derive(Debug, Clone, Serialize)]
pub struct EvalSummaryRow {
    pub match_id: String,
    pub match_date: String,
    pub team1: String,
    pub team2: String,
    pub predicted_xi: String,
    pub dream_xi: String,
    pub predicted_points_per_player: String,
    pub ae_team_total: f64,
}

pub fn eval_summary_row(
    ctx: &MatchContext,
    predicted: &SelectionResult,
    dream: &SelectionResult,
) -> EvalSummaryRow {
    EvalSummaryRow {
        match_id: ctx.match_id.clone(),
        match_date: ctx.match_date.to_string(),
        team1: ctx.team1.clone(),
        team2: ctx.team2.clone(),
        predicted_xi: joined_names(predicted),
        dream_xi: joined_names(dream),
        predicted_points_per_player: predicted
            .players
            .iter()
            .map(|p| format!("{:.2}", p.predicted_fp))
            .collect::<Vec<_>>()
            .join(","),
        ae_team_total: round2(ae_team_total(predicted, dream)),
    }
}

fn joined_names(selection: &SelectionResult) -> String {
    selection
        .players
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
