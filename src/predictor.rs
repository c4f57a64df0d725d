use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::credits::AnnotatedPlayer;
use crate::historical_dataset::HistoryIndex;

const FORM_WINDOW: usize = 10;
const FORM_DECAY: f64 = 0.85;
// Small histories shrink toward a neutral expectation instead of trusting
// one or two outings.
const SHRINK_MATCHES: f64 = 5.0;
const BASELINE_POINTS: f64 = 30.0;

/// Built-in form model: recency-weighted mean of the last ten eligible
/// outings, shrunk toward a neutral baseline for thin histories. Players
/// with no eligible history predict to 0.0, which the optimizer treats as
/// "unknown" rather than an error.
pub fn predict_scores(
    players: &[AnnotatedPlayer],
    match_date: NaiveDate,
    history: &HistoryIndex,
) -> HashMap<String, f64> {
    players
        .iter()
        .map(|p| {
            let score = form_score(&p.player_id, match_date, history).unwrap_or(0.0);
            (p.player_id.clone(), score)
        })
        .collect()
}

fn form_score(player_id: &str, match_date: NaiveDate, history: &HistoryIndex) -> Option<f64> {
    let records = history.records_before(player_id, match_date);
    if records.is_empty() {
        return None;
    }

    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    let mut count = 0usize;
    for (k, rec) in records.iter().rev().take(FORM_WINDOW).enumerate() {
        let w = FORM_DECAY.powi(k as i32);
        weighted += w * rec.fantasy_points;
        weight_sum += w;
        count += 1;
    }
    if count == 0 || weight_sum <= 0.0 {
        return None;
    }

    let mean = weighted / weight_sum;
    let shrink = (count as f64 / SHRINK_MATCHES).min(1.0);
    Some(shrink * mean + (1.0 - shrink) * BASELINE_POINTS)
}

/// Load an opaque per-player predictions map produced by an external model.
/// The values are taken as-is; players missing from the map predict to 0.0.
pub fn load_predictions_file(path: &Path) -> Result<HashMap<String, f64>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read predictions file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse predictions file {}", path.display()))
}
