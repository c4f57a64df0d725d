pub mod credits;
pub mod evaluation;
pub mod fantasy_points;
pub mod historical_dataset;
pub mod match_data;
pub mod optimizer;
pub mod predictor;
pub mod roles;
