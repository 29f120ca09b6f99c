//! Host-facing request and report types.
//!
//! A [`SolveRequest`] carries the raw collections a host binding receives; a
//! [`SolveReport`] is what it hands back. Malformed input is returned as an error and
//! no solving is attempted. Solve-time failures become a report with `solved` unset,
//! the echoed tables and a diagnostic message.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::engine::{Engine, SolveOutcome};
use crate::error::{GameError, Result};
use crate::game::{GameBuilder, GameDescription, StateSpec};
use crate::options::{EngineOptions, SolverParameters};

/// Raw solve request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub delta: f64,
    pub num_states: usize,
    pub states: Vec<StateSpec>,
    /// Also report the full iteration history.
    #[serde(default)]
    pub all_iterations: bool,
    /// Tolerances; if any is non-positive, defaults are used for all four.
    #[serde(default)]
    pub normtol: f64,
    #[serde(default)]
    pub directiontol: f64,
    #[serde(default)]
    pub leveltol: f64,
    #[serde(default)]
    pub improvetol: f64,
}

impl SolveRequest {
    /// Request with default tolerances and final-revolution output only.
    pub fn new(delta: f64, states: Vec<StateSpec>) -> Self {
        Self {
            delta,
            num_states: states.len(),
            states,
            all_iterations: false,
            normtol: 0.0,
            directiontol: 0.0,
            leveltol: 0.0,
            improvetol: 0.0,
        }
    }

    /// Validates the request into a game.
    pub fn game(&self) -> Result<GameDescription> {
        if self.states.len() != self.num_states {
            return Err(GameError::dimension_mismatch(
                "state list",
                self.num_states,
                self.states.len(),
            ));
        }
        GameBuilder::new(self.delta)
            .states(self.states.iter().cloned())
            .build()
    }

    /// Engine options implied by the request.
    pub fn options(&self) -> EngineOptions {
        EngineOptions::default()
            .with_parameters(SolverParameters::from_raw(
                self.normtol,
                self.directiontol,
                self.leveltol,
                self.improvetol,
            ))
            .with_all_iterations(self.all_iterations)
    }
}

/// Report handed back to the host.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolveReport {
    pub solved: bool,
    /// Final-revolution pivots per state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<DMatrix<f64>>>,
    /// Every pivot per state, when all iterations were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipoints: Option<Vec<DMatrix<f64>>>,
    /// Revolution of each `ipoints` row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revolution: Option<Vec<usize>>,
    /// Diagnostic on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Echoed payoff tables on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payoffs: Option<Vec<DMatrix<f64>>>,
    /// Echoed transition tables on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<DMatrix<f64>>>,
}

impl SolveReport {
    /// Turns an outcome into a report for the host.
    pub fn from_outcome(game: &GameDescription, outcome: &SolveOutcome) -> Self {
        match outcome {
            SolveOutcome::Converged(solution) => {
                let history = solution.history();
                let (ipoints, revolution) = match history {
                    Some(history) => (Some(history.points), Some(history.revolutions)),
                    None => (None, None),
                };
                Self {
                    solved: true,
                    points: Some(solution.final_points()),
                    ipoints,
                    revolution,
                    msg: None,
                    payoffs: None,
                    probabilities: None,
                }
            }
            SolveOutcome::Failed(failure) => Self {
                solved: false,
                points: None,
                ipoints: None,
                revolution: None,
                msg: Some(failure.to_string()),
                payoffs: Some(game.states().iter().map(|s| s.payoffs.clone()).collect()),
                probabilities: Some(
                    game.states()
                        .iter()
                        .map(|s| s.transition.clone())
                        .collect(),
                ),
            },
        }
    }
}

/// Validates `request`, solves it and reports the result.
pub fn solve_request(request: &SolveRequest) -> Result<SolveReport> {
    let game = request.game()?;
    let mut engine = Engine::new(&game, request.options())?;
    let outcome = engine.solve();
    Ok(SolveReport::from_outcome(&game, &outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn absorbing_request(all_iterations: bool) -> SolveRequest {
        let state = StateSpec::new(
            vec![2, 1],
            DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 0.0]),
            DMatrix::from_row_slice(2, 1, &[1.0, 1.0]),
        );
        SolveRequest {
            all_iterations,
            ..SolveRequest::new(0.5, vec![state])
        }
    }

    #[test]
    fn final_revolution_report_has_points_only() {
        let report = solve_request(&absorbing_request(false)).unwrap();
        assert!(report.solved);
        let points = report.points.as_ref().unwrap();
        assert_eq!(points.len(), 1);
        assert!(points[0].nrows() > 0);
        assert!(points[0]
            .iter()
            .all(|value| (-1e-9..=1.0 + 1e-9).contains(value)));
        assert!(report.ipoints.is_none());
        assert!(report.revolution.is_none());
    }

    #[test]
    fn all_iterations_report_tags_revolutions() {
        let report = solve_request(&absorbing_request(true)).unwrap();
        let ipoints = report.ipoints.as_ref().unwrap();
        let revolution = report.revolution.as_ref().unwrap();
        assert_eq!(ipoints[0].nrows(), revolution.len());
        assert!(revolution.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(ipoints[0].nrows() >= report.points.as_ref().unwrap()[0].nrows());
        assert!(ipoints[0]
            .iter()
            .all(|value| (-1e-9..=1.0 + 1e-9).contains(value)));
    }

    #[test]
    fn failure_report_echoes_tables() {
        let state = StateSpec::new(
            vec![2, 2],
            DMatrix::from_row_slice(4, 2, &[1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0]),
            DMatrix::from_element(4, 1, 1.0),
        );
        let request = SolveRequest::new(0.5, vec![state.clone()]);
        let report = solve_request(&request).unwrap();

        assert!(!report.solved);
        assert!(report.points.is_none());
        assert!(report.msg.as_deref().unwrap().contains("state 0"));
        assert_eq!(report.payoffs.unwrap()[0], state.payoffs);
        assert_eq!(report.probabilities.unwrap()[0], state.transition);
    }

    #[test]
    fn malformed_request_never_solves() {
        let mut request = absorbing_request(false);
        request.num_states = 2;
        assert_eq!(
            solve_request(&request),
            Err(GameError::dimension_mismatch("state list", 2, 1))
        );
    }

    #[test]
    fn non_positive_tolerance_restores_defaults() {
        let mut request = absorbing_request(false);
        request.normtol = 1e-6;
        request.directiontol = 1e-6;
        request.leveltol = -1.0;
        request.improvetol = 1e-6;
        assert_eq!(request.options().parameters, SolverParameters::default());
    }
}
