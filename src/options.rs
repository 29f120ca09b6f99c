//! Numerical tolerances and engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Numerical tolerances that steer convergence and robustness of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverParameters {
    /// Direction components below this magnitude are snapped to zero, and directions
    /// shorter than this are discarded.
    pub normtol: f64,
    /// Minimum angular distance `1 - d·d'` between two directions of a revolution.
    pub directiontol: f64,
    /// Feasibility slack of the self-generation test and the convergence threshold
    /// on supporting levels.
    pub leveltol: f64,
    /// Improvement a joint action needs over the incumbent to become the new pivot.
    pub improvetol: f64,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            normtol: 1e-10,
            directiontol: 1e-10,
            leveltol: 1e-8,
            improvetol: 1e-12,
        }
    }
}

impl SolverParameters {
    /// Builds parameters from raw host values.
    ///
    /// If any value is non-positive or not finite, the defaults are used for all four.
    pub fn from_raw(normtol: f64, directiontol: f64, leveltol: f64, improvetol: f64) -> Self {
        let all_set = [normtol, directiontol, leveltol, improvetol]
            .iter()
            .all(|value| value.is_finite() && *value > 0.0);
        if all_set {
            Self {
                normtol,
                directiontol,
                leveltol,
                improvetol,
            }
        } else {
            Self::default()
        }
    }
}

/// Which part of the iteration history a solve exposes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Retrieval {
    /// Only the pivots of the final revolution.
    #[default]
    FinalRevolution,
    /// Every logged pivot, tagged with its revolution.
    AllIterations,
}

/// Aggregated configuration of an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Numerical tolerances.
    pub parameters: SolverParameters,
    /// Safeguard on the number of revolutions before giving up.
    pub max_revolutions: usize,
    /// Number of search directions per revolution in two-player games.
    pub directions: usize,
    /// Number of most recent revolutions retained in the log; `None` keeps everything.
    pub history_limit: Option<usize>,
    /// History exposed by the solution.
    pub retrieval: Retrieval,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parameters: SolverParameters::default(),
            max_revolutions: 10_000,
            directions: 32,
            history_limit: None,
            retrieval: Retrieval::FinalRevolution,
        }
    }
}

impl EngineOptions {
    /// Override the tolerances while preserving other defaults.
    pub fn with_parameters(mut self, parameters: SolverParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the maximum number of revolutions.
    pub fn with_max_revolutions(mut self, max_revolutions: usize) -> Self {
        self.max_revolutions = max_revolutions;
        self
    }

    /// Set the two-player sweep resolution; rounded up to a multiple of four.
    pub fn with_directions(mut self, directions: usize) -> Self {
        self.directions = directions;
        self
    }

    /// Keep only the `revolutions` most recent revolutions in the log.
    pub fn with_history_limit(mut self, revolutions: usize) -> Self {
        self.history_limit = Some(revolutions);
        self
    }

    /// Choose which history the solution exposes.
    pub fn with_retrieval(mut self, retrieval: Retrieval) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Shorthand for `with_retrieval(Retrieval::AllIterations)` when `all` is set.
    pub fn with_all_iterations(self, all: bool) -> Self {
        self.with_retrieval(if all {
            Retrieval::AllIterations
        } else {
            Retrieval::FinalRevolution
        })
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_revolutions == 0 {
            return Err(GameError::invalid_option(
                "max_revolutions",
                "at least one revolution is required",
            ));
        }
        if self.directions == 0 {
            return Err(GameError::invalid_option(
                "directions",
                "at least one search direction is required",
            ));
        }
        if self.history_limit == Some(0) {
            return Err(GameError::invalid_option(
                "history_limit",
                "the final revolution must be retained",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_fall_back_together() {
        let custom = SolverParameters::from_raw(1e-9, 1e-9, 1e-7, 1e-11);
        assert_eq!(custom.leveltol, 1e-7);

        let fallback = SolverParameters::from_raw(1e-9, 0.0, 1e-7, 1e-11);
        assert_eq!(fallback, SolverParameters::default());

        let negative = SolverParameters::from_raw(-1.0, 1e-9, 1e-7, 1e-11);
        assert_eq!(negative, SolverParameters::default());
    }

    #[test]
    fn validate_rejects_degenerate_options() {
        assert!(EngineOptions::default().validate().is_ok());
        assert!(EngineOptions::default()
            .with_max_revolutions(0)
            .validate()
            .is_err());
        assert!(EngineOptions::default().with_directions(0).validate().is_err());
        assert!(EngineOptions::default()
            .with_history_limit(0)
            .validate()
            .is_err());
    }

    #[test]
    fn all_iterations_flag_selects_retrieval() {
        let options = EngineOptions::default().with_all_iterations(true);
        assert_eq!(options.retrieval, Retrieval::AllIterations);
        assert_eq!(
            options.with_all_iterations(false).retrieval,
            Retrieval::FinalRevolution
        );
    }
}
