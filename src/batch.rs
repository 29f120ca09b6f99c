//! Solving many independent games at once.

use rayon::prelude::*;

use crate::engine::{Engine, SolveOutcome};
use crate::error::Result;
use crate::game::GameDescription;
use crate::options::EngineOptions;

/// Solves every game with its own engine, in parallel.
///
/// Outcomes are returned in the order of `games`. Options are validated once up
/// front.
pub fn solve_all(games: &[GameDescription], options: &EngineOptions) -> Result<Vec<SolveOutcome>> {
    options.validate()?;
    games
        .par_iter()
        .map(|game| {
            let mut engine = Engine::new(game, options.clone())?;
            Ok(engine.solve())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::solve;
    use crate::games::{matching_pennies, prisoners_dilemma};

    #[test]
    fn parallel_outcomes_match_sequential_solves() {
        let games = vec![
            prisoners_dilemma(0.6).unwrap(),
            matching_pennies(0.5).unwrap(),
            prisoners_dilemma(0.7).unwrap(),
        ];
        let options = EngineOptions::default();
        let outcomes = solve_all(&games, &options).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_converged());
        assert!(!outcomes[1].is_converged());
        for (game, outcome) in games.iter().zip(&outcomes) {
            let sequential = solve(game, options.clone()).unwrap();
            assert_eq!(sequential.log(), outcome.log());
        }
    }

    #[test]
    fn invalid_options_fail_fast() {
        let games = vec![prisoners_dilemma(0.6).unwrap()];
        let options = EngineOptions::default().with_max_revolutions(0);
        assert!(solve_all(&games, &options).is_err());
    }
}
