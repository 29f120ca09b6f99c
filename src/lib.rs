//! Subgame-perfect equilibrium payoff sets of discounted stochastic games.
//!
//! Given, for every state, the players' action counts, stage payoffs and transition
//! probabilities, plus a common discount factor, this crate approximates for each
//! state the set of payoff vectors attainable in a pure-strategy subgame-perfect
//! equilibrium with public randomisation. It offers tools to
//!
//! - describe and validate a game (`game` module),
//! - configure tolerances and the revolution safeguard (`options` module),
//! - run the self-generation fixed-point iteration (`engine` module), and
//! - read back every pivot the engine produced (`solution` module).
//!
//! Each correspondence is kept as the convex hull of the pivots found by the
//! previous revolution, starting from the hull of all stage payoffs. One revolution
//! sweeps every search direction and, state by state, finds the payoff that
//! maximises the direction among all payoffs supportable by a joint action with
//! incentive-compatible continuation values drawn from the current hulls.
//! Revolutions repeat until no supporting level moves by more than the level
//! tolerance.
//!
//! # Quick start
//!
//! ```no_run
//! use sgsolve::games::prisoners_dilemma;
//! use sgsolve::{Engine, EngineOptions};
//!
//! let game = prisoners_dilemma(0.8).expect("valid game");
//! let mut engine = Engine::new(&game, EngineOptions::default()).expect("valid options");
//!
//! match engine.solve().into_result() {
//!     Ok(solution) => {
//!         for point in solution.extreme_points(0) {
//!             println!("({:.4}, {:.4})", point[0], point[1]);
//!         }
//!     }
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! ```
//!
//! The engine is single-threaded; independent games can be solved concurrently with
//! [`batch::solve_all`].

pub mod batch;
pub mod directions;
pub mod engine;
pub mod error;
pub mod game;
pub mod games;
pub mod lp;
pub mod options;
pub mod report;
pub mod solution;

pub use engine::{
    solve, Engine, EnginePhase, RevolutionSummary, Solution, SolveFailure, SolveOutcome,
};
pub use error::{GameError, SolveError};
pub use game::{GameBuilder, GameDescription, StateSpec};
pub use options::{EngineOptions, Retrieval, SolverParameters};
pub use solution::{History, Iteration, SolutionLog};
