//! Ready-made games, useful for experiments, tests and benchmarks.

use nalgebra::DMatrix;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Dirichlet, Distribution, Uniform};

use crate::error::{GameError, Result};
use crate::game::{GameBuilder, GameDescription, StateSpec};

/// Repeated prisoners' dilemma; action 0 cooperates, action 1 defects.
pub fn prisoners_dilemma(delta: f64) -> Result<GameDescription> {
    // Rows: (C,C) (D,C) (C,D) (D,D), player 0 varying fastest.
    let payoffs = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, 2.0, -1.0, -1.0, 2.0, 0.0, 0.0]);
    GameBuilder::new(delta)
        .state(StateSpec::new(
            vec![2, 2],
            payoffs,
            DMatrix::from_element(4, 1, 1.0),
        ))
        .build()
}

/// Repeated matching pennies; it has no pure-strategy equilibrium.
pub fn matching_pennies(delta: f64) -> Result<GameDescription> {
    let payoffs = DMatrix::from_row_slice(4, 2, &[1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0]);
    GameBuilder::new(delta)
        .state(StateSpec::new(
            vec![2, 2],
            payoffs,
            DMatrix::from_element(4, 1, 1.0),
        ))
        .build()
}

/// Two-player risk sharing with i.i.d. endowments.
///
/// In state `s` player 0 holds `endowments[s]` of a unit good and player 1 the rest.
/// The richer player picks a transfer from `num_transfers` evenly spaced amounts
/// between zero and their whole endowment; the other player has a single action.
/// Stage utility is the square root of consumption and the next state is uniform.
pub fn risk_sharing(
    delta: f64,
    endowments: &[f64],
    num_transfers: usize,
) -> Result<GameDescription> {
    if num_transfers == 0 {
        return Err(GameError::invalid_option(
            "num_transfers",
            "at least one transfer level is required",
        ));
    }
    if endowments.iter().any(|e| !(0.0..=1.0).contains(e)) {
        return Err(GameError::invalid_option(
            "endowments",
            "endowment shares must lie in [0, 1]",
        ));
    }

    let num_states = endowments.len();
    let uniform = 1.0 / num_states.max(1) as f64;
    let states = endowments.iter().map(|&own| {
        let donor_is_first = own >= 0.5;
        let wealth = if donor_is_first { own } else { 1.0 - own };
        let step = if num_transfers > 1 {
            wealth / (num_transfers - 1) as f64
        } else {
            0.0
        };
        let num_actions = if donor_is_first {
            vec![num_transfers, 1]
        } else {
            vec![1, num_transfers]
        };
        let payoffs = DMatrix::from_fn(num_transfers, 2, |action, player| {
            let transfer = step * action as f64;
            let first = if donor_is_first {
                own - transfer
            } else {
                own + transfer
            };
            let consumption = if player == 0 { first } else { 1.0 - first };
            consumption.max(0.0).sqrt()
        });
        StateSpec::new(
            num_actions,
            payoffs,
            DMatrix::from_element(num_transfers, num_states, uniform),
        )
    });

    GameBuilder::new(delta).states(states).build()
}

/// Dimensions of a random game.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomGameConfig {
    pub delta: f64,
    pub num_states: usize,
    /// Action count of each player, shared by every state.
    pub num_actions: Vec<usize>,
    /// Stage payoffs are drawn uniformly from this range.
    pub payoff_range: (f64, f64),
    /// Dirichlet concentration of each transition row.
    pub concentration: f64,
}

impl Default for RandomGameConfig {
    fn default() -> Self {
        Self {
            delta: 0.7,
            num_states: 2,
            num_actions: vec![2, 2],
            payoff_range: (0.0, 1.0),
            concentration: 1.0,
        }
    }
}

/// Draws a game with uniform payoffs and Dirichlet transition rows.
pub fn random(config: &RandomGameConfig, seed: u64) -> Result<GameDescription> {
    let (low, high) = config.payoff_range;
    if !(low < high) {
        return Err(GameError::invalid_option(
            "payoff_range",
            "lower bound must be below upper bound",
        ));
    }
    if !(config.concentration > 0.0) {
        return Err(GameError::invalid_option(
            "concentration",
            "Dirichlet concentration must be positive",
        ));
    }

    let mut rng = SmallRng::seed_from_u64(seed);
    let payoff = Uniform::new(low, high);
    let rows = if config.num_states > 1 {
        let alpha = vec![config.concentration; config.num_states];
        Some(Dirichlet::new(&alpha).map_err(|_| {
            GameError::invalid_option("concentration", "invalid Dirichlet parameters")
        })?)
    } else {
        None
    };

    let total: usize = config.num_actions.iter().product();
    let players = config.num_actions.len();
    let mut states = Vec::with_capacity(config.num_states);
    for _ in 0..config.num_states {
        let payoffs = DMatrix::from_fn(total, players, |_, _| payoff.sample(&mut rng));
        let mut transition = DMatrix::from_element(total, config.num_states, 1.0);
        if let Some(rows) = &rows {
            for action in 0..total {
                let row: Vec<f64> = rows.sample(&mut rng);
                for (next, p) in row.into_iter().enumerate() {
                    transition[(action, next)] = p;
                }
            }
        }
        states.push(StateSpec::new(
            config.num_actions.clone(),
            payoffs,
            transition,
        ));
    }

    GameBuilder::new(config.delta).states(states).build()
}
