//! Game primitives and the validation that guards them.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Axis, GameError, Result, Table};

/// Slack allowed when checking that a transition row sums to one.
pub const PROBABILITY_SLACK: f64 = 1e-8;

/// Raw description of a single state as supplied by a caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    /// Number of actions of each player in this state.
    pub num_actions: Vec<usize>,
    /// Stage payoffs: one row per joint action, one column per player.
    pub payoffs: DMatrix<f64>,
    /// Transition probabilities: one row per joint action, one column per state.
    pub transition: DMatrix<f64>,
}

impl StateSpec {
    /// Creates a state from its action counts and tables.
    pub fn new(num_actions: Vec<usize>, payoffs: DMatrix<f64>, transition: DMatrix<f64>) -> Self {
        Self {
            num_actions,
            payoffs,
            transition,
        }
    }

    /// Size of the joint action space, the product of the action counts.
    pub fn num_actions_total(&self) -> usize {
        self.num_actions.iter().product()
    }
}

/// Validated, immutable description of a discounted stochastic game.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameDescription {
    delta: f64,
    num_players: usize,
    states: Vec<StateSpec>,
    unconstrained: Vec<bool>,
}

impl GameDescription {
    /// Validates and assembles a game from per-state collections.
    ///
    /// `payoffs[s]` and `transitions[s]` are row-per-joint-action tables. An empty
    /// `unconstrained` slice means every player is subject to incentive constraints.
    pub fn new(
        delta: f64,
        num_actions: Vec<Vec<usize>>,
        payoffs: Vec<DMatrix<f64>>,
        transitions: Vec<DMatrix<f64>>,
        unconstrained: &[bool],
    ) -> Result<Self> {
        let num_states = num_actions.len();
        if payoffs.len() != num_states {
            return Err(GameError::dimension_mismatch(
                "payoff tables",
                num_states,
                payoffs.len(),
            ));
        }
        if transitions.len() != num_states {
            return Err(GameError::dimension_mismatch(
                "transition tables",
                num_states,
                transitions.len(),
            ));
        }

        let states = num_actions
            .into_iter()
            .zip(payoffs)
            .zip(transitions)
            .map(|((actions, payoff), transition)| StateSpec::new(actions, payoff, transition));

        let mut builder = GameBuilder::new(delta).states(states);
        if !unconstrained.is_empty() {
            builder = builder.unconstrained(unconstrained.to_vec());
        }
        builder.build()
    }

    /// Starts a builder for a game with discount factor `delta`.
    pub fn builder(delta: f64) -> GameBuilder {
        GameBuilder::new(delta)
    }

    /// Common discount factor.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of players.
    pub fn num_players(&self) -> usize {
        self.num_players
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Read-only access to the states.
    pub fn states(&self) -> &[StateSpec] {
        &self.states
    }

    /// Action counts of each player in `state`.
    pub fn num_actions(&self, state: usize) -> &[usize] {
        &self.states[state].num_actions
    }

    /// Size of the joint action space of `state`.
    pub fn num_actions_total(&self, state: usize) -> usize {
        self.states[state].num_actions_total()
    }

    /// Payoff table of `state`.
    pub fn payoffs(&self, state: usize) -> &DMatrix<f64> {
        &self.states[state].payoffs
    }

    /// Transition table of `state`.
    pub fn transition(&self, state: usize) -> &DMatrix<f64> {
        &self.states[state].transition
    }

    /// Stage payoff vector of joint action `action` in `state`.
    pub fn payoff(&self, state: usize, action: usize) -> DVector<f64> {
        self.states[state].payoffs.row(action).transpose()
    }

    /// Per-player flags disabling incentive constraints.
    pub fn unconstrained(&self) -> &[bool] {
        &self.unconstrained
    }

    /// Whether `player`'s incentive constraints are ignored.
    pub fn is_unconstrained(&self, player: usize) -> bool {
        self.unconstrained[player]
    }

    /// Decodes a joint action index into one action per player.
    ///
    /// Player 0 varies fastest.
    pub fn action_profile(&self, state: usize, mut action: usize) -> Vec<usize> {
        self.states[state]
            .num_actions
            .iter()
            .map(|&count| {
                let own = action % count;
                action /= count;
                own
            })
            .collect()
    }

    /// Encodes one action per player into a joint action index.
    pub fn joint_index(&self, state: usize, profile: &[usize]) -> usize {
        self.states[state]
            .num_actions
            .iter()
            .zip(profile)
            .rev()
            .fold(0, |index, (&count, &own)| index * count + own)
    }

    /// Joint action reached when `player` alone switches to `own` from `action`.
    pub fn deviation(&self, state: usize, action: usize, player: usize, own: usize) -> usize {
        let mut profile = self.action_profile(state, action);
        profile[player] = own;
        self.joint_index(state, &profile)
    }

    /// Distinct stage payoff vectors across all states, in state and action order.
    ///
    /// Their convex hull contains every state's equilibrium payoffs.
    pub fn stage_payoffs(&self) -> Vec<DVector<f64>> {
        let mut points: Vec<DVector<f64>> = Vec::new();
        for state in &self.states {
            for row in state.payoffs.row_iter() {
                let point = row.transpose();
                if !points.contains(&point) {
                    points.push(point);
                }
            }
        }
        points
    }
}

/// Builder that validates shapes and probabilities before constructing a [`GameDescription`].
#[derive(Debug)]
pub struct GameBuilder {
    delta: f64,
    states: Vec<StateSpec>,
    unconstrained: Option<Vec<bool>>,
}

impl GameBuilder {
    /// Start building a game with discount factor `delta`.
    pub fn new(delta: f64) -> Self {
        Self {
            delta,
            states: Vec::new(),
            unconstrained: None,
        }
    }

    /// Appends one state.
    pub fn state(mut self, state: StateSpec) -> Self {
        self.states.push(state);
        self
    }

    /// Appends several states in order.
    pub fn states<I: IntoIterator<Item = StateSpec>>(mut self, states: I) -> Self {
        self.states.extend(states);
        self
    }

    /// Sets the per-player unconstrained flags.
    pub fn unconstrained(mut self, flags: Vec<bool>) -> Self {
        self.unconstrained = Some(flags);
        self
    }

    /// Finalizes construction after validating every table.
    pub fn build(self) -> Result<GameDescription> {
        if !(self.delta.is_finite() && self.delta > 0.0 && self.delta < 1.0) {
            return Err(GameError::InvalidDiscount { delta: self.delta });
        }

        let num_states = self.states.len();
        let first = self.states.first().ok_or(GameError::NoStates)?;
        let num_players = first.num_actions.len();
        if num_players == 0 {
            return Err(GameError::PlayerCountMismatch {
                state: 0,
                expected: 1,
                found: 0,
            });
        }

        for (index, state) in self.states.iter().enumerate() {
            validate_state(index, state, num_players, num_states)?;
        }

        let unconstrained = self
            .unconstrained
            .unwrap_or_else(|| vec![false; num_players]);
        if unconstrained.len() != num_players {
            return Err(GameError::dimension_mismatch(
                "unconstrained flags",
                num_players,
                unconstrained.len(),
            ));
        }

        Ok(GameDescription {
            delta: self.delta,
            num_players,
            states: self.states,
            unconstrained,
        })
    }
}

fn validate_state(
    index: usize,
    state: &StateSpec,
    num_players: usize,
    num_states: usize,
) -> Result<()> {
    if state.num_actions.len() != num_players {
        return Err(GameError::PlayerCountMismatch {
            state: index,
            expected: num_players,
            found: state.num_actions.len(),
        });
    }
    if let Some(player) = state.num_actions.iter().position(|&count| count == 0) {
        return Err(GameError::NonPositiveActions {
            state: index,
            player,
        });
    }

    let total = state.num_actions_total();
    check_shape(index, Table::Payoffs, &state.payoffs, total, num_players)?;
    check_shape(index, Table::Transition, &state.transition, total, num_states)?;

    if state.payoffs.iter().any(|value| !value.is_finite()) {
        return Err(GameError::NonFinite {
            state: index,
            table: Table::Payoffs,
        });
    }
    if state.transition.iter().any(|value| !value.is_finite()) {
        return Err(GameError::NonFinite {
            state: index,
            table: Table::Transition,
        });
    }

    for (action, row) in state.transition.row_iter().enumerate() {
        if let Some((next, &value)) = row.iter().enumerate().find(|(_, p)| **p < 0.0) {
            return Err(GameError::NegativeProbability {
                state: index,
                action,
                next,
                value,
            });
        }
        let sum = row.sum();
        if (sum - 1.0).abs() > PROBABILITY_SLACK {
            return Err(GameError::NonStochasticRow {
                state: index,
                action,
                sum,
            });
        }
    }

    Ok(())
}

fn check_shape(
    state: usize,
    table: Table,
    matrix: &DMatrix<f64>,
    rows: usize,
    columns: usize,
) -> Result<()> {
    if matrix.nrows() != rows {
        return Err(GameError::table_shape(
            state,
            table,
            Axis::Rows,
            rows,
            matrix.nrows(),
        ));
    }
    if matrix.ncols() != columns {
        return Err(GameError::table_shape(
            state,
            table,
            Axis::Columns,
            columns,
            matrix.ncols(),
        ));
    }
    Ok(())
}
