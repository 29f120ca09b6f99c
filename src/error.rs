use std::fmt;

use thiserror::Error;

/// Which per-state table a validation failure refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    /// Stage payoffs, one row per joint action and one column per player.
    Payoffs,
    /// Transition probabilities, one row per joint action and one column per state.
    Transition,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Payoffs => f.write_str("payoff"),
            Table::Transition => f.write_str("transition"),
        }
    }
}

/// Which dimension of a table did not match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Rows => f.write_str("rows"),
            Axis::Columns => f.write_str("columns"),
        }
    }
}

/// Malformed input, detected before any solving work starts.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    /// Raised when the discount factor lies outside the open unit interval.
    #[error("discount factor must lie strictly between 0 and 1, found {delta}")]
    InvalidDiscount { delta: f64 },

    /// Raised when a game is built without any state.
    #[error("a game needs at least one state")]
    NoStates,

    /// Raised when provided collections have incompatible lengths.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        /// The required dimension, often the model-implied value.
        expected: usize,
        /// The dimension that was actually supplied.
        found: usize,
    },

    /// Raised when a state lists action counts for a different number of players.
    #[error("state {state} lists actions for {found} players, expected {expected}")]
    PlayerCountMismatch {
        state: usize,
        expected: usize,
        found: usize,
    },

    /// Raised when a player has no action in some state.
    #[error("player {player} has no action in state {state}")]
    NonPositiveActions { state: usize, player: usize },

    /// Raised when a payoff or transition table has the wrong shape.
    #[error("{table} table of state {state} has {found} {axis}, expected {expected}")]
    TableShape {
        state: usize,
        table: Table,
        axis: Axis,
        expected: usize,
        found: usize,
    },

    /// Raised when a table holds NaN or an infinity.
    #[error("{table} table of state {state} contains a non-finite entry")]
    NonFinite { state: usize, table: Table },

    /// Raised when a transition probability is negative.
    #[error(
        "transition probability from state {state} under action {action} to state {next} is negative ({value})"
    )]
    NegativeProbability {
        state: usize,
        action: usize,
        next: usize,
        value: f64,
    },

    /// Raised when a transition row is not a probability distribution.
    #[error("transition row of state {state} under action {action} sums to {sum}, not 1")]
    NonStochasticRow { state: usize, action: usize, sum: f64 },

    /// Raised when an engine option cannot be honoured.
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption {
        name: &'static str,
        reason: &'static str,
    },
}

impl GameError {
    /// Helper to format a [`DimensionMismatch`](GameError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper to format a [`TableShape`](GameError::TableShape) error.
    pub fn table_shape(
        state: usize,
        table: Table,
        axis: Axis,
        expected: usize,
        found: usize,
    ) -> Self {
        Self::TableShape {
            state,
            table,
            axis,
            expected,
            found,
        }
    }

    /// Helper for rejecting engine options.
    pub fn invalid_option(name: &'static str, reason: &'static str) -> Self {
        Self::InvalidOption { name, reason }
    }

    /// The state the failure refers to, when there is one.
    pub fn state(&self) -> Option<usize> {
        match self {
            Self::PlayerCountMismatch { state, .. }
            | Self::NonPositiveActions { state, .. }
            | Self::TableShape { state, .. }
            | Self::NonFinite { state, .. }
            | Self::NegativeProbability { state, .. }
            | Self::NonStochasticRow { state, .. } => Some(*state),
            _ => None,
        }
    }
}

/// Reasons a solve can stop before reaching a fixed point.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolveError {
    /// No joint action can be supported in some state for some direction.
    #[error(
        "empty correspondence: no action in state {state} is supportable in direction {direction:?} \
         (revolution {revolution}, iteration {iteration})"
    )]
    Infeasible {
        state: usize,
        revolution: usize,
        iteration: usize,
        direction: Vec<f64>,
    },

    /// The revolution safeguard was exhausted without meeting the level tolerance.
    #[error(
        "did not converge after {revolutions} revolutions; last maximal level change {max_change}"
    )]
    NotConverged { revolutions: usize, max_change: f64 },

    /// The linear programme behind the self-generation test broke down.
    #[error("numerical failure during {context}")]
    Numerical { context: &'static str },

    /// An iteration was appended out of order.
    #[error(
        "iteration {found} of revolution {found_revolution} appended after iteration {last} \
         of revolution {last_revolution}"
    )]
    LogOrder {
        last: usize,
        last_revolution: usize,
        found: usize,
        found_revolution: usize,
    },

    /// The engine already reached a terminal phase.
    #[error("engine has already finished solving")]
    AlreadySolved,
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, GameError>;
