//! Append-only record of the pivots produced by the engine.

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::error::SolveError;

/// One pivot step: a candidate extreme point for every state in one direction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Iteration {
    /// Global step counter, strictly increasing across the log.
    pub iteration: usize,
    /// Revolution (direction sweep) the step belongs to.
    pub revolution: usize,
    /// Search direction of the step.
    pub direction: DVector<f64>,
    /// Supporting payoff vector of each state.
    pub pivot: Vec<DVector<f64>>,
    /// Joint action generating the pivot in each state.
    pub actions: Vec<usize>,
}

/// Ordered sequence of [`Iteration`]s.
///
/// Only the engine appends. With a history limit, whole revolutions are evicted from
/// the front once more than `limit` revolutions are held.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolutionLog {
    num_states: usize,
    iterations: VecDeque<Iteration>,
    history_limit: Option<usize>,
    evicted: usize,
}

impl SolutionLog {
    pub(crate) fn new(num_states: usize, history_limit: Option<usize>) -> Self {
        Self {
            num_states,
            iterations: VecDeque::new(),
            history_limit,
            evicted: 0,
        }
    }

    pub(crate) fn push(&mut self, iteration: Iteration) -> Result<(), SolveError> {
        if let Some(last) = self.iterations.back() {
            if iteration.iteration <= last.iteration || iteration.revolution < last.revolution {
                return Err(SolveError::LogOrder {
                    last: last.iteration,
                    last_revolution: last.revolution,
                    found: iteration.iteration,
                    found_revolution: iteration.revolution,
                });
            }
        }
        debug_assert_eq!(iteration.pivot.len(), self.num_states);

        let newest = iteration.revolution;
        self.iterations.push_back(iteration);
        if let Some(limit) = self.history_limit {
            while self
                .iterations
                .front()
                .is_some_and(|front| front.revolution + limit <= newest)
            {
                self.iterations.pop_front();
                self.evicted += 1;
            }
        }
        Ok(())
    }

    /// Number of states each pivot covers.
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Number of retained iterations.
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    /// Whether nothing has been logged (or everything was evicted).
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Number of iterations dropped by the history limit.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// Iterates over the retained iterations in order.
    pub fn iterations(&self) -> impl Iterator<Item = &Iteration> {
        self.iterations.iter()
    }

    /// Last logged iteration.
    pub fn last(&self) -> Option<&Iteration> {
        self.iterations.back()
    }

    /// Revolution index of the final logged iteration.
    pub fn last_revolution(&self) -> Option<usize> {
        self.last().map(|iteration| iteration.revolution)
    }

    /// Iterations of revolution `revolution`, in order.
    pub fn revolution(&self, revolution: usize) -> impl Iterator<Item = &Iteration> {
        self.iterations
            .iter()
            .filter(move |iteration| iteration.revolution == revolution)
    }

    /// For each state, the pivots of revolution `revolution` in iteration order.
    pub fn points_for_revolution(&self, revolution: usize) -> Vec<Vec<DVector<f64>>> {
        let mut points = vec![Vec::new(); self.num_states];
        for iteration in self.revolution(revolution) {
            for (state, pivot) in iteration.pivot.iter().enumerate() {
                points[state].push(pivot.clone());
            }
        }
        points
    }

    /// For each state, every retained pivot, plus the revolution of each position.
    pub fn all_points(&self) -> (Vec<Vec<DVector<f64>>>, Vec<usize>) {
        let mut points = vec![Vec::with_capacity(self.len()); self.num_states];
        let mut revolutions = Vec::with_capacity(self.len());
        for iteration in &self.iterations {
            for (state, pivot) in iteration.pivot.iter().enumerate() {
                points[state].push(pivot.clone());
            }
            revolutions.push(iteration.revolution);
        }
        (points, revolutions)
    }
}

/// Full pivot history as tables: one per state, one row per iteration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct History {
    /// Per-state pivot tables, rows in iteration order, columns = players.
    pub points: Vec<DMatrix<f64>>,
    /// Revolution index of each row.
    pub revolutions: Vec<usize>,
}

impl History {
    /// Materialises [`SolutionLog::all_points`].
    pub fn from_log(log: &SolutionLog, num_players: usize) -> Self {
        let (points, revolutions) = log.all_points();
        Self {
            points: points
                .iter()
                .map(|pivots| points_table(pivots, num_players))
                .collect(),
            revolutions,
        }
    }
}

/// Stacks pivots into a table with one row per pivot.
pub fn points_table(pivots: &[DVector<f64>], num_players: usize) -> DMatrix<f64> {
    DMatrix::from_fn(pivots.len(), num_players, |row, player| pivots[row][player])
}
