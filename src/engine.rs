//! Revolution loop that refines every state's equilibrium payoff correspondence.
//!
//! Each state's correspondence is held as the convex hull of the pivots of the
//! previous revolution, starting from the hull of all stage payoffs. A revolution
//! sweeps every direction of a [`DirectionSet`]; for each one, every state gets the
//! payoff that maximises `d·x` among payoffs generated by some joint action,
//! continuation values drawn from the current hulls, and no profitable one-shot
//! deviation against the worst continuation (threat) payoff. A generated payoff must
//! also lie in its own state's current hull, so hulls are nested and the supporting
//! level `d_j·pivot_j` of every direction never increases. The loop stops when a
//! revolution moves no level by more than `leveltol`.

use log::{debug, info, trace, warn};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::directions::DirectionSet;
use crate::error::{Result, SolveError};
use crate::game::GameDescription;
use crate::lp::{LinearProgram, LpStatus};
use crate::options::{EngineOptions, Retrieval};
use crate::solution::{points_table, History, Iteration, SolutionLog};

/// Two points closer than this (sup norm) count as the same extreme point.
const DISTINCT_POINT_TOL: f64 = 1e-7;

/// Lifecycle of an [`Engine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    Uninitialized,
    Solving,
    Converged,
    Failed,
}

/// Convergence diagnostics of one revolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevolutionSummary {
    /// Revolution index.
    pub revolution: usize,
    /// Largest change of any supporting level during the revolution.
    pub max_change: f64,
    /// Largest sup-norm move of a pivot against the same direction one revolution
    /// earlier; infinite for the first revolution.
    pub max_movement: f64,
}

/// Best supportable payoff of one state in one direction.
#[derive(Clone, Debug)]
struct Support {
    point: DVector<f64>,
    action: usize,
    value: f64,
}

/// Iterative equilibrium-payoff solver for a single game.
#[derive(Debug)]
pub struct Engine<'a> {
    game: &'a GameDescription,
    options: EngineOptions,
    directions: DirectionSet,
    hulls: Vec<Vec<DVector<f64>>>,
    levels: Vec<DVector<f64>>,
    phase: EnginePhase,
    log: SolutionLog,
    summaries: Vec<RevolutionSummary>,
    next_iteration: usize,
}

impl<'a> Engine<'a> {
    /// Prepares an engine for `game`; nothing is solved until [`Engine::solve`].
    pub fn new(game: &'a GameDescription, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        let directions = DirectionSet::new(
            game.num_players(),
            options.directions,
            &options.parameters,
        );
        let feasible = distinct(game.stage_payoffs());
        let initial = DVector::from_iterator(
            directions.len(),
            directions
                .iter()
                .map(|direction| support_value(direction, &feasible)),
        );
        let log = SolutionLog::new(game.num_states(), options.history_limit);

        Ok(Self {
            game,
            hulls: vec![feasible; game.num_states()],
            levels: vec![initial; game.num_states()],
            options,
            directions,
            phase: EnginePhase::Uninitialized,
            log,
            summaries: Vec::new(),
            next_iteration: 0,
        })
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Game being solved.
    pub fn game(&self) -> &GameDescription {
        self.game
    }

    /// Directions swept by each revolution.
    pub fn directions(&self) -> &DirectionSet {
        &self.directions
    }

    /// Current supporting levels of `state`, one per direction; empty for an
    /// unknown state.
    pub fn levels(&self, state: usize) -> &[f64] {
        self.levels
            .get(state)
            .map(|levels| levels.as_slice())
            .unwrap_or(&[])
    }

    /// Runs revolutions until convergence, infeasibility or the revolution safeguard.
    ///
    /// An engine solves once; later calls fail with [`SolveError::AlreadySolved`].
    pub fn solve(&mut self) -> SolveOutcome {
        if self.phase != EnginePhase::Uninitialized {
            return SolveOutcome::Failed(SolveFailure {
                error: SolveError::AlreadySolved,
                log: SolutionLog::new(self.game.num_states(), self.options.history_limit),
                summaries: Vec::new(),
            });
        }

        self.phase = EnginePhase::Solving;
        info!(
            "solving game with {} states, {} players, {} directions per revolution, delta {}",
            self.game.num_states(),
            self.game.num_players(),
            self.directions.len(),
            self.game.delta()
        );

        let result = self.run();
        let log = std::mem::replace(
            &mut self.log,
            SolutionLog::new(self.game.num_states(), self.options.history_limit),
        );
        let summaries = std::mem::take(&mut self.summaries);

        match result {
            Ok(()) => {
                self.phase = EnginePhase::Converged;
                info!(
                    "converged after {} revolutions ({} iterations)",
                    summaries.len(),
                    self.next_iteration
                );
                SolveOutcome::Converged(Solution {
                    log,
                    directions: self.directions.clone(),
                    levels: self.levels.clone(),
                    summaries,
                    retrieval: self.options.retrieval,
                    num_players: self.game.num_players(),
                    leveltol: self.options.parameters.leveltol,
                })
            }
            Err(error) => {
                self.phase = EnginePhase::Failed;
                warn!("solve failed: {error}");
                SolveOutcome::Failed(SolveFailure {
                    error,
                    log,
                    summaries,
                })
            }
        }
    }

    fn run(&mut self) -> std::result::Result<(), SolveError> {
        let num_states = self.game.num_states();
        let leveltol = self.options.parameters.leveltol;
        let mut previous: Option<Vec<Vec<DVector<f64>>>> = None;
        let mut max_change = f64::INFINITY;

        for revolution in 0..self.options.max_revolutions {
            let required = self.incentive_bounds();
            let mut updated = self.levels.clone();
            let mut pivots = Vec::with_capacity(self.directions.len());

            for index in 0..self.directions.len() {
                let direction = self.directions.get(index).clone();
                let mut pivot = Vec::with_capacity(num_states);
                let mut actions = Vec::with_capacity(num_states);

                for state in 0..num_states {
                    let support = self
                        .support(state, &direction, &required[state])?
                        .ok_or_else(|| SolveError::Infeasible {
                            state,
                            revolution,
                            iteration: self.next_iteration,
                            direction: direction.iter().copied().collect(),
                        })?;
                    updated[state][index] = support.value;
                    pivot.push(support.point);
                    actions.push(support.action);
                }

                trace!(
                    "iteration {} (revolution {}): actions {:?}",
                    self.next_iteration,
                    revolution,
                    actions
                );
                self.log.push(Iteration {
                    iteration: self.next_iteration,
                    revolution,
                    direction,
                    pivot: pivot.clone(),
                    actions,
                })?;
                self.next_iteration += 1;
                pivots.push(pivot);
            }

            max_change = self
                .levels
                .iter()
                .zip(&updated)
                .map(|(old, new)| (old - new).amax())
                .fold(0.0, f64::max);
            let max_movement = previous.as_ref().map_or(f64::INFINITY, |earlier| {
                earlier
                    .iter()
                    .zip(&pivots)
                    .flat_map(|(before, after)| before.iter().zip(after))
                    .map(|(before, after)| (before - after).amax())
                    .fold(0.0, f64::max)
            });
            self.levels = updated;
            self.hulls = (0..num_states)
                .map(|state| distinct(pivots.iter().map(|pivot| pivot[state].clone())))
                .collect();
            self.summaries.push(RevolutionSummary {
                revolution,
                max_change,
                max_movement,
            });
            debug!(
                "revolution {revolution}: max level change {max_change:e}, max pivot movement {max_movement:e}, hull sizes {:?}",
                self.hulls.iter().map(Vec::len).collect::<Vec<_>>()
            );

            if max_change <= leveltol {
                return Ok(());
            }
            previous = Some(pivots);
        }

        Err(SolveError::NotConverged {
            revolutions: self.options.max_revolutions,
            max_change,
        })
    }

    /// Threat payoff of every player in every state: the lowest payoff the hull allows.
    fn threats(&self) -> Vec<DVector<f64>> {
        let num_players = self.game.num_players();
        self.hulls
            .iter()
            .map(|hull| {
                DVector::from_fn(num_players, |player, _| {
                    hull.iter()
                        .map(|vertex| vertex[player])
                        .fold(f64::INFINITY, f64::min)
                })
            })
            .collect()
    }

    /// Lower bound on each player's expected continuation payoff, per state and
    /// joint action, that rules out profitable one-shot deviations.
    ///
    /// `-inf` marks players without a constraint.
    fn incentive_bounds(&self) -> Vec<Vec<DVector<f64>>> {
        let delta = self.game.delta();
        let threats = self.threats();
        let num_players = self.game.num_players();

        (0..self.game.num_states())
            .map(|state| {
                let payoffs = self.game.payoffs(state);
                let transition = self.game.transition(state);
                let counts = self.game.num_actions(state);
                (0..self.game.num_actions_total(state))
                    .map(|action| {
                        let profile = self.game.action_profile(state, action);
                        DVector::from_fn(num_players, |player, _| {
                            if self.game.is_unconstrained(player) || counts[player] < 2 {
                                return f64::NEG_INFINITY;
                            }
                            let best_deviation = (0..counts[player])
                                .filter(|&own| own != profile[player])
                                .map(|own| {
                                    let deviation =
                                        self.game.deviation(state, action, player, own);
                                    let continuation: f64 = transition
                                        .row(deviation)
                                        .iter()
                                        .zip(&threats)
                                        .map(|(p, threat)| p * threat[player])
                                        .sum();
                                    (1.0 - delta) * payoffs[(deviation, player)]
                                        + delta * continuation
                                })
                                .fold(f64::NEG_INFINITY, f64::max);
                            (best_deviation - (1.0 - delta) * payoffs[(action, player)]) / delta
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Best supportable payoff of `state` in `direction` over all joint actions.
    fn support(
        &self,
        state: usize,
        direction: &DVector<f64>,
        required: &[DVector<f64>],
    ) -> std::result::Result<Option<Support>, SolveError> {
        let improvetol = self.options.parameters.improvetol;
        let mut best: Option<Support> = None;
        for (action, required) in required.iter().enumerate() {
            let Some(candidate) = self.generate(state, action, direction, required)? else {
                continue;
            };
            let improves = best
                .as_ref()
                .map_or(true, |incumbent| candidate.value > incumbent.value + improvetol);
            if improves {
                best = Some(candidate);
            }
        }
        Ok(best)
    }

    /// Self-generation test of one joint action: the highest payoff in `direction`
    /// it can deliver with incentive-compatible continuations inside the hulls.
    fn generate(
        &self,
        state: usize,
        action: usize,
        direction: &DVector<f64>,
        required: &DVector<f64>,
    ) -> std::result::Result<Option<Support>, SolveError> {
        let delta = self.game.delta();
        let num_players = self.game.num_players();
        let stage = self.game.payoff(state, action);
        let reachable: Vec<(usize, f64)> = self
            .game
            .transition(state)
            .row(action)
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| *p > 0.0)
            .collect();

        // Variables are convex weights: one block per reachable state's hull, then
        // one block over the own hull that must reproduce the generated payoff.
        let mut offsets = Vec::with_capacity(reachable.len());
        let mut width = 0;
        for &(next, _) in &reachable {
            offsets.push(width);
            width += self.hulls[next].len();
        }
        let own = width;
        let own_hull = &self.hulls[state];
        width += own_hull.len();

        let mut objective = DVector::zeros(width);
        for (block, &(next, p)) in reachable.iter().enumerate() {
            for (k, vertex) in self.hulls[next].iter().enumerate() {
                objective[offsets[block] + k] = delta * p * direction.dot(vertex);
            }
        }
        let mut program = LinearProgram::new(objective);

        for (block, &(next, _)) in reachable.iter().enumerate() {
            let mut weights = vec![0.0; width];
            weights[offsets[block]..offsets[block] + self.hulls[next].len()].fill(1.0);
            program.equal(weights, 1.0);
        }
        let mut weights = vec![0.0; width];
        weights[own..].fill(1.0);
        program.equal(weights, 1.0);

        for player in 0..num_players {
            let mut continuation = vec![0.0; width];
            for (block, &(next, p)) in reachable.iter().enumerate() {
                for (k, vertex) in self.hulls[next].iter().enumerate() {
                    continuation[offsets[block] + k] = p * vertex[player];
                }
            }
            let mut membership: Vec<f64> = continuation.iter().map(|c| -delta * c).collect();
            for (k, vertex) in own_hull.iter().enumerate() {
                membership[own + k] = vertex[player];
            }
            program.equal(membership, (1.0 - delta) * stage[player]);
            if required[player] > f64::NEG_INFINITY {
                program.greater_equal(continuation, required[player]);
            }
        }

        let weights = match program.solve(self.options.parameters.leveltol) {
            LpStatus::Optimal { x, .. } => x,
            LpStatus::Infeasible => return Ok(None),
            LpStatus::Unbounded => {
                return Err(SolveError::Numerical {
                    context: "unbounded continuation programme",
                })
            }
            LpStatus::Stalled => {
                return Err(SolveError::Numerical {
                    context: "simplex pivot limit",
                })
            }
        };

        let mut continuation = DVector::zeros(num_players);
        for (block, &(next, p)) in reachable.iter().enumerate() {
            for (k, vertex) in self.hulls[next].iter().enumerate() {
                continuation += vertex * (p * weights[offsets[block] + k]);
            }
        }
        let point = stage * (1.0 - delta) + continuation * delta;
        let value = direction.dot(&point);

        Ok(Some(Support {
            point,
            action,
            value,
        }))
    }
}

/// Largest projection of `points` on `direction`.
fn support_value(direction: &DVector<f64>, points: &[DVector<f64>]) -> f64 {
    points
        .iter()
        .map(|point| direction.dot(point))
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Keeps the first of every group of points within [`DISTINCT_POINT_TOL`].
fn distinct(points: impl IntoIterator<Item = DVector<f64>>) -> Vec<DVector<f64>> {
    let mut kept: Vec<DVector<f64>> = Vec::new();
    for point in points {
        if !kept
            .iter()
            .any(|other| (other - &point).amax() <= DISTINCT_POINT_TOL)
        {
            kept.push(point);
        }
    }
    kept
}

/// Whether `point` is a convex combination of `points`, each coordinate within `slack`.
fn hull_contains(points: &[DVector<f64>], point: &DVector<f64>, slack: f64) -> bool {
    if points.is_empty() || points.iter().any(|vertex| vertex.len() != point.len()) {
        return false;
    }
    let mut program = LinearProgram::new(DVector::zeros(points.len()));
    program.equal(vec![1.0; points.len()], 1.0);
    for (coordinate, &target) in point.iter().enumerate() {
        let row: Vec<f64> = points.iter().map(|vertex| vertex[coordinate]).collect();
        program.less_equal(row.clone(), target + slack);
        program.greater_equal(row, target - slack);
    }
    matches!(program.solve(slack), LpStatus::Optimal { .. })
}

/// Accepted approximation of the equilibrium payoff correspondence.
#[derive(Clone, Debug)]
pub struct Solution {
    log: SolutionLog,
    directions: DirectionSet,
    levels: Vec<DVector<f64>>,
    summaries: Vec<RevolutionSummary>,
    retrieval: Retrieval,
    num_players: usize,
    leveltol: f64,
}

impl Solution {
    /// Logged iterations.
    pub fn log(&self) -> &SolutionLog {
        &self.log
    }

    /// Releases the log.
    pub fn into_log(self) -> SolutionLog {
        self.log
    }

    /// Number of revolutions run.
    pub fn revolutions(&self) -> usize {
        self.summaries.len()
    }

    /// Index of the accepted (final) revolution.
    pub fn last_revolution(&self) -> usize {
        self.summaries.len().saturating_sub(1)
    }

    /// Per-revolution convergence diagnostics.
    pub fn summaries(&self) -> &[RevolutionSummary] {
        &self.summaries
    }

    /// History mode the solve was configured with.
    pub fn retrieval(&self) -> Retrieval {
        self.retrieval
    }

    /// Directions of the supporting levels.
    pub fn directions(&self) -> &DirectionSet {
        &self.directions
    }

    /// Accepted supporting levels of `state`, one per direction; empty for an
    /// unknown state.
    pub fn levels(&self, state: usize) -> &[f64] {
        self.levels
            .get(state)
            .map(|levels| levels.as_slice())
            .unwrap_or(&[])
    }

    /// Pivots of the final revolution: one table per state, one row per direction.
    pub fn final_points(&self) -> Vec<DMatrix<f64>> {
        self.log
            .points_for_revolution(self.last_revolution())
            .iter()
            .map(|pivots| points_table(pivots, self.num_players))
            .collect()
    }

    /// Full pivot history, available when every iteration was requested.
    pub fn history(&self) -> Option<History> {
        match self.retrieval {
            Retrieval::AllIterations => Some(History::from_log(&self.log, self.num_players)),
            Retrieval::FinalRevolution => None,
        }
    }

    /// Final pivots of `state` with near-duplicates removed, first occurrence kept,
    /// in sweep order; empty for an unknown state.
    pub fn extreme_points(&self, state: usize) -> Vec<DVector<f64>> {
        let points = self.log.points_for_revolution(self.last_revolution());
        distinct(points.into_iter().nth(state).unwrap_or_default())
    }

    /// Whether `point` lies in the convex hull of `state`'s extreme points; false for
    /// an unknown state.
    pub fn contains(&self, state: usize, point: &DVector<f64>) -> bool {
        let slack = self.leveltol.max(DISTINCT_POINT_TOL);
        hull_contains(&self.extreme_points(state), point, slack)
    }
}

/// A solve that stopped without a fixed point, with everything logged so far.
#[derive(Clone, Debug, Error)]
#[error("{error}")]
pub struct SolveFailure {
    error: SolveError,
    log: SolutionLog,
    summaries: Vec<RevolutionSummary>,
}

impl SolveFailure {
    /// Why the solve stopped.
    pub fn error(&self) -> &SolveError {
        &self.error
    }

    /// Partial log.
    pub fn log(&self) -> &SolutionLog {
        &self.log
    }

    /// Diagnostics of every completed revolution.
    pub fn summaries(&self) -> &[RevolutionSummary] {
        &self.summaries
    }

    /// Releases the partial log.
    pub fn into_log(self) -> SolutionLog {
        self.log
    }
}

/// Terminal result of [`Engine::solve`].
#[derive(Clone, Debug)]
pub enum SolveOutcome {
    Converged(Solution),
    Failed(SolveFailure),
}

impl SolveOutcome {
    /// Whether a fixed point was reached.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged(_))
    }

    /// The solution, when converged.
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Self::Converged(solution) => Some(solution),
            Self::Failed(_) => None,
        }
    }

    /// The failure, when not converged.
    pub fn failure(&self) -> Option<&SolveFailure> {
        match self {
            Self::Converged(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Log of the solve, complete or partial.
    pub fn log(&self) -> &SolutionLog {
        match self {
            Self::Converged(solution) => solution.log(),
            Self::Failed(failure) => failure.log(),
        }
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> std::result::Result<Solution, SolveFailure> {
        match self {
            Self::Converged(solution) => Ok(solution),
            Self::Failed(failure) => Err(failure),
        }
    }
}

/// Builds an engine for `game` and solves it.
pub fn solve(game: &GameDescription, options: EngineOptions) -> Result<SolveOutcome> {
    let mut engine = Engine::new(game, options)?;
    Ok(engine.solve())
}
