//! Dense two-phase simplex for the small programmes of the self-generation test.
//!
//! Programmes have the form `maximize c·x subject to A x <= b, x >= 0`. Right-hand
//! sides may be negative; phase one then drives artificial variables out of the
//! basis. Bland's rule picks entering and leaving variables, so degenerate pivots
//! cannot cycle.

use nalgebra::{DMatrix, DVector};

/// Magnitude below which a tableau entry counts as zero.
const PIVOT_EPS: f64 = 1e-11;

/// Safeguard on pivots per phase; Bland's rule terminates well before this.
const MAX_PIVOTS: usize = 50_000;

/// Result of a linear programme.
#[derive(Clone, Debug, PartialEq)]
pub enum LpStatus {
    /// An optimal vertex and its objective value.
    Optimal { x: DVector<f64>, value: f64 },
    /// The constraints admit no point within the feasibility tolerance.
    Infeasible,
    /// The objective grows without bound on the feasible set.
    Unbounded,
    /// The pivot safeguard was hit.
    Stalled,
}

/// `maximize c·x subject to A x <= b, x >= 0`.
#[derive(Clone, Debug)]
pub struct LinearProgram {
    objective: DVector<f64>,
    rows: Vec<(Vec<f64>, f64)>,
}

impl LinearProgram {
    /// Creates a programme over `objective.len()` non-negative variables.
    pub fn new(objective: DVector<f64>) -> Self {
        Self {
            objective,
            rows: Vec::new(),
        }
    }

    /// Number of decision variables.
    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    /// Number of inequality constraints.
    pub fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    /// Adds `coefficients · x <= bound`.
    pub fn less_equal(&mut self, coefficients: Vec<f64>, bound: f64) {
        debug_assert_eq!(coefficients.len(), self.num_variables());
        self.rows.push((coefficients, bound));
    }

    /// Adds `coefficients · x >= bound`.
    pub fn greater_equal(&mut self, coefficients: Vec<f64>, bound: f64) {
        let negated = coefficients.into_iter().map(|value| -value).collect();
        self.less_equal(negated, -bound);
    }

    /// Adds `coefficients · x = bound` as a pair of inequalities.
    pub fn equal(&mut self, coefficients: Vec<f64>, bound: f64) {
        self.less_equal(coefficients.clone(), bound);
        self.greater_equal(coefficients, bound);
    }

    /// Solves the programme; `feasibility` is the phase-one slack tolerated.
    pub fn solve(&self, feasibility: f64) -> LpStatus {
        let mut tableau = Tableau::new(self);
        if tableau.artificials > 0 {
            match tableau.phase_one(feasibility) {
                Phase::Done => {}
                Phase::Infeasible => return LpStatus::Infeasible,
                Phase::Unbounded | Phase::Stalled => return LpStatus::Stalled,
            }
        }
        match tableau.phase_two(&self.objective) {
            Phase::Done => {
                let x = tableau.primal(self.num_variables());
                let value = self.objective.dot(&x);
                LpStatus::Optimal { x, value }
            }
            Phase::Unbounded => LpStatus::Unbounded,
            Phase::Infeasible | Phase::Stalled => LpStatus::Stalled,
        }
    }
}

enum Phase {
    Done,
    Infeasible,
    Unbounded,
    Stalled,
}

/// Row `m` of `cells` is the objective row; the last column holds right-hand sides.
struct Tableau {
    cells: DMatrix<f64>,
    basis: Vec<usize>,
    structural: usize,
    artificials: usize,
}

impl Tableau {
    fn new(program: &LinearProgram) -> Self {
        let n = program.num_variables();
        let m = program.num_constraints();
        let artificials = program.rows.iter().filter(|(_, b)| *b < 0.0).count();
        let width = n + m + artificials + 1;
        let mut cells = DMatrix::zeros(m + 1, width);
        let mut basis = Vec::with_capacity(m);

        let mut next_artificial = n + m;
        for (i, (coefficients, bound)) in program.rows.iter().enumerate() {
            let sign = if *bound < 0.0 { -1.0 } else { 1.0 };
            for (j, value) in coefficients.iter().enumerate() {
                cells[(i, j)] = sign * value;
            }
            cells[(i, n + i)] = sign;
            cells[(i, width - 1)] = sign * bound;
            if *bound < 0.0 {
                cells[(i, next_artificial)] = 1.0;
                basis.push(next_artificial);
                next_artificial += 1;
            } else {
                basis.push(n + i);
            }
        }

        Self {
            cells,
            basis,
            structural: n + m,
            artificials,
        }
    }

    fn rhs(&self) -> usize {
        self.cells.ncols() - 1
    }

    fn objective_row(&self) -> usize {
        self.cells.nrows() - 1
    }

    fn phase_one(&mut self, feasibility: f64) -> Phase {
        let z = self.objective_row();
        let rhs = self.rhs();
        self.cells.row_mut(z).fill(0.0);
        for j in self.structural..rhs {
            self.cells[(z, j)] = 1.0;
        }
        for i in 0..self.basis.len() {
            if self.basis[i] >= self.structural {
                let row = self.cells.row(i).clone_owned();
                let mut target = self.cells.row_mut(z);
                target -= row;
            }
        }

        match self.iterate(rhs) {
            Phase::Done => {}
            other => return other,
        }
        // The objective row holds `-sum(artificials)` at the optimum.
        if self.cells[(z, rhs)] < -feasibility {
            return Phase::Infeasible;
        }
        self.evict_artificials();
        Phase::Done
    }

    /// Pivots zero-valued artificials out of the basis where a structural column allows.
    fn evict_artificials(&mut self) {
        for i in 0..self.basis.len() {
            if self.basis[i] < self.structural {
                continue;
            }
            if let Some(j) = (0..self.structural).find(|&j| self.cells[(i, j)].abs() > PIVOT_EPS) {
                self.pivot(i, j);
            }
        }
    }

    fn phase_two(&mut self, objective: &DVector<f64>) -> Phase {
        let z = self.objective_row();
        let rhs = self.rhs();
        self.cells.row_mut(z).fill(0.0);
        for (j, value) in objective.iter().enumerate() {
            self.cells[(z, j)] = -value;
        }
        for i in 0..self.basis.len() {
            let b = self.basis[i];
            if b < objective.len() && objective[b] != 0.0 {
                let row = self.cells.row(i) * objective[b];
                let mut target = self.cells.row_mut(z);
                target += row;
            }
        }
        self.iterate(self.structural)
    }

    /// Runs simplex pivots letting only columns below `eligible` enter.
    fn iterate(&mut self, eligible: usize) -> Phase {
        let z = self.objective_row();
        let rhs = self.rhs();
        for _ in 0..MAX_PIVOTS {
            let Some(entering) = (0..eligible).find(|&j| self.cells[(z, j)] < -PIVOT_EPS) else {
                return Phase::Done;
            };

            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..self.basis.len() {
                let coefficient = self.cells[(i, entering)];
                if coefficient <= PIVOT_EPS {
                    continue;
                }
                let ratio = self.cells[(i, rhs)] / coefficient;
                leaving = match leaving {
                    Some((best, best_ratio))
                        if ratio > best_ratio + PIVOT_EPS
                            || ((ratio - best_ratio).abs() <= PIVOT_EPS
                                && self.basis[i] >= self.basis[best]) =>
                    {
                        Some((best, best_ratio))
                    }
                    _ => Some((i, ratio)),
                };
            }

            match leaving {
                Some((row, _)) => self.pivot(row, entering),
                None => return Phase::Unbounded,
            }
        }
        Phase::Stalled
    }

    fn pivot(&mut self, row: usize, column: usize) {
        let scale = self.cells[(row, column)];
        {
            let mut pivot_row = self.cells.row_mut(row);
            pivot_row /= scale;
        }
        let pivot_row = self.cells.row(row).clone_owned();
        for i in 0..self.cells.nrows() {
            if i == row {
                continue;
            }
            let factor = self.cells[(i, column)];
            if factor != 0.0 {
                let mut target = self.cells.row_mut(i);
                target -= &pivot_row * factor;
            }
        }
        self.basis[row] = column;
        // Clean the rhs of tiny negative drift on degenerate rows.
        let rhs = self.rhs();
        for i in 0..self.basis.len() {
            if self.cells[(i, rhs)] < 0.0 && self.cells[(i, rhs)] > -PIVOT_EPS {
                self.cells[(i, rhs)] = 0.0;
            }
        }
    }

    fn primal(&self, n: usize) -> DVector<f64> {
        let rhs = self.rhs();
        let mut x = DVector::zeros(n);
        for (i, &b) in self.basis.iter().enumerate() {
            if b < n {
                x[b] = self.cells[(i, rhs)].max(0.0);
            }
        }
        x
    }
}
