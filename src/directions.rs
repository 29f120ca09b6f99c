//! Search directions swept during one revolution.
//!
//! Two-player games use an angular sweep: `N` unit vectors at angles `2πk/N`,
//! starting at `(1, 0)` and moving counter-clockwise, with `N` a multiple of four so
//! both coordinate axes appear in both signs. One-player games use `{+1, -1}`. With
//! more than two players the sweep generalises to every non-zero vector of
//! `{-1, 0, 1}^n`, normalised and taken in lexicographic order; this set also
//! contains every signed axis.

use std::f64::consts::TAU;

use nalgebra::DVector;

use crate::options::SolverParameters;

/// Ordered set of unit directions used by the engine.
#[derive(Clone, Debug)]
pub struct DirectionSet {
    directions: Vec<DVector<f64>>,
    positive_axes: Vec<usize>,
    negative_axes: Vec<usize>,
}

impl DirectionSet {
    /// Builds the direction set for `num_players` players.
    ///
    /// `resolution` only matters for two players.
    pub fn new(num_players: usize, resolution: usize, parameters: &SolverParameters) -> Self {
        let raw: Vec<DVector<f64>> = match num_players {
            2 => angular_sweep(resolution),
            _ => lattice(num_players),
        };

        let mut directions: Vec<DVector<f64>> = Vec::with_capacity(raw.len());
        for mut direction in raw {
            direction.apply(|value| {
                if value.abs() < parameters.normtol {
                    *value = 0.0;
                }
            });
            let norm = direction.norm();
            if norm < parameters.normtol {
                continue;
            }
            direction /= norm;
            let duplicate = directions
                .iter()
                .any(|kept| 1.0 - kept.dot(&direction) < parameters.directiontol);
            if !duplicate {
                directions.push(direction);
            }
        }

        let mut positive_axes = Vec::with_capacity(num_players);
        let mut negative_axes = Vec::with_capacity(num_players);
        for player in 0..num_players {
            for (sign, axes) in [(1.0, &mut positive_axes), (-1.0, &mut negative_axes)] {
                let index = match find_axis(&directions, player, sign, parameters.normtol) {
                    Some(index) => index,
                    None => {
                        directions.push(axis(num_players, player, sign));
                        directions.len() - 1
                    }
                };
                axes.push(index);
            }
        }

        Self {
            directions,
            positive_axes,
            negative_axes,
        }
    }

    /// Number of directions in one revolution.
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Whether the set is empty; never true for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// Direction at position `index` of the sweep.
    pub fn get(&self, index: usize) -> &DVector<f64> {
        &self.directions[index]
    }

    /// Iterates over the sweep in order.
    pub fn iter(&self) -> impl Iterator<Item = &DVector<f64>> {
        self.directions.iter()
    }

    /// Index of `+e_player` (`positive`) or `-e_player`.
    pub fn axis(&self, player: usize, positive: bool) -> usize {
        if positive {
            self.positive_axes[player]
        } else {
            self.negative_axes[player]
        }
    }
}

fn angular_sweep(resolution: usize) -> Vec<DVector<f64>> {
    let count = resolution.max(4).div_ceil(4) * 4;
    (0..count)
        .map(|k| {
            let angle = TAU * k as f64 / count as f64;
            DVector::from_vec(vec![angle.cos(), angle.sin()])
        })
        .collect()
}

fn lattice(num_players: usize) -> Vec<DVector<f64>> {
    let total = 3usize.pow(num_players as u32);
    (0..total)
        .map(|mut code| {
            let mut direction = DVector::zeros(num_players);
            for player in (0..num_players).rev() {
                direction[player] = (code % 3) as f64 - 1.0;
                code /= 3;
            }
            direction
        })
        .filter(|direction| direction.iter().any(|value| *value != 0.0))
        .collect()
}

fn find_axis(
    directions: &[DVector<f64>],
    player: usize,
    sign: f64,
    tolerance: f64,
) -> Option<usize> {
    directions
        .iter()
        .position(|d| (d[player] - sign).abs() < tolerance)
}

fn axis(num_players: usize, player: usize, sign: f64) -> DVector<f64> {
    let mut direction = DVector::zeros(num_players);
    direction[player] = sign;
    direction
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn two_player_sweep_contains_signed_axes() {
        let set = DirectionSet::new(2, 30, &SolverParameters::default());
        assert_eq!(set.len(), 32);
        assert_eq!(set.get(set.axis(0, true)), &DVector::from_vec(vec![1.0, 0.0]));
        assert_eq!(set.get(set.axis(1, true)), &DVector::from_vec(vec![0.0, 1.0]));
        assert_eq!(set.get(set.axis(0, false)), &DVector::from_vec(vec![-1.0, 0.0]));
        assert_eq!(set.get(set.axis(1, false)), &DVector::from_vec(vec![0.0, -1.0]));
        assert_eq!(set.axis(0, true), 0);
        for direction in set.iter() {
            assert_relative_eq!(direction.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn sweep_moves_counter_clockwise() {
        let set = DirectionSet::new(2, 8, &SolverParameters::default());
        let angles: Vec<f64> = set.iter().map(|d| d[1].atan2(d[0])).collect();
        assert_relative_eq!(angles[1], std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
        assert_relative_eq!(angles[2], std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn one_player_has_two_directions() {
        let set = DirectionSet::new(1, 32, &SolverParameters::default());
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(set.axis(0, true))[0], 1.0);
        assert_eq!(set.get(set.axis(0, false))[0], -1.0);
    }

    #[test]
    fn lattice_generalises_to_three_players() {
        let set = DirectionSet::new(3, 32, &SolverParameters::default());
        assert_eq!(set.len(), 26);
        for player in 0..3 {
            for positive in [true, false] {
                let direction = set.get(set.axis(player, positive));
                let sign = if positive { 1.0 } else { -1.0 };
                assert_eq!(direction[player], sign);
                assert_relative_eq!(direction.norm(), 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn coarse_tolerance_drops_near_duplicates() {
        let parameters = SolverParameters {
            directiontol: 0.1,
            ..SolverParameters::default()
        };
        // Neighbours on a 64-point sweep are about 0.0048 apart in 1 - cos.
        let set = DirectionSet::new(2, 64, &parameters);
        assert!(set.len() < 64);
        for player in 0..2 {
            assert_eq!(set.get(set.axis(player, true))[player], 1.0);
            assert_eq!(set.get(set.axis(player, false))[player], -1.0);
        }
    }
}
