use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use sgsolve::error::{Axis, Table};
use sgsolve::games::{prisoners_dilemma, random, risk_sharing, RandomGameConfig};
use sgsolve::lp::{LinearProgram, LpStatus};
use sgsolve::report::{solve_request, SolveRequest};
use sgsolve::{
    solve, Engine, EngineOptions, GameBuilder, GameDescription, GameError, Retrieval, StateSpec,
};

fn absorbing_game(delta: f64) -> GameDescription {
    GameBuilder::new(delta)
        .state(StateSpec::new(
            vec![2, 1],
            DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 0.0]),
            DMatrix::from_row_slice(2, 1, &[1.0, 1.0]),
        ))
        .build()
        .unwrap()
}

/// Whether `point` is a convex combination of `vertices` up to `slack` per coordinate.
fn in_hull(vertices: &[DVector<f64>], point: &DVector<f64>, slack: f64) -> bool {
    let mut program = LinearProgram::new(DVector::zeros(vertices.len()));
    program.equal(vec![1.0; vertices.len()], 1.0);
    for coordinate in 0..point.len() {
        let row: Vec<f64> = vertices.iter().map(|v| v[coordinate]).collect();
        program.less_equal(row.clone(), point[coordinate] + slack);
        program.greater_equal(row, point[coordinate] - slack);
    }
    matches!(program.solve(slack), LpStatus::Optimal { .. })
}

fn assert_points_in_stage_hull(game: &GameDescription, points: &[DMatrix<f64>]) {
    let vertices = game.stage_payoffs();
    for table in points {
        for row in table.row_iter() {
            let point = row.transpose();
            assert!(
                in_hull(&vertices, &point, 1e-7),
                "{point:?} outside the stage payoff hull"
            );
        }
    }
}

/// One state, two joint actions with payoffs (1,1) and (0,0), absorbing, delta 0.5.
#[test]
fn absorbing_two_action_game_reports_points_in_unit_box() {
    let game = absorbing_game(0.5);
    for retrieval in [Retrieval::FinalRevolution, Retrieval::AllIterations] {
        let options = EngineOptions::default().with_retrieval(retrieval);
        let solution = solve(&game, options).unwrap().into_result().unwrap();

        let points = solution.final_points();
        assert_eq!(points.len(), 1);
        assert!(points[0].nrows() > 0);
        assert!(points[0]
            .iter()
            .all(|value| (-1e-9..=1.0 + 1e-9).contains(value)));

        match retrieval {
            Retrieval::FinalRevolution => assert!(solution.history().is_none()),
            Retrieval::AllIterations => {
                let history = solution.history().unwrap();
                assert!(!history.points[0].is_empty());
                assert_eq!(history.points[0].nrows(), history.revolutions.len());
                assert_eq!(
                    history.revolutions.last().copied(),
                    Some(solution.last_revolution())
                );
                assert!(history.points[0]
                    .iter()
                    .all(|value| (-1e-9..=1.0 + 1e-9).contains(value)));
            }
        }
    }
}

#[test]
fn wrong_payoff_rows_in_second_state_are_rejected_before_solving() {
    let result = GameDescription::new(
        0.5,
        vec![vec![1, 1], vec![2, 1]],
        vec![DMatrix::zeros(1, 2), DMatrix::zeros(1, 2)],
        vec![
            DMatrix::from_row_slice(1, 2, &[0.5, 0.5]),
            DMatrix::from_row_slice(2, 2, &[0.5, 0.5, 0.0, 1.0]),
        ],
        &[],
    );
    let error = result.unwrap_err();
    assert_eq!(
        error,
        GameError::table_shape(1, Table::Payoffs, Axis::Rows, 2, 1)
    );
    assert_eq!(error.state(), Some(1));
}

#[test]
fn transition_rows_outside_slack_are_rejected() {
    let state = StateSpec::new(
        vec![1, 1],
        DMatrix::zeros(1, 2),
        DMatrix::from_row_slice(1, 1, &[1.0 + 1e-6]),
    );
    let result = GameBuilder::new(0.5).state(state).build();
    assert!(matches!(result, Err(GameError::NonStochasticRow { .. })));
}

#[test]
fn repeated_solves_agree() {
    let config = RandomGameConfig {
        delta: 0.6,
        ..RandomGameConfig::default()
    };
    let game = random(&config, 2024).unwrap();
    let options = EngineOptions::default();

    let first = solve(&game, options.clone()).unwrap();
    let second = solve(&game, options).unwrap();
    assert_eq!(first.is_converged(), second.is_converged());
    assert_eq!(first.log(), second.log());

    if let (Some(a), Some(b)) = (first.solution(), second.solution()) {
        assert_eq!(a.revolutions(), b.revolutions());
        for state in 0..game.num_states() {
            let (pa, pb) = (a.extreme_points(state), b.extreme_points(state));
            assert_eq!(pa.len(), pb.len());
            for (x, y) in pa.iter().zip(&pb) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }
}

/// The projection of every pivot on its direction never grows across revolutions.
#[test]
fn supporting_levels_do_not_regress() {
    let game = prisoners_dilemma(0.7).unwrap();
    let options = EngineOptions::default().with_retrieval(Retrieval::AllIterations);
    let mut engine = Engine::new(&game, options).unwrap();
    let per_revolution = engine.directions().len();
    let solution = engine.solve().into_result().unwrap();

    let mut best = vec![f64::INFINITY; per_revolution];
    for iteration in solution.log().iterations() {
        let slot = iteration.iteration % per_revolution;
        let value = iteration.direction.dot(&iteration.pivot[0]);
        assert!(value <= best[slot] + 1e-7, "level rose at {slot}");
        best[slot] = value;
    }
    assert!(solution.revolutions() > 1);
}

#[test]
fn prisoners_dilemma_history_stays_in_stage_hull() {
    for delta in [0.6, 0.9] {
        let game = prisoners_dilemma(delta).unwrap();
        let options = EngineOptions::default().with_retrieval(Retrieval::AllIterations);
        let solution = solve(&game, options).unwrap().into_result().unwrap();
        assert_points_in_stage_hull(&game, &solution.final_points());
        assert_points_in_stage_hull(&game, &solution.history().unwrap().points);
    }
}

#[test]
fn random_game_points_stay_in_stage_hull() {
    for seed in 0..4 {
        let game = random(&RandomGameConfig::default(), seed).unwrap();
        if let Some(solution) = solve(&game, EngineOptions::default()).unwrap().solution() {
            assert_points_in_stage_hull(&game, &solution.final_points());
        }
    }
}

#[test]
fn risk_sharing_contains_autarky() {
    let endowments = [0.25, 0.75];
    let delta = 0.6;
    let game = risk_sharing(delta, &endowments, 3).unwrap();
    let solution = solve(&game, EngineOptions::default())
        .unwrap()
        .into_result()
        .unwrap();

    let mean: Vec<f64> = (0..2)
        .map(|player| {
            endowments
                .iter()
                .map(|e| (if player == 0 { *e } else { 1.0 - e }).sqrt())
                .sum::<f64>()
                / 2.0
        })
        .collect();
    for (state, e) in endowments.iter().enumerate() {
        let stage = [e.sqrt(), (1.0 - e).sqrt()];
        let autarky = DVector::from_fn(2, |player, _| {
            (1.0 - delta) * stage[player] + delta * mean[player]
        });
        assert!(solution.contains(state, &autarky));
        assert!(!solution.extreme_points(state).is_empty());
    }
}

#[test]
fn three_players_with_dominant_actions_converge_to_stage_nash() {
    let payoffs = DMatrix::from_fn(8, 3, |action, player| {
        if (action >> player) & 1 == 0 {
            1.0
        } else {
            0.0
        }
    });
    let game = GameBuilder::new(0.5)
        .state(StateSpec::new(
            vec![2, 2, 2],
            payoffs,
            DMatrix::from_element(8, 1, 1.0),
        ))
        .build()
        .unwrap();
    let mut engine = Engine::new(&game, EngineOptions::default()).unwrap();
    assert_eq!(engine.directions().len(), 26);
    let solution = engine.solve().into_result().unwrap();

    for point in solution.extreme_points(0) {
        for player in 0..3 {
            assert_relative_eq!(point[player], 1.0, epsilon = 1e-6);
        }
    }
}

#[test]
fn history_limit_keeps_recent_revolutions() {
    let game = prisoners_dilemma(0.6).unwrap();
    let options = EngineOptions::default()
        .with_retrieval(Retrieval::AllIterations)
        .with_history_limit(2);
    let solution = solve(&game, options).unwrap().into_result().unwrap();
    let history = solution.history().unwrap();

    let last = solution.last_revolution();
    assert!(history
        .revolutions
        .iter()
        .all(|&revolution| revolution + 2 > last));
    assert!(solution.log().evicted() > 0);
    assert_eq!(solution.final_points()[0].nrows(), 32);
}

#[test]
fn report_round_trips_through_json() {
    let state = StateSpec::new(
        vec![2, 1],
        DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 0.0]),
        DMatrix::from_row_slice(2, 1, &[1.0, 1.0]),
    );
    let request = SolveRequest {
        all_iterations: true,
        ..SolveRequest::new(0.5, vec![state])
    };
    let encoded = serde_json::to_string(&request).unwrap();
    let decoded: SolveRequest = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, request);

    let report = solve_request(&decoded).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["solved"], true);
    assert!(json.get("ipoints").is_some());
    assert!(json.get("msg").is_none());
}
