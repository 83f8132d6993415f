//! Integration tests for grid reductions on the CPU backend.

use std::sync::Arc;

use gridreduce::prelude::*;

fn sum_grid(teams: u32, threads: u32, records: u32) -> GridReduce {
    GridReduce::builder()
        .teams(teams)
        .threads_per_team(threads)
        .num_of_records(records)
        .spin_limit(Some(1 << 24))
        .max_resident_teams(4)
        .build()
        .expect("Failed to build grid")
}

/// Five single-thread teams contributing 1 through a two-slot buffer.
#[test]
fn test_five_teams_two_records() {
    let grid = sum_grid(5, 1, 2);
    let outcome = grid
        .reduce_scalar(ReductionOp::Sum, |_, _| 1i64)
        .expect("Failed to reduce");

    assert_eq!(outcome.holders.len(), 1);
    assert_eq!(outcome.holder().unwrap().thread_id, 0);
    assert_eq!(*outcome.value().unwrap(), 5);
    assert!(outcome.stats.max_in_flight <= 2);
    assert_eq!(outcome.stats.admitted, 5);
    assert_eq!(outcome.stats.finalized, 1);
}

/// A lone team is admitted immediately and finalizes its own value.
#[test]
fn test_single_team_no_spinning() {
    let grid = sum_grid(1, 1, 4);
    let outcome = grid
        .reduce_scalar(ReductionOp::Sum, |_, _| 7u32)
        .expect("Failed to reduce");

    assert_eq!(*outcome.value().unwrap(), 7);
    assert_eq!(outcome.stats.spin_iterations, 0);
    assert_eq!(outcome.stats.rollovers, 0);
}

/// Reusing the reduction state: the finalizer leaves the counters zeroed.
#[test]
fn test_back_to_back_reductions_reuse_state() {
    let grid = sum_grid(9, 32, 2);
    let ops = ScalarReduction::<u64>::new(ReductionOp::Sum).unwrap();
    let buffer = ops.staging_buffer(2);
    let reduction = grid.prepare(ops, buffer).expect("Failed to prepare");

    let first = grid
        .grid()
        .launch(&reduction, |team, _| u64::from(team))
        .expect("First launch failed");
    assert_eq!(*first.value().unwrap(), 36 * 32);
    assert_eq!(reduction.counters(), CounterSnapshot::default());

    let second = grid
        .grid()
        .launch(&reduction, |_, thread| u64::from(thread))
        .expect("Second launch failed");
    assert_eq!(*second.value().unwrap(), 9 * (31 * 32 / 2));
    assert_eq!(reduction.counters(), CounterSnapshot::default());
    assert_eq!(second.stats.finalized, 2);
    assert_eq!(second.stats.resets, 2);
}

/// An identical second reduction on the same state yields the identical
/// value, with the counters zeroed after each run.
#[test]
fn test_identical_relaunch_same_value() {
    let grid = sum_grid(5, 1, 2);
    let ops = ScalarReduction::<i64>::new(ReductionOp::Sum).unwrap();
    let buffer = ops.staging_buffer(2);
    let reduction = grid.prepare(ops, buffer).expect("Failed to prepare");
    let init = |team: u32, _thread: u32| i64::from(team) * 10 + 1;

    let first = grid
        .grid()
        .launch(&reduction, init)
        .expect("First launch failed");
    assert_eq!(reduction.counters(), CounterSnapshot::default());

    let second = grid
        .grid()
        .launch(&reduction, init)
        .expect("Second launch failed");
    assert_eq!(reduction.counters(), CounterSnapshot::default());

    assert_eq!(*first.value().unwrap(), 105);
    assert_eq!(first.value().unwrap(), second.value().unwrap());
    assert_eq!(first.holders.len(), 1);
    assert_eq!(second.holders.len(), 1);
}

/// Never more than R teams hold a slot at once, with far more teams than
/// slots and workers.
#[test]
fn test_admission_bounded_by_records() {
    let grid = GridReduce::builder()
        .teams(200)
        .threads_per_team(8)
        .warp_size(8)
        .num_of_records(3)
        .max_resident_teams(8)
        .spin_limit(Some(1 << 26))
        .build()
        .unwrap();

    let outcome = grid
        .reduce_scalar(ReductionOp::Sum, |_, _| 1u64)
        .expect("Failed to reduce");
    assert_eq!(*outcome.value().unwrap(), 1600);
    assert!(outcome.stats.max_in_flight <= 3);
    assert_eq!(outcome.stats.in_flight, 0);
    assert_eq!(outcome.stats.slot_copies, 3);
    assert_eq!(outcome.stats.slot_merges, 197);
}

/// Exactly one thread in the whole grid reports the result, whatever the
/// ratio of teams to buffer slots.
#[test]
fn test_exactly_one_holder() {
    for (teams, records) in [(1, 1), (4, 2), (5, 2), (7, 7), (3, 8), (33, 4)] {
        let grid = sum_grid(teams, 40, records);
        let outcome = grid
            .reduce_scalar(ReductionOp::Max, |team, thread| i64::from(team * 1000 + thread))
            .expect("Failed to reduce");
        assert_eq!(outcome.holders.len(), 1, "teams={} records={}", teams, records);
        assert_eq!(*outcome.value().unwrap(), i64::from((teams - 1) * 1000 + 39));
    }
}

/// Generic mode: the sequential main thread drives the teams stage.
#[test]
fn test_generic_mode() {
    let grid = GridReduce::builder()
        .teams(6)
        .threads_per_team(1)
        .num_of_records(4)
        .mode(ExecutionMode::Generic)
        .max_resident_teams(2)
        .spin_limit(Some(1 << 24))
        .build()
        .unwrap();

    let outcome = grid
        .reduce_scalar(ReductionOp::Product, |team, _| i64::from(team) + 1)
        .unwrap();
    assert_eq!(*outcome.value().unwrap(), 720);
}

/// A single worker pulling teams in descending order can never open the
/// admission gate; the spin limit turns the livelock into an error.
#[test]
fn test_livelock_diagnostic() {
    let grid = GridReduce::builder()
        .teams(4)
        .threads_per_team(1)
        .num_of_records(2)
        .max_resident_teams(1)
        .dispatch(DispatchOrder::Reversed)
        .spin_limit(Some(512))
        .build()
        .unwrap();

    let err = grid
        .reduce_scalar(ReductionOp::Sum, |_, _| 1i32)
        .unwrap_err();
    match err {
        ReductionError::SpinLimitExceeded { team_id, bound, spins } => {
            assert_eq!(team_id, 3);
            assert_eq!(bound, 0);
            assert_eq!(spins, 512);
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Reversed dispatch is fine when every team is resident at once.
#[test]
fn test_reversed_dispatch_all_resident() {
    let grid = GridReduce::builder()
        .teams(4)
        .threads_per_team(1)
        .num_of_records(2)
        .max_resident_teams(4)
        .dispatch(DispatchOrder::Reversed)
        .spin_limit(Some(1 << 26))
        .build()
        .unwrap();

    let value = grid.reduce_slice(ReductionOp::Sum, &[1i32, 2, 3, 4]).unwrap();
    assert_eq!(value, 10);
}

#[test]
fn test_rejects_too_many_warps() {
    let err = GridReduce::builder()
        .teams(2)
        .threads_per_team(80)
        .warp_size(8)
        .build()
        .unwrap_err();
    assert!(matches!(err, ReductionError::InvalidTopology(_)));
}

#[tokio::test]
async fn test_async_reduction() {
    let grid = sum_grid(16, 64, 4);
    let ops = ScalarReduction::<f64>::new(ReductionOp::Sum).unwrap();
    let buffer = ops.staging_buffer(4);

    let outcome = grid
        .reduce_with_async(ops, buffer, |_, _| 0.5)
        .await
        .expect("Failed to reduce");
    assert_eq!(*outcome.value().unwrap(), 512.0);
}

#[tokio::test]
async fn test_concurrent_grids_have_independent_state() {
    let grid = Arc::new(sum_grid(10, 32, 2));

    let mut handles = Vec::new();
    for k in 1..=4u64 {
        let grid = Arc::clone(&grid);
        handles.push(tokio::spawn(async move {
            let ops = ScalarReduction::<u64>::new(ReductionOp::Sum).unwrap();
            let buffer = ops.staging_buffer(2);
            grid.reduce_with_async(ops, buffer, move |_, _| k).await
        }));
    }

    for (k, handle) in (1..=4u64).zip(handles) {
        let outcome = handle.await.expect("task panicked").expect("Failed to reduce");
        assert_eq!(*outcome.value().unwrap(), k * 320);
    }
}
