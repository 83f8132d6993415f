//! Property tests: grid reductions agree with a sequential fold.

use gridreduce::prelude::*;
use proptest::prelude::*;

fn shape() -> impl Strategy<Value = (u32, u32, u32, u32, usize)> {
    // (teams, warp_size, threads, records, workers) with threads <= warp_size^2
    (1u32..40, prop::sample::select(vec![4u32, 8, 32]), 1u32..16, 1usize..6).prop_flat_map(
        |(teams, warp_size, records, workers)| {
            (
                Just(teams),
                Just(warp_size),
                1u32..=(warp_size * warp_size).min(96),
                Just(records),
                Just(workers),
            )
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn grid_sum_matches_fold(
        (teams, warp_size, threads, records, workers) in shape(),
        seed in any::<u64>(),
    ) {
        let grid = GridReduce::builder()
            .teams(teams)
            .threads_per_team(threads)
            .warp_size(warp_size)
            .num_of_records(records)
            .max_resident_teams(workers)
            .spin_limit(Some(1 << 26))
            .build()
            .unwrap();

        let value = |team: u32, thread: u32| {
            ((u64::from(team) << 16) | u64::from(thread)).wrapping_mul(seed | 1)
        };
        let expected = fold(
            ReductionOp::Sum,
            (0..teams).flat_map(|t| (0..threads).map(move |h| value(t, h))),
        );

        let outcome = grid.reduce_scalar(ReductionOp::Sum, value).unwrap();
        prop_assert_eq!(outcome.holders.len(), 1);
        prop_assert_eq!(*outcome.value().unwrap(), expected);
        prop_assert!(outcome.stats.max_in_flight <= u64::from(records));
    }

    #[test]
    fn reduce_slice_matches_iterator(
        data in prop::collection::vec(any::<i32>(), 0..600),
        teams in 1u32..10,
        threads in 1u32..70,
    ) {
        let grid = GridReduce::builder()
            .teams(teams)
            .threads_per_team(threads)
            .num_of_records(3)
            .max_resident_teams(3)
            .spin_limit(Some(1 << 26))
            .build()
            .unwrap();

        let min = data.iter().copied().min().unwrap_or(i32::MAX);
        let xor = data.iter().fold(0, |acc, x| acc ^ x);
        prop_assert_eq!(grid.reduce_slice(ReductionOp::Min, &data).unwrap(), min);
        prop_assert_eq!(grid.reduce_slice(ReductionOp::Xor, &data).unwrap(), xor);
    }
}
