//! Warp-level lane reducers.
//!
//! A warp's register file is modelled as a slice with one record per lane.
//! All lanes of a warp execute each shuffle round in lock-step: every lane
//! reads the pre-round value of its source lane, then combines. A source
//! lane outside the warp yields the reading lane's own value, as a hardware
//! shuffle-down does.

use crate::ops::ReduceOps;
use crate::types::AlgoVersion;

/// One shuffle-down round over a warp.
///
/// Lane `i` receives the record of lane `i + offset` and hands it to the
/// shuffle-combine operation together with its lane id.
pub fn shuffle_down_combine<O: ReduceOps>(
    lanes: &mut [O::Record],
    offset: u32,
    version: AlgoVersion,
    ops: &O,
) {
    let registers = lanes.to_vec();
    for (lane, local) in lanes.iter_mut().enumerate() {
        let src = lane + offset as usize;
        let remote = registers.get(src).unwrap_or(&registers[lane]);
        ops.shuffle_combine(local, remote, lane as u32, offset, version);
    }
}

/// Fold a full warp into lane 0.
///
/// The exchange distance halves from `warp_size / 2` down to 1. Every lane
/// must hold a participating record; a single participant never calls this.
pub fn regular_warp_reduce<O: ReduceOps>(lanes: &mut [O::Record], warp_size: u32, ops: &O) {
    debug_assert_eq!(
        lanes.len(),
        warp_size as usize,
        "regular warp reduce needs a full warp"
    );

    let mut offset = warp_size / 2;
    while offset > 0 {
        shuffle_down_combine(lanes, offset, AlgoVersion::Regular, ops);
        offset /= 2;
    }
}

/// Fold the first `size` lanes of a warp into lane 0.
///
/// Each round exchanges at `size / 2` and then rounds the remaining count
/// up, so odd counts never drop a value. Lanes at or above `size` may hold
/// anything; their values never reach the live range.
pub fn irregular_warp_reduce<O: ReduceOps>(lanes: &mut [O::Record], size: u32, ops: &O) {
    debug_assert!(size > 0, "irregular warp reduce needs at least one participant");
    debug_assert!(
        size as usize <= lanes.len(),
        "{} participants do not fit in {} lanes",
        size,
        lanes.len()
    );

    let mut curr_size = size;
    let mut offset = curr_size / 2;
    while offset > 0 {
        shuffle_down_combine(lanes, offset, AlgoVersion::Irregular, ops);
        curr_size = curr_size.div_ceil(2);
        offset = curr_size / 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{ReductionOp, ScalarReduction};
    use proptest::prelude::*;

    fn sum_ops() -> ScalarReduction<i64> {
        ScalarReduction::new(ReductionOp::Sum).unwrap()
    }

    /// Records the multiset of values folded into each lane.
    struct Trace;

    impl ReduceOps for Trace {
        type Record = Vec<u32>;

        fn combine(&self, acc: &mut Vec<u32>, other: &Vec<u32>) {
            acc.extend_from_slice(other);
        }
    }

    #[test]
    fn test_regular_full_warp() {
        let ops = sum_ops();
        let mut lanes: Vec<i64> = (1..=32).collect();
        regular_warp_reduce(&mut lanes, 32, &ops);
        assert_eq!(lanes[0], 528);
    }

    #[test]
    fn test_regular_small_warp() {
        let ops = sum_ops();
        let mut lanes = vec![5i64, 6, 7, 8];
        regular_warp_reduce(&mut lanes, 4, &ops);
        assert_eq!(lanes[0], 26);
    }

    #[test]
    fn test_shuffle_out_of_range_reads_own_value() {
        let ops = sum_ops();
        let mut lanes = vec![1i64, 2, 3, 4];
        shuffle_down_combine(&mut lanes, 2, AlgoVersion::Regular, &ops);
        assert_eq!(lanes, vec![4, 6, 6, 8]);
    }

    #[test]
    fn test_irregular_odd_sizes() {
        let ops = sum_ops();
        for size in 1..=32u32 {
            let mut lanes: Vec<i64> = (1..=32).collect();
            irregular_warp_reduce(&mut lanes, size, &ops);
            let expected: i64 = (1..=size as i64).sum();
            assert_eq!(lanes[0], expected, "size {}", size);
        }
    }

    #[test]
    fn test_irregular_folds_each_value_once() {
        for size in 1..=16u32 {
            let mut lanes: Vec<Vec<u32>> = (0..16).map(|i| vec![i]).collect();
            irregular_warp_reduce(&mut lanes, size, &Trace);
            let mut seen = lanes[0].clone();
            seen.sort_unstable();
            assert_eq!(seen, (0..size).collect::<Vec<_>>(), "size {}", size);
        }
    }

    #[test]
    fn test_regular_folds_each_value_once() {
        let mut lanes: Vec<Vec<u32>> = (0..8).map(|i| vec![i]).collect();
        regular_warp_reduce(&mut lanes, 8, &Trace);
        let mut seen = lanes[0].clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn prop_irregular_matches_fold(values in prop::collection::vec(-1000i64..1000, 1..=32)) {
            let ops = sum_ops();
            let size = values.len() as u32;
            let mut lanes = values.clone();
            lanes.resize(32, 0);
            irregular_warp_reduce(&mut lanes, size, &ops);
            prop_assert_eq!(lanes[0], values.iter().sum::<i64>());
        }

        #[test]
        fn prop_regular_max_matches_fold(values in prop::collection::vec(any::<i32>(), 16)) {
            let ops = ScalarReduction::<i32>::new(ReductionOp::Max).unwrap();
            let mut lanes = values.clone();
            regular_warp_reduce(&mut lanes, 16, &ops);
            prop_assert_eq!(lanes[0], *values.iter().max().unwrap());
        }
    }
}
