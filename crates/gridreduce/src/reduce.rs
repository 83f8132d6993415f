//! Slice reductions over the grid.
//!
//! Each thread folds the elements at its global index and every grid-stride
//! step after it, starting from the operator identity, then the grid
//! reduction combines the per-thread partials.

use gridreduce_core::error::Result;
use gridreduce_core::scalar::{ReductionOp, ReductionScalar};

use crate::GridReduce;

/// Fold `data[index], data[index + stride], ...` after `transform`.
#[inline]
fn grid_stride_partial<T, U, F>(op: ReductionOp, data: &[U], index: usize, stride: usize, transform: &F) -> T
where
    T: ReductionScalar,
    F: Fn(&U) -> T,
{
    data.iter()
        .skip(index)
        .step_by(stride)
        .fold(T::identity(op), |acc, x| T::apply(op, acc, transform(x)))
}

impl GridReduce {
    /// Reduce a slice with a built-in operator. An empty slice yields the
    /// operator identity.
    pub fn reduce_slice<T: ReductionScalar>(&self, op: ReductionOp, data: &[T]) -> Result<T> {
        self.transform_reduce(op, data, |x| *x)
    }

    /// Map every element through `transform`, then reduce with `op`.
    pub fn transform_reduce<T, U, F>(&self, op: ReductionOp, data: &[U], transform: F) -> Result<T>
    where
        T: ReductionScalar,
        U: Sync,
        F: Fn(&U) -> T + Sync,
    {
        let threads = self.launch_config().threads_per_team as usize;
        let stride = self.total_threads() as usize;

        let outcome = self.reduce_scalar(op, |team, thread| {
            let index = team as usize * threads + thread as usize;
            grid_stride_partial(op, data, index, stride, &transform)
        })?;
        outcome.into_value()
    }
}
