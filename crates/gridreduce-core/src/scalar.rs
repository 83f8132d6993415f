//! Built-in scalar reductions (sum, product, min, max, bitwise).

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::buffer::StagingBuffer;
use crate::error::{ReductionError, Result};
use crate::ops::{BufferOps, ReduceOps};

/// Reduction operation for primitive scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionOp {
    /// Sum: `a + b`
    #[default]
    Sum,
    /// Product: `a * b`
    Product,
    /// Minimum: `min(a, b)`
    Min,
    /// Maximum: `max(a, b)`
    Max,
    /// Bitwise AND: `a & b`
    And,
    /// Bitwise OR: `a | b`
    Or,
    /// Bitwise XOR: `a ^ b`
    Xor,
}

impl ReductionOp {
    /// All operations.
    pub const ALL: [ReductionOp; 7] = [
        ReductionOp::Sum,
        ReductionOp::Product,
        ReductionOp::Min,
        ReductionOp::Max,
        ReductionOp::And,
        ReductionOp::Or,
        ReductionOp::Xor,
    ];

    /// Parse an operation name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sum" | "add" | "+" => Ok(Self::Sum),
            "product" | "mul" | "*" => Ok(Self::Product),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "and" | "&" => Ok(Self::And),
            "or" | "|" => Ok(Self::Or),
            "xor" | "^" => Ok(Self::Xor),
            other => Err(ReductionError::InvalidConfig(format!(
                "Unknown reduction '{}'. Valid options: sum, product, min, max, and, or, xor",
                other
            ))),
        }
    }

    /// True for the bitwise operations.
    pub fn is_bitwise(&self) -> bool {
        matches!(self, ReductionOp::And | ReductionOp::Or | ReductionOp::Xor)
    }
}

impl fmt::Display for ReductionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionOp::Sum => write!(f, "sum"),
            ReductionOp::Product => write!(f, "product"),
            ReductionOp::Min => write!(f, "min"),
            ReductionOp::Max => write!(f, "max"),
            ReductionOp::And => write!(f, "and"),
            ReductionOp::Or => write!(f, "or"),
            ReductionOp::Xor => write!(f, "xor"),
        }
    }
}

/// Primitive types usable with [`ReductionOp`].
pub trait ReductionScalar: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    /// Neutral element of `op`.
    fn identity(op: ReductionOp) -> Self;

    /// Apply `op` to two values.
    fn apply(op: ReductionOp, a: Self, b: Self) -> Self;

    /// Whether `op` is defined for this type.
    fn supports(op: ReductionOp) -> bool;
}

macro_rules! impl_int_scalar {
    ($($t:ty),*) => {
        $(
            impl ReductionScalar for $t {
                #[inline]
                fn identity(op: ReductionOp) -> Self {
                    match op {
                        ReductionOp::Sum | ReductionOp::Or | ReductionOp::Xor => 0,
                        ReductionOp::Product => 1,
                        ReductionOp::Min => <$t>::MAX,
                        ReductionOp::Max => <$t>::MIN,
                        ReductionOp::And => !0,
                    }
                }

                #[inline]
                fn apply(op: ReductionOp, a: Self, b: Self) -> Self {
                    match op {
                        ReductionOp::Sum => a.wrapping_add(b),
                        ReductionOp::Product => a.wrapping_mul(b),
                        ReductionOp::Min => a.min(b),
                        ReductionOp::Max => a.max(b),
                        ReductionOp::And => a & b,
                        ReductionOp::Or => a | b,
                        ReductionOp::Xor => a ^ b,
                    }
                }

                #[inline]
                fn supports(_op: ReductionOp) -> bool {
                    true
                }
            }
        )*
    };
}

macro_rules! impl_float_scalar {
    ($($t:ty),*) => {
        $(
            impl ReductionScalar for $t {
                #[inline]
                fn identity(op: ReductionOp) -> Self {
                    match op {
                        ReductionOp::Product => 1.0,
                        ReductionOp::Min => <$t>::INFINITY,
                        ReductionOp::Max => <$t>::NEG_INFINITY,
                        _ => 0.0,
                    }
                }

                #[inline]
                fn apply(op: ReductionOp, a: Self, b: Self) -> Self {
                    match op {
                        ReductionOp::Sum => a + b,
                        ReductionOp::Product => a * b,
                        ReductionOp::Min => a.min(b),
                        ReductionOp::Max => a.max(b),
                        // Rejected by `supports`; keep the left operand.
                        ReductionOp::And | ReductionOp::Or | ReductionOp::Xor => a,
                    }
                }

                #[inline]
                fn supports(op: ReductionOp) -> bool {
                    !op.is_bitwise()
                }
            }
        )*
    };
}

impl_int_scalar!(i32, i64, u32, u64);
impl_float_scalar!(f32, f64);

/// Sequential fold of `values` under `op`, starting from the identity.
pub fn fold<T: ReductionScalar>(op: ReductionOp, values: impl IntoIterator<Item = T>) -> T {
    values
        .into_iter()
        .fold(T::identity(op), |acc, v| T::apply(op, acc, v))
}

/// Engine operations for a single scalar variable.
#[derive(Debug, Clone, Copy)]
pub struct ScalarReduction<T> {
    op: ReductionOp,
    _marker: PhantomData<T>,
}

impl<T: ReductionScalar> ScalarReduction<T> {
    /// Create operations for `op`.
    pub fn new(op: ReductionOp) -> Result<Self> {
        if !T::supports(op) {
            return Err(ReductionError::InvalidConfig(format!(
                "reduction '{}' is not defined for {}",
                op,
                std::any::type_name::<T>()
            )));
        }
        Ok(Self {
            op,
            _marker: PhantomData,
        })
    }

    /// Reduction operation.
    pub fn op(&self) -> ReductionOp {
        self.op
    }

    /// Neutral element.
    pub fn identity(&self) -> T {
        T::identity(self.op)
    }

    /// Staging buffer sized for `num_of_records`, filled with the identity.
    pub fn staging_buffer(&self, num_of_records: usize) -> StagingBuffer<T> {
        StagingBuffer::new(num_of_records, self.identity())
    }
}

impl<T: ReductionScalar> ReduceOps for ScalarReduction<T> {
    type Record = T;

    #[inline]
    fn combine(&self, acc: &mut T, other: &T) {
        *acc = T::apply(self.op, *acc, *other);
    }
}

impl<T: ReductionScalar> BufferOps for ScalarReduction<T> {
    type Buffer = StagingBuffer<T>;

    fn list_copy(&self, buffer: &StagingBuffer<T>, slot: usize, record: &T) {
        buffer.store(slot, record);
    }

    fn list_reduce(&self, buffer: &StagingBuffer<T>, slot: usize, record: &T) {
        buffer.update(slot, |v| *v = T::apply(self.op, *v, *record));
    }

    fn global_copy(&self, buffer: &StagingBuffer<T>, slot: usize, record: &mut T) {
        buffer.load_into(slot, record);
    }

    fn global_reduce(&self, buffer: &StagingBuffer<T>, slot: usize, record: &mut T) {
        let value = buffer.load(slot);
        *record = T::apply(self.op, *record, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for op in ReductionOp::ALL {
            assert_eq!(ReductionOp::parse(&op.to_string()).unwrap(), op);
        }
        assert_eq!(ReductionOp::parse("+").unwrap(), ReductionOp::Sum);
        assert!(ReductionOp::parse("mean").is_err());
    }

    #[test]
    fn test_identities_are_neutral() {
        for op in ReductionOp::ALL {
            for v in [0i64, 1, -7, 1234] {
                assert_eq!(i64::apply(op, i64::identity(op), v), v, "{}", op);
            }
        }
        for op in [ReductionOp::Sum, ReductionOp::Product, ReductionOp::Min, ReductionOp::Max] {
            assert_eq!(f64::apply(op, f64::identity(op), 2.5), 2.5, "{}", op);
        }
    }

    #[test]
    fn test_float_rejects_bitwise() {
        assert!(ScalarReduction::<f32>::new(ReductionOp::Xor).is_err());
        assert!(ScalarReduction::<f32>::new(ReductionOp::Max).is_ok());
        assert!(ScalarReduction::<u32>::new(ReductionOp::Xor).is_ok());
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold(ReductionOp::Sum, [1u32, 2, 3]), 6);
        assert_eq!(fold(ReductionOp::Max, [1i32, -2, 3]), 3);
        assert_eq!(fold::<u64>(ReductionOp::Product, []), 1);
    }

    #[test]
    fn test_buffer_ops_round_trip() {
        let ops = ScalarReduction::<i64>::new(ReductionOp::Sum).unwrap();
        let buffer = ops.staging_buffer(2);

        ops.list_copy(&buffer, 1, &40);
        let mut out = 0;
        ops.global_copy(&buffer, 1, &mut out);
        assert_eq!(out, 40);

        ops.list_reduce(&buffer, 1, &2);
        ops.global_reduce(&buffer, 1, &mut out);
        assert_eq!(out, 82);
    }
}
