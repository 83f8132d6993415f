//! Custom Record Example
//!
//! Reduces a caller-defined record (mean and range of samples) staged in a
//! struct-of-arrays buffer, one array per field.

use gridreduce::prelude::*;

/// Running moments of a set of samples.
#[derive(Debug, Clone, Copy)]
struct Moments {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Moments {
    fn of(sample: f64) -> Self {
        Self {
            count: 1,
            sum: sample,
            min: sample,
            max: sample,
        }
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

struct MomentOps;

impl ReduceOps for MomentOps {
    type Record = Moments;

    fn combine(&self, acc: &mut Moments, other: &Moments) {
        acc.count += other.count;
        acc.sum += other.sum;
        acc.min = acc.min.min(other.min);
        acc.max = acc.max.max(other.max);
    }
}

impl BufferOps for MomentOps {
    // (count, sum, (min, max))
    type Buffer = (
        StagingBuffer<u64>,
        StagingBuffer<f64>,
        (StagingBuffer<f64>, StagingBuffer<f64>),
    );

    fn list_copy(&self, buffer: &Self::Buffer, slot: usize, record: &Moments) {
        buffer.0.store(slot, &record.count);
        buffer.1.store(slot, &record.sum);
        buffer.2 .0.store(slot, &record.min);
        buffer.2 .1.store(slot, &record.max);
    }

    fn list_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &Moments) {
        buffer.0.update(slot, |v| *v += record.count);
        buffer.1.update(slot, |v| *v += record.sum);
        buffer.2 .0.update(slot, |v| *v = v.min(record.min));
        buffer.2 .1.update(slot, |v| *v = v.max(record.max));
    }

    fn global_copy(&self, buffer: &Self::Buffer, slot: usize, record: &mut Moments) {
        record.count = buffer.0.load(slot);
        record.sum = buffer.1.load(slot);
        record.min = buffer.2 .0.load(slot);
        record.max = buffer.2 .1.load(slot);
    }

    fn global_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &mut Moments) {
        let mut other = *record;
        self.global_copy(buffer, slot, &mut other);
        self.combine(record, &other);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== gridreduce Custom Record Example ===\n");

    let records = 8;
    let grid = GridReduce::builder()
        .teams(40)
        .threads_per_team(96)
        .num_of_records(records)
        .build()?;

    let buffer = (
        StagingBuffer::new(records as usize, 0),
        StagingBuffer::new(records as usize, 0.0),
        (
            StagingBuffer::new(records as usize, f64::INFINITY),
            StagingBuffer::new(records as usize, f64::NEG_INFINITY),
        ),
    );

    let outcome = grid.reduce_with(MomentOps, buffer, |team, thread| {
        let x = f64::from(team * 96 + thread);
        Moments::of((x * 0.37).cos() * 10.0)
    })?;

    let moments = outcome.value()?;
    println!("Samples: {}", moments.count);
    println!("  mean  = {:.4}", moments.mean());
    println!("  range = [{:.4}, {:.4}]", moments.min, moments.max);
    println!("  slot merges = {}\n", outcome.stats.slot_merges);

    println!("Custom record example complete!");

    Ok(())
}
