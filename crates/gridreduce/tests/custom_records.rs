//! Grid reductions over caller-defined records and struct-of-arrays buffers.

use gridreduce::prelude::*;

/// Running statistics: sum of samples, largest key, sample count.
#[derive(Debug, Clone, Default, PartialEq)]
struct Summary {
    sum: f64,
    max_key: i64,
    count: u64,
}

/// Summary reduction staged in one array per field.
struct SummaryOps;

impl ReduceOps for SummaryOps {
    type Record = Summary;

    fn combine(&self, acc: &mut Summary, other: &Summary) {
        acc.sum += other.sum;
        acc.max_key = acc.max_key.max(other.max_key);
        acc.count += other.count;
    }
}

impl BufferOps for SummaryOps {
    type Buffer = (StagingBuffer<f64>, StagingBuffer<i64>, StagingBuffer<u64>);

    fn list_copy(&self, buffer: &Self::Buffer, slot: usize, record: &Summary) {
        buffer.0.store(slot, &record.sum);
        buffer.1.store(slot, &record.max_key);
        buffer.2.store(slot, &record.count);
    }

    fn list_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &Summary) {
        buffer.0.update(slot, |v| *v += record.sum);
        buffer.1.update(slot, |v| *v = (*v).max(record.max_key));
        buffer.2.update(slot, |v| *v += record.count);
    }

    fn global_copy(&self, buffer: &Self::Buffer, slot: usize, record: &mut Summary) {
        record.sum = buffer.0.load(slot);
        record.max_key = buffer.1.load(slot);
        record.count = buffer.2.load(slot);
    }

    fn global_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &mut Summary) {
        record.sum += buffer.0.load(slot);
        record.max_key = record.max_key.max(buffer.1.load(slot));
        record.count += buffer.2.load(slot);
    }
}

fn soa_buffer(records: usize) -> <SummaryOps as BufferOps>::Buffer {
    (
        StagingBuffer::new(records, 0.0),
        StagingBuffer::new(records, i64::MIN),
        StagingBuffer::new(records, 0),
    )
}

#[test]
fn test_struct_of_arrays_record() {
    let grid = GridReduce::builder()
        .teams(11)
        .threads_per_team(96)
        .num_of_records(4)
        .max_resident_teams(3)
        .spin_limit(Some(1 << 26))
        .build()
        .unwrap();

    let outcome = grid
        .reduce_with(SummaryOps, soa_buffer(4), |team, thread| Summary {
            sum: 0.25,
            max_key: i64::from(team) - i64::from(thread),
            count: 1,
        })
        .expect("Failed to reduce");

    let summary = outcome.value().unwrap();
    assert_eq!(summary.count, 11 * 96);
    assert_eq!(summary.sum, 11.0 * 96.0 * 0.25);
    assert_eq!(summary.max_key, 10);
}

#[test]
fn test_short_soa_array_rejected() {
    let grid = GridReduce::builder().num_of_records(4).build().unwrap();
    let buffer = (
        StagingBuffer::new(4, 0.0),
        StagingBuffer::new(2, i64::MIN),
        StagingBuffer::new(4, 0),
    );
    let err = grid.prepare(SummaryOps, buffer).unwrap_err();
    assert!(matches!(err, ReductionError::InvalidConfig(_)));
}

#[test]
fn test_list_copy_then_global_copy() {
    let buffer = soa_buffer(2);
    let record = Summary {
        sum: 1.5,
        max_key: -3,
        count: 2,
    };
    SummaryOps.list_copy(&buffer, 1, &record);

    let mut loaded = Summary::default();
    SummaryOps.global_copy(&buffer, 1, &mut loaded);
    assert_eq!(loaded, record);

    SummaryOps.list_reduce(&buffer, 1, &record);
    SummaryOps.global_copy(&buffer, 1, &mut loaded);
    assert_eq!(loaded.count, 4);
    assert_eq!(loaded.sum, 3.0);
}

/// Collecting ids is order-sensitive; the grid result must contain
/// every team's contribution exactly once.
struct Collect;

impl ReduceOps for Collect {
    type Record = Vec<u32>;

    fn combine(&self, acc: &mut Vec<u32>, other: &Vec<u32>) {
        acc.extend_from_slice(other);
    }
}

impl BufferOps for Collect {
    type Buffer = StagingBuffer<Vec<u32>>;

    fn list_copy(&self, buffer: &Self::Buffer, slot: usize, record: &Vec<u32>) {
        buffer.store(slot, record);
    }

    fn list_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &Vec<u32>) {
        buffer.update(slot, |v| v.extend_from_slice(record));
    }

    fn global_copy(&self, buffer: &Self::Buffer, slot: usize, record: &mut Vec<u32>) {
        buffer.load_into(slot, record);
    }

    fn global_reduce(&self, buffer: &Self::Buffer, slot: usize, record: &mut Vec<u32>) {
        record.extend(buffer.load(slot));
    }
}

#[test]
fn test_every_contribution_folded_once() {
    let grid = GridReduce::builder()
        .teams(23)
        .threads_per_team(20)
        .warp_size(8)
        .num_of_records(5)
        .max_resident_teams(4)
        .spin_limit(Some(1 << 26))
        .build()
        .unwrap();

    let outcome = grid
        .reduce_with(Collect, StagingBuffer::new(5, Vec::new()), |team, thread| {
            vec![team * 20 + thread]
        })
        .expect("Failed to reduce");

    let mut ids = outcome.into_value().unwrap();
    ids.sort_unstable();
    assert_eq!(ids, (0..23 * 20).collect::<Vec<_>>());
}
