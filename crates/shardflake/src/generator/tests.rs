use crate::{
    DEFAULT_EPOCH, Error, GeneratorConfig, MAX_SHARDS, ShardedGenerator, SnowflakeId, TimeSource,
    debug_decode, decode, default_shards,
};
use core::time::Duration;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::scope;

use super::{ShardState, shards_for_cpus};

struct MockTime {
    millis: AtomicU64,
}

impl MockTime {
    fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Returns `values[n]` on the n-th read, sticking at the last value.
struct ScriptedTime {
    values: Vec<u64>,
    reads: AtomicUsize,
}

impl ScriptedTime {
    fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            reads: AtomicUsize::new(0),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl TimeSource for ScriptedTime {
    fn current_millis(&self) -> u64 {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        self.values[n.min(self.values.len() - 1)]
    }
}

/// Reads `before` for the first `switch_at` reads, `after` from then on.
struct StepAfter {
    before: u64,
    after: u64,
    switch_at: usize,
    reads: AtomicUsize,
}

impl TimeSource for StepAfter {
    fn current_millis(&self) -> u64 {
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.switch_at {
            self.before
        } else {
            self.after
        }
    }
}

fn single_shard<T: TimeSource>(clock: T) -> ShardedGenerator<T> {
    ShardedGenerator::with_clock(GeneratorConfig::new(1, 1).with_shards(1), clock).unwrap()
}

#[test]
fn sequence_increments_within_same_tick() {
    let generator = single_shard(MockTime::new(42));

    let id1 = generator.next_id().unwrap();
    let id2 = generator.next_id().unwrap();
    let id3 = generator.next_id().unwrap();

    assert_eq!(id1.timestamp(), 42);
    assert_eq!(id2.timestamp(), 42);
    assert_eq!(id3.timestamp(), 42);
    assert_eq!(id1.sequence(), 0);
    assert_eq!(id2.sequence(), 1);
    assert_eq!(id3.sequence(), 2);
    assert!(id1 < id2 && id2 < id3);
}

#[test]
fn new_millisecond_resets_sequence() {
    let clock = MockTime::new(42);
    let generator = single_shard(&clock);

    generator.next_id().unwrap();
    generator.next_id().unwrap();
    clock.set(43);

    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), 43);
    assert_eq!(id.sequence(), 0);
}

#[test]
fn reproduces_fixture_id() {
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(1, 1)
            .with_epoch(DEFAULT_EPOCH)
            .with_shards(1),
        MockTime::new(25_716_269_787),
    )
    .unwrap();

    let id = generator.next_id().unwrap();
    assert_eq!(id.to_raw(), 107_861_853_232_828_416);
    assert_eq!(generator.next_raw().unwrap(), 107_861_853_232_828_417);
}

#[test]
fn rollover_waits_for_next_millisecond() {
    let max = SnowflakeId::max_sequence() as usize;
    let clock = StepAfter {
        before: 42,
        after: 43,
        switch_at: max + 2,
        reads: AtomicUsize::new(0),
    };
    let generator = single_shard(&clock);

    for i in 0..=max {
        let id = generator.next_id().unwrap();
        assert_eq!(id.sequence(), i as u64);
        assert_eq!(id.timestamp(), 42);
    }

    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), 43);
    assert_eq!(id.sequence(), 0);
    // One read to find the sequence exhausted, at least one more to see 43.
    assert!(clock.reads.load(Ordering::SeqCst) >= max + 3);
}

#[test]
fn rejects_regression_beyond_tolerance() {
    let clock = MockTime::new(100);
    let generator = single_shard(&clock);
    generator.next_id().unwrap();

    clock.set(94);
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockRegression { last: 100, now: 94 })
    );

    // The failed call must not have touched the shard: back at 100 the
    // sequence continues where it left off.
    clock.set(100);
    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), 100);
    assert_eq!(id.sequence(), 1);
}

#[test]
fn regression_error_leaves_state_untouched() {
    let mut state = ShardState {
        last_timestamp: 100,
        counter: 7,
    };
    let before = state;

    let result = state.advance(&MockTime::new(90), SnowflakeId::max_sequence(), None);
    assert!(matches!(result, Err(Error::ClockRegression { .. })));
    assert_eq!(state, before);
}

#[test]
fn waits_out_small_regression() {
    let clock = ScriptedTime::new(vec![97, 98, 99, 100]);
    let mut state = ShardState {
        last_timestamp: 100,
        counter: 3,
    };

    let (timestamp, counter) = state
        .advance(&clock, SnowflakeId::max_sequence(), None)
        .unwrap();
    assert_eq!((timestamp, counter), (100, 4));
    assert_eq!(clock.reads(), 4);
    assert_eq!(state.last_timestamp, 100);
}

#[test]
fn regression_at_tolerance_boundary_is_waited_out() {
    let clock = ScriptedTime::new(vec![95, 101]);
    let mut state = ShardState {
        last_timestamp: 100,
        counter: 3,
    };

    let (timestamp, counter) = state
        .advance(&clock, SnowflakeId::max_sequence(), None)
        .unwrap();
    assert_eq!((timestamp, counter), (101, 0));
}

#[test]
fn bounded_wait_times_out_on_exhausted_sequence() {
    let mut state = ShardState {
        last_timestamp: 100,
        counter: SnowflakeId::max_sequence(),
    };
    let before = state;

    let result = state.advance(
        &MockTime::new(100),
        SnowflakeId::max_sequence(),
        Some(Duration::from_millis(5)),
    );
    match result {
        Err(Error::ClockWaitTimeout { waited }) => assert!(waited >= Duration::from_millis(5)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(state, before);
}

#[test]
fn bounded_wait_times_out_on_frozen_clock_behind() {
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(0, 0)
            .with_shards(1)
            .with_max_wait(Some(Duration::from_millis(2))),
        ScriptedTime::new(vec![50, 48]),
    )
    .unwrap();

    generator.next_id().unwrap();
    assert!(matches!(
        generator.next_id(),
        Err(Error::ClockWaitTimeout { .. })
    ));
}

#[test]
fn clock_jumping_back_during_small_regression_wait_is_rejected() {
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(1, 1)
            .with_shards(1)
            .with_max_wait(Some(Duration::from_millis(50))),
        ScriptedTime::new(vec![100, 97, 50]),
    )
    .unwrap();

    generator.next_id().unwrap();
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockRegression { last: 100, now: 50 })
    );
}

#[test]
fn clock_jumping_back_during_regression_wait_fails_without_bound() {
    let clock = ScriptedTime::new(vec![97, 99, 50]);
    let mut state = ShardState {
        last_timestamp: 100,
        counter: 3,
    };
    let before = state;

    let result = state.advance(&clock, SnowflakeId::max_sequence(), None);
    assert_eq!(result, Err(Error::ClockRegression { last: 100, now: 50 }));
    assert_eq!(state, before);
}

#[test]
fn clock_jumping_back_during_exhaustion_wait_is_rejected() {
    let clock = ScriptedTime::new(vec![100, 100, 20]);
    let mut state = ShardState {
        last_timestamp: 100,
        counter: SnowflakeId::max_sequence(),
    };
    let before = state;

    let result = state.advance(&clock, SnowflakeId::max_sequence(), None);
    assert_eq!(result, Err(Error::ClockRegression { last: 100, now: 20 }));
    assert_eq!(state, before);
}

#[test]
fn exhaustion_wait_on_sharded_generator_reports_regression() {
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(1, 1)
            .with_shards(MAX_SHARDS)
            .with_max_wait(Some(Duration::from_millis(50))),
        ScriptedTime::new(vec![100, 100, 20]),
    )
    .unwrap();

    // With 4096 shards each shard holds one ID per millisecond.
    assert_eq!(generator.ids_per_shard_per_millis(), 1);
    generator.next_id_from(0).unwrap();
    assert_eq!(
        generator.next_id_from(0),
        Err(Error::ClockRegression { last: 100, now: 20 })
    );
}

#[test]
fn rejects_timestamp_beyond_field_width() {
    let generator = single_shard(MockTime::new(SnowflakeId::max_timestamp() + 1));
    assert_eq!(
        generator.next_id(),
        Err(Error::TimestampOverflow {
            timestamp: SnowflakeId::max_timestamp() + 1
        })
    );
}

#[test]
fn origin_bounds_are_checked() {
    let clock = MockTime::new(0);

    assert!(matches!(
        ShardedGenerator::with_clock(GeneratorConfig::new(32, 0), &clock),
        Err(Error::InvalidOrigin {
            datacenter_id: 32,
            worker_id: 0,
            max: 31
        })
    ));
    assert!(matches!(
        ShardedGenerator::with_clock(GeneratorConfig::new(0, 32), &clock),
        Err(Error::InvalidOrigin { worker_id: 32, .. })
    ));

    let generator = ShardedGenerator::with_clock(GeneratorConfig::new(31, 31), &clock).unwrap();
    assert_eq!(generator.datacenter_id(), 31);
    assert_eq!(generator.worker_id(), 31);
}

#[test]
fn shard_count_bounds_and_defaults() {
    let clock = MockTime::new(0);

    assert!(matches!(
        ShardedGenerator::with_clock(GeneratorConfig::new(0, 0).with_shards(MAX_SHARDS + 1), &clock),
        Err(Error::InvalidShardCount { shards, max }) if shards == MAX_SHARDS + 1 && max == MAX_SHARDS
    ));

    let generator =
        ShardedGenerator::with_clock(GeneratorConfig::new(0, 0).with_shards(MAX_SHARDS), &clock)
            .unwrap();
    assert_eq!(generator.shard_bits(), 12);
    assert_eq!(generator.ids_per_shard_per_millis(), 1);

    let generator = ShardedGenerator::with_clock(GeneratorConfig::new(0, 0), &clock).unwrap();
    assert_eq!(generator.shard_count(), default_shards());
    assert!(generator.shard_count() >= 1);
}

#[test]
fn default_shard_count_stays_within_sequence_capacity() {
    assert_eq!(shards_for_cpus(0), 1);
    assert_eq!(shards_for_cpus(1), 2);
    assert_eq!(shards_for_cpus(8), 16);
    assert_eq!(shards_for_cpus(MAX_SHARDS / 2), MAX_SHARDS);
    assert_eq!(shards_for_cpus(MAX_SHARDS), MAX_SHARDS);
    assert_eq!(shards_for_cpus(usize::MAX), MAX_SHARDS);
    assert!(default_shards() <= MAX_SHARDS);
}

#[test]
fn zero_epoch_selects_default() {
    let generator = ShardedGenerator::new(
        GeneratorConfig::new(0, 0)
            .with_epoch(Duration::ZERO)
            .with_shards(1),
    )
    .unwrap();
    assert_eq!(generator.epoch(), DEFAULT_EPOCH);
    assert_eq!(generator.clock().epoch(), DEFAULT_EPOCH);
}

#[test]
fn shard_tag_occupies_low_sequence_bits() {
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(3, 4).with_shards(4),
        MockTime::new(42),
    )
    .unwrap();
    assert_eq!(generator.shard_bits(), 2);
    assert_eq!(generator.ids_per_shard_per_millis(), 1024);

    let ids: Vec<_> = (0..8).map(|_| generator.next_id().unwrap()).collect();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(id.timestamp(), 42);
        assert_eq!(id.datacenter_id(), 3);
        assert_eq!(id.worker_id(), 4);
        assert_eq!(generator.shard_of(*id), i % 4);
        // Round-robin over four shards in one millisecond yields the whole
        // sequence range in order.
        assert_eq!(id.sequence(), i as u64);
    }
}

#[test]
fn non_power_of_two_shards_round_up_tag_width() {
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(0, 0).with_shards(3),
        MockTime::new(7),
    )
    .unwrap();
    assert_eq!(generator.shard_bits(), 2);

    let ids: HashSet<_> = (0..300).map(|_| generator.next_id().unwrap()).collect();
    assert_eq!(ids.len(), 300);
}

#[test]
fn shards_do_not_collide_in_the_same_millisecond() {
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(1, 1).with_shards(8),
        MockTime::new(1_000),
    )
    .unwrap();

    let first: Vec<_> = (0..8)
        .map(|shard| generator.next_id_from(shard).unwrap())
        .collect();
    let unique: HashSet<_> = first.iter().copied().collect();
    assert_eq!(unique.len(), 8);
    assert!(first.iter().all(|id| id.timestamp() == 1_000));
}

#[test]
fn exhausted_shard_waits_without_affecting_others() {
    let clock = StepAfter {
        before: 10,
        after: 11,
        switch_at: 4,
        reads: AtomicUsize::new(0),
    };
    // 4096 shards leave a single counter value per shard and millisecond.
    let generator = ShardedGenerator::with_clock(
        GeneratorConfig::new(0, 0).with_shards(MAX_SHARDS),
        &clock,
    )
    .unwrap();

    let a = generator.next_id_from(5).unwrap();
    let b = generator.next_id_from(6).unwrap();
    assert_eq!((a.timestamp(), b.timestamp()), (10, 10));
    assert_eq!((a.sequence(), b.sequence()), (5, 6));

    let c = generator.next_id_from(5).unwrap();
    assert_eq!(c.timestamp(), 11);
    assert_eq!(c.sequence(), 5);
}

#[test]
fn monotonic_within_each_shard() {
    let generator = ShardedGenerator::new(GeneratorConfig::new(1, 1).with_shards(4)).unwrap();
    let mut last = vec![None::<SnowflakeId>; generator.shard_count()];

    for _ in 0..4096 * 64 {
        let id = generator.next_id().unwrap();
        let shard = generator.shard_of(id);
        if let Some(prev) = last[shard] {
            assert!(id > prev, "shard {shard}: {id} <= {prev}");
        }
        last[shard] = Some(id);
    }
}

#[test]
fn single_shard_system_clock_is_strictly_increasing() {
    let generator = single_shard(crate::SystemClock::default());
    let mut prev = generator.next_id().unwrap();

    for _ in 0..4096 * 64 {
        let id = generator.next_id().unwrap();
        assert!(id > prev);
        assert_eq!(id.datacenter_id(), 1);
        assert_eq!(id.worker_id(), 1);
        prev = id;
    }
}

fn run_threaded_unique(shards: usize) {
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 4096 * 8;

    let generator = ShardedGenerator::new(GeneratorConfig::new(1, 1).with_shards(shards)).unwrap();
    let seen = Mutex::new(HashSet::with_capacity(THREADS * IDS_PER_THREAD));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let ids: Vec<_> = (0..IDS_PER_THREAD)
                    .map(|_| generator.next_id().unwrap())
                    .collect();
                let mut seen = seen.lock().unwrap();
                for id in ids {
                    assert!(seen.insert(id), "duplicate id {id}");
                }
            });
        }
    });

    assert_eq!(seen.lock().unwrap().len(), THREADS * IDS_PER_THREAD);
}

#[test]
fn threaded_single_shard_has_no_duplicates() {
    run_threaded_unique(1);
}

#[test]
fn threaded_many_shards_have_no_duplicates() {
    run_threaded_unique(16);
}

#[test]
fn threaded_default_shards_have_no_duplicates() {
    run_threaded_unique(0);
}

#[test]
fn generated_ids_survive_debug_decode() {
    let generator = ShardedGenerator::new(GeneratorConfig::new(1, 1)).unwrap();

    for _ in 0..64 {
        let id = generator.next_raw().unwrap();
        let parts = decode(id, generator.epoch());
        assert_eq!(parts.datacenter_id, 1);
        assert_eq!(parts.worker_id, 1);
        assert_eq!(parts.reencode(), id);

        let report = debug_decode(id, generator.epoch());
        assert!(report.contains("OK: all bit fields match."), "{report}");
    }
}
