use crate::{
    Error, IdGenStatus, SnowflakeIdGenerator, SnowflakeLayout, SnowflakeParts, SystemClock,
    TimeSource, interrupt,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread::scope;
use std::time::{Duration, Instant};

struct MockTime {
    millis: i64,
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> i64 {
        self.millis
    }
}

/// Returns the next value on every read, then sticks to the last one.
struct MockStepTime {
    values: Vec<i64>,
    index: AtomicUsize,
}

impl MockStepTime {
    fn new(values: &[i64]) -> Self {
        Self {
            values: values.to_vec(),
            index: AtomicUsize::new(0),
        }
    }
}

impl TimeSource for MockStepTime {
    fn current_millis(&self) -> i64 {
        let i = self.index.fetch_add(1, Ordering::Relaxed);
        self.values[i.min(self.values.len() - 1)]
    }
}

/// A clock the test moves by hand, shareable with generator threads.
#[derive(Clone)]
struct SharedMockTime {
    millis: Arc<AtomicI64>,
}

impl SharedMockTime {
    fn new(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for SharedMockTime {
    fn current_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

fn layout(node_id_bits: u32, sequence_bits: u32) -> SnowflakeLayout {
    SnowflakeLayout::new(node_id_bits, sequence_bits).unwrap()
}

trait IdGenStatusExt {
    fn unwrap_ready(self) -> i64;
    fn unwrap_pending(self) -> i64;
}

impl IdGenStatusExt for IdGenStatus {
    fn unwrap_ready(self) -> i64 {
        match self {
            Self::Ready { id } => id,
            Self::Pending { yield_for } => {
                panic!("unexpected pending (yield for: {yield_for})")
            }
        }
    }

    fn unwrap_pending(self) -> i64 {
        match self {
            Self::Ready { id } => panic!("unexpected ready ({id})"),
            Self::Pending { yield_for } => yield_for,
        }
    }
}

#[test]
fn layout_validation() {
    assert_eq!(layout(10, 12), SnowflakeLayout::DEFAULT);
    assert!(SnowflakeLayout::new(0, 0).is_ok());
    assert!(SnowflakeLayout::new(22, 0).is_ok());
    assert!(SnowflakeLayout::new(0, 22).is_ok());

    let err = SnowflakeLayout::new(11, 12).unwrap_err();
    assert_eq!(
        err,
        Error::TooManyBits {
            node_id_bits: 11,
            sequence_bits: 12
        }
    );
    assert!(err.is_config());
    assert!(SnowflakeLayout::new(u32::MAX, 1).is_err());
}

#[test]
fn layout_derived_constants() {
    let default = SnowflakeLayout::DEFAULT;
    assert_eq!(default.max_node_id(), 1023);
    assert_eq!(default.max_sequence(), 4095);
    assert_eq!(default.timestamp_shift(), 22);
    assert_eq!(default.max_timestamp(), (1 << 41) - 1);

    let empty = layout(0, 0);
    assert_eq!(empty.max_node_id(), 0);
    assert_eq!(empty.max_sequence(), 0);
    assert_eq!(empty.max_timestamp(), i64::MAX);
}

#[test]
fn layout_from_lookup() {
    let env = |pairs: &[(&'static str, &str)]| {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        move |name: &'static str| map.get(name).cloned()
    };

    assert_eq!(
        SnowflakeLayout::from_lookup(env(&[])),
        Ok(SnowflakeLayout::DEFAULT)
    );
    assert_eq!(
        SnowflakeLayout::from_lookup(env(&[
            ("SPINFLAKE_NODE_ID_BITS", "4"),
            ("SPINFLAKE_SEQUENCE_BITS", " 18 ")
        ])),
        Ok(layout(4, 18))
    );
    assert_eq!(
        SnowflakeLayout::from_lookup(env(&[("SPINFLAKE_NODE_ID_BITS", "-1")])),
        Err(Error::InvalidEnv {
            name: "SPINFLAKE_NODE_ID_BITS",
            value: "-1".to_string()
        })
    );
    assert_eq!(
        SnowflakeLayout::from_lookup(env(&[("SPINFLAKE_SEQUENCE_BITS", "13")])),
        Err(Error::TooManyBits {
            node_id_bits: 10,
            sequence_bits: 13
        })
    );
}

#[test]
fn install_only_wins_once() {
    // Whatever resolved first stays in effect for the rest of the process.
    let first = match SnowflakeLayout::DEFAULT.install() {
        Ok(()) => SnowflakeLayout::DEFAULT,
        Err(existing) => existing,
    };
    assert_eq!(*SnowflakeLayout::global(), first);
    assert_eq!(layout(1, 1).install(), Err(first));
}

#[test]
fn encode_decode_masks_fields() {
    let layout = layout(2, 3);
    let id = layout.encode(SnowflakeParts {
        timestamp_ms: 9,
        node_id: 0b111,
        sequence: 0b1111,
    });
    assert_eq!(
        layout.decode(id),
        SnowflakeParts {
            timestamp_ms: 9,
            node_id: 0b11,
            sequence: 0b111
        }
    );
}

#[test]
fn rejects_node_id_out_of_range() {
    let layout = layout(10, 12);
    for node_id in [-1, 1024, i64::MAX] {
        let err = SnowflakeIdGenerator::with_layout(layout, node_id, 0, MockTime { millis: 1 })
            .unwrap_err();
        assert_eq!(err, Error::NodeIdOutOfRange { node_id, max: 1023 });
        assert!(err.is_config());
    }
    assert!(SnowflakeIdGenerator::with_layout(layout, 1023, 0, MockTime { millis: 1 }).is_ok());
}

#[test]
fn rejects_negative_offset() {
    let err = SnowflakeIdGenerator::with_layout(layout(10, 12), 0, -1, MockTime { millis: 1 })
        .unwrap_err();
    assert_eq!(err, Error::NegativeOffset { offset_ms: -1 });
}

#[test]
fn rejects_offset_in_future() {
    let err = SnowflakeIdGenerator::with_layout(layout(10, 12), 0, 101, MockTime { millis: 100 })
        .unwrap_err();
    assert_eq!(
        err,
        Error::OffsetInFuture {
            offset_ms: 101,
            now_ms: 100
        }
    );
    assert_eq!(
        err.to_string(),
        "timestamp_offset_ms=101 > now_ms=100"
    );

    let generator =
        SnowflakeIdGenerator::with_layout(layout(10, 12), 0, 100, MockTime { millis: 100 })
            .unwrap();
    assert_eq!(generator.timestamp_offset_ms(), 100);
}

#[test]
fn convenience_constructor() {
    let generator = SnowflakeIdGenerator::with_node_id(0).unwrap();
    assert_eq!(generator.node_id(), 0);
    assert_eq!(generator.timestamp_offset_ms(), 0);
    assert_eq!(generator.layout(), *SnowflakeLayout::global());

    let id = generator.next_id().unwrap();
    let now = SystemClock.current_millis();
    let parts = generator.decode(id);
    assert!(id >= 0);
    assert!((now - parts.timestamp_ms).abs() < 60_000);
}

#[test]
fn accessors_report_construction_values() {
    let generator =
        SnowflakeIdGenerator::with_layout(layout(5, 7), 17, 1_000, MockTime { millis: 5_000 })
            .unwrap();
    assert_eq!(generator.node_id(), 17);
    assert_eq!(generator.timestamp_offset_ms(), 1_000);
    assert_eq!(generator.layout(), layout(5, 7));
}

#[test]
fn concrete_scenario_100_100_101() {
    // The first reading is taken by the constructor's offset check.
    let time = MockStepTime::new(&[100, 100, 100, 101]);
    let generator = SnowflakeIdGenerator::with_layout(layout(10, 12), 3, 0, time).unwrap();

    let ids: Vec<i64> = (0..3).map(|_| generator.next_id().unwrap()).collect();
    let parts: Vec<SnowflakeParts> = ids.iter().map(|id| generator.decode(*id)).collect();

    assert_eq!(
        parts.iter().map(|p| p.sequence).collect::<Vec<_>>(),
        [0, 1, 0]
    );
    assert_eq!(
        parts.iter().map(|p| p.timestamp_ms).collect::<Vec<_>>(),
        [100, 100, 101]
    );
    assert!(parts.iter().all(|p| p.node_id == 3));
    assert_eq!(ids[0], (100 << 22) | (3 << 12));
    assert!(ids[0] < ids[1] && ids[1] < ids[2]);
}

#[test]
fn sequence_increments_within_same_tick() {
    let generator =
        SnowflakeIdGenerator::with_layout(layout(10, 12), 1, 0, MockTime { millis: 42 }).unwrap();

    for expected in 0..3 {
        let parts = generator.decode(generator.try_poll_id().unwrap().unwrap_ready());
        assert_eq!(parts.timestamp_ms, 42);
        assert_eq!(parts.node_id, 1);
        assert_eq!(parts.sequence, expected);
    }
}

#[test]
fn pending_when_sequence_exhausted_then_rollover() {
    let time = SharedMockTime::new(42);
    let generator = SnowflakeIdGenerator::with_layout(layout(10, 2), 1, 0, time.clone()).unwrap();

    for expected in 0..=3 {
        let id = generator.try_poll_id().unwrap().unwrap_ready();
        assert_eq!(generator.decode(id).sequence, expected);
    }

    let state = generator.state();
    assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), 1);
    assert_eq!(generator.state(), state);

    time.set(43);
    let parts = generator.decode(generator.try_poll_id().unwrap().unwrap_ready());
    assert_eq!(parts.timestamp_ms, 43);
    assert_eq!(parts.sequence, 0);
}

#[test]
fn clock_regression_fails_fast_and_leaves_state() {
    let time = SharedMockTime::new(100);
    let generator = SnowflakeIdGenerator::with_layout(layout(10, 12), 0, 0, time.clone()).unwrap();
    generator.next_id().unwrap();
    let state = generator.state();

    time.set(99);
    let err = generator.next_id().unwrap_err();
    assert_eq!(
        err,
        Error::ClockRegressed {
            now_ms: 99,
            last_ms: 100
        }
    );
    assert!(!err.is_config());
    assert_eq!(generator.try_poll_id(), Err(err));
    assert_eq!(generator.state(), state);

    time.set(100);
    assert_eq!(generator.decode(generator.next_id().unwrap()).sequence, 1);
}

#[test]
fn clock_regression_is_relative_to_offset() {
    let time = SharedMockTime::new(1_000);
    let generator =
        SnowflakeIdGenerator::with_layout(layout(10, 12), 0, 900, time.clone()).unwrap();
    let id = generator.next_id().unwrap();
    assert_eq!(SnowflakeLayout::DEFAULT.decode(id).timestamp_ms, 100);
    assert_eq!(generator.decode(id).timestamp_ms, 1_000);

    time.set(950);
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockRegressed {
            now_ms: 50,
            last_ms: 100
        })
    );
}

#[test]
fn monotonic_under_advancing_clock() {
    let clock = AtomicI64::new(1);
    let generator = SnowflakeIdGenerator::with_layout(layout(10, 12), 9, 0, || {
        clock.fetch_add(1, Ordering::SeqCst)
    })
    .unwrap();

    let mut last = -1;
    for _ in 0..10_000 {
        let id = generator.next_id().unwrap();
        assert!(id > last);
        assert_eq!(generator.decode(id).sequence, 0);
        last = id;
    }
}

#[test]
fn zero_sequence_bits_never_returns_on_a_frozen_clock() {
    let generator =
        SnowflakeIdGenerator::with_layout(layout(10, 0), 1, 0, MockTime { millis: 7 }).unwrap();
    generator.next_id().unwrap();
    let state = generator.state();

    for _ in 0..1_000 {
        assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), 1);
    }

    // A bounded spin: the first retry check sees the raised flag.
    let cancel = AtomicBool::new(true);
    assert_eq!(generator.next_id_with(&cancel), Err(Error::Cancelled));
    assert_eq!(generator.state(), state);
}

#[test]
fn interrupted_thread_stops_spinning() {
    let generator =
        SnowflakeIdGenerator::with_layout(layout(0, 1), 0, 0, MockTime { millis: 7 }).unwrap();
    generator.next_id().unwrap();
    generator.next_id().unwrap();

    interrupt::current().interrupt();
    let result = generator.next_id();
    interrupt::clear();

    assert_eq!(result, Err(Error::Cancelled));
    assert!(!Error::Cancelled.is_config());
}

#[test]
fn spins_until_clock_advances() {
    let time = SharedMockTime::new(5);
    let generator = SnowflakeIdGenerator::with_layout(layout(0, 1), 0, 0, time.clone()).unwrap();
    assert_eq!(generator.decode(generator.next_id().unwrap()).sequence, 0);
    assert_eq!(generator.decode(generator.next_id().unwrap()).sequence, 1);

    let (tx, rx) = std::sync::mpsc::channel();
    let generator = &generator;
    scope(|s| {
        let worker = s.spawn(move || {
            tx.send(interrupt::current()).unwrap();
            generator.next_id()
        });
        let handle = rx.recv().unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_finished(), "returned before the clock advanced");

        time.set(6);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !worker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        if !worker.is_finished() {
            handle.interrupt();
        }

        let parts = generator.decode(worker.join().unwrap().unwrap());
        assert_eq!(parts.timestamp_ms, 6);
        assert_eq!(parts.sequence, 0);
    });
}

#[test]
fn decode_encode_round_trip_and_sign_bit() {
    let generator = SnowflakeIdGenerator::with_layout(
        SnowflakeLayout::DEFAULT,
        513,
        crate::CUSTOM_EPOCH_MS,
        SystemClock,
    )
    .unwrap();
    let layout = generator.layout();

    for _ in 0..10_000 {
        let id = generator.next_id().unwrap();
        assert!(id >= 0);
        let parts = layout.decode(id);
        assert_eq!(parts.node_id, 513);
        assert_eq!(layout.encode(parts), id);
    }
}

#[test]
fn threaded_ids_are_unique() {
    let threads = num_cpus::get().clamp(2, 8);
    const TOTAL_IDS: usize = 4096 * 64;
    let ids_per_thread = TOTAL_IDS / threads;

    let generator =
        SnowflakeIdGenerator::with_layout(SnowflakeLayout::DEFAULT, 0, 0, SystemClock).unwrap();
    let seen_ids = Mutex::new(HashSet::with_capacity(TOTAL_IDS));

    scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                let mut local = Vec::with_capacity(ids_per_thread);
                let mut last = -1;
                for _ in 0..ids_per_thread {
                    let id = generator.next_id().unwrap();
                    // Commits from one thread are ordered in real time.
                    assert!(id > last);
                    last = id;
                    local.push(id);
                }
                let mut seen = seen_ids.lock().unwrap();
                for id in local {
                    assert!(seen.insert(id), "duplicate id {id}");
                }
            });
        }
    });

    assert_eq!(seen_ids.lock().unwrap().len(), ids_per_thread * threads);
}

#[test]
fn concurrent_sequences_are_consecutive_within_a_millisecond() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 256;

    let generator =
        SnowflakeIdGenerator::with_layout(layout(0, 12), 0, 0, MockTime { millis: 10 }).unwrap();
    let barrier = Barrier::new(THREADS);
    let sequences = Mutex::new(Vec::with_capacity(THREADS * PER_THREAD));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                let local: Vec<i64> = (0..PER_THREAD)
                    .map(|_| generator.decode(generator.next_id().unwrap()).sequence)
                    .collect();
                sequences.lock().unwrap().extend(local);
            });
        }
    });

    let mut sequences = sequences.into_inner().unwrap();
    sequences.sort_unstable();
    let expected: Vec<i64> = (0..(THREADS * PER_THREAD) as i64).collect();
    assert_eq!(sequences, expected);
}

#[test]
fn racing_on_an_advancing_clock() {
    // Every read advances the clock, so each attempt sees a new millisecond
    // and the loser of a race retries with a later one.
    for _ in 0..500 {
        let clock = AtomicI64::new(0);
        let generator = SnowflakeIdGenerator::with_layout(layout(0, 0), 0, 0, || {
            clock.fetch_add(1, Ordering::SeqCst)
        })
        .unwrap();
        let barrier = Barrier::new(2);

        let (a, b) = scope(|s| {
            let t1 = s.spawn(|| {
                barrier.wait();
                generator.next_id().unwrap()
            });
            let t2 = s.spawn(|| {
                barrier.wait();
                generator.next_id().unwrap()
            });
            (t1.join().unwrap(), t2.join().unwrap())
        });

        assert_ne!(a, b);
        assert!((1..=3).contains(&a), "unexpected id {a}");
        assert!((1..=3).contains(&b), "unexpected id {b}");
    }
}

#[test]
fn racing_on_a_frozen_clock() {
    // With the register starting at (0, 0) and the clock stuck at 0, the
    // first committed sequence is 1.
    for _ in 0..500 {
        let generator =
            SnowflakeIdGenerator::with_layout(layout(0, 2), 0, 0, MockTime { millis: 0 })
                .unwrap();
        let barrier = Barrier::new(2);

        let (a, b) = scope(|s| {
            let t1 = s.spawn(|| {
                barrier.wait();
                generator.next_id().unwrap()
            });
            let t2 = s.spawn(|| {
                barrier.wait();
                generator.next_id().unwrap()
            });
            (t1.join().unwrap(), t2.join().unwrap())
        });

        let mut pair = [a, b];
        pair.sort_unstable();
        assert_eq!(pair, [1, 2]);
    }
}

#[test]
fn one_thread_fault_does_not_affect_others() {
    let time = SharedMockTime::new(100);
    let generator = SnowflakeIdGenerator::with_layout(layout(0, 12), 0, 0, time.clone()).unwrap();
    generator.next_id().unwrap();

    let cancel = AtomicBool::new(true);
    scope(|s| {
        s.spawn(|| {
            // Not exhausted, so no retry and no cancellation check.
            assert!(generator.next_id_with(&cancel).is_ok());
        });
    });

    time.set(50);
    assert!(matches!(
        generator.next_id(),
        Err(Error::ClockRegressed { .. })
    ));
    time.set(100);
    assert_eq!(generator.decode(generator.next_id().unwrap()).sequence, 2);
}

#[test]
fn debug_output_omits_time_source() {
    let generator =
        SnowflakeIdGenerator::with_layout(layout(10, 12), 4, 0, || 1_i64).unwrap();
    let debug = format!("{generator:?}");
    assert!(debug.starts_with("SnowflakeIdGenerator {"));
    assert!(debug.contains("node_id: 4"));
}

#[cfg(feature = "serde")]
#[test]
fn serde_layout_and_parts() {
    let json = serde_json::to_string(&layout(4, 18)).unwrap();
    assert_eq!(json, r#"{"node_id_bits":4,"sequence_bits":18}"#);
    assert_eq!(
        serde_json::from_str::<SnowflakeLayout>(&json).unwrap(),
        layout(4, 18)
    );
    assert!(
        serde_json::from_str::<SnowflakeLayout>(r#"{"node_id_bits":20,"sequence_bits":3}"#)
            .is_err()
    );

    let parts = SnowflakeParts {
        timestamp_ms: 1,
        node_id: 2,
        sequence: 3,
    };
    let json = serde_json::to_string(&parts).unwrap();
    assert_eq!(serde_json::from_str::<SnowflakeParts>(&json).unwrap(), parts);
}
