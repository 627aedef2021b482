use glam::{Mat3, Vec3};
use gsslam_data::{Camera, Intrinsics};
use gsslam_train::covisibility::CovisibilityMeasure;
use gsslam_train::ingest::{DatasetStream, Frame};
use gsslam_train::window::{FrameScheduler, SchedulerConfig, SchedulerError};

/// Frame `Fn` carries camera index `n`.
fn frame(n: usize) -> Frame {
    Frame::blank(Camera::new(
        n,
        Mat3::IDENTITY,
        Vec3::ZERO,
        Intrinsics::centered(2.0, 2.0, 2, 2),
    ))
}

fn frames(range: std::ops::RangeInclusive<usize>) -> DatasetStream {
    DatasetStream::from_frames(range.map(frame)).unwrap()
}

/// Pinned pairwise scores, `default` for every other pair.
struct PairTable {
    pairs: Vec<((usize, usize), f32)>,
    default: f32,
}

impl CovisibilityMeasure for PairTable {
    fn score(&self, a: &Frame, b: &Frame) -> f32 {
        let key = (a.index().min(b.index()), a.index().max(b.index()));
        self.pairs
            .iter()
            .find(|(pair, _)| *pair == key)
            .map_or(self.default, |(_, score)| *score)
    }
}

fn scheduler(capacity: usize, threshold: f32) -> FrameScheduler {
    FrameScheduler::new(
        SchedulerConfig::default()
            .with_max_window(Some(capacity))
            .with_covisibility_threshold(threshold),
    )
}

#[test]
fn test_redundant_frame_is_skipped() {
    let table = PairTable {
        pairs: vec![((1, 4), 0.9)],
        default: 0.1,
    };
    let mut scheduler = scheduler(3, 0.5);
    let mut stream = frames(1..=6);

    for step in 0..3 {
        scheduler.next_frame(step, &mut stream, &table).unwrap();
    }
    assert_eq!(scheduler.window().indices(), vec![1, 2, 3]);

    let admitted = scheduler.next_frame(3, &mut stream, &table).unwrap();
    assert_eq!(admitted.index(), 5);
    assert_eq!(scheduler.window().indices(), vec![2, 3, 5]);

    let stats = scheduler.stats();
    assert_eq!(stats.admitted, 4);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.evicted, 1);
}

#[test]
fn test_threshold_one_is_plain_fifo() {
    let table = PairTable {
        pairs: vec![((1, 4), 0.99), ((2, 5), 0.9)],
        default: 0.5,
    };
    let mut scheduler = scheduler(3, 1.0);
    let mut stream = frames(1..=8);

    let admitted: Vec<usize> = (0..8)
        .map(|step| scheduler.next_frame(step, &mut stream, &table).unwrap().index())
        .collect();
    assert_eq!(admitted, (1..=8).collect::<Vec<_>>());
    assert_eq!(scheduler.window().indices(), vec![6, 7, 8]);
    assert_eq!(scheduler.stats().rejected, 0);
}

/// Scores 1.0 for the same camera and `other` for any two different cameras.
struct SameIndex {
    other: f32,
}

impl CovisibilityMeasure for SameIndex {
    fn score(&self, a: &Frame, b: &Frame) -> f32 {
        if a.index() == b.index() { 1.0 } else { self.other }
    }
}

#[test]
fn test_threshold_one_admits_revisited_frames() {
    let measure = SameIndex { other: 0.2 };
    let mut scheduler = scheduler(3, 1.0);
    let mut stream = frames(0..=2);

    let admitted: Vec<usize> = (0..7)
        .map(|step| scheduler.next_frame(step, &mut stream, &measure).unwrap().index())
        .collect();
    assert_eq!(admitted, vec![0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(scheduler.window().indices(), vec![1, 2, 0]);
    assert_eq!(scheduler.stats().rejected, 0);
}

#[test]
fn test_window_never_exceeds_capacity() {
    let table = PairTable {
        pairs: Vec::new(),
        default: 0.0,
    };
    for capacity in 1..=5 {
        let mut scheduler = scheduler(capacity, 0.5);
        let mut stream = frames(0..=19);
        let mut previous = 0;
        for step in 0..20 {
            scheduler.next_frame(step, &mut stream, &table).unwrap();
            let len = scheduler.window().len();
            assert!(len <= capacity);
            if previous < capacity {
                assert_eq!(len, previous + 1);
            }
            previous = len;
        }
        // Oldest frames leave first.
        let expected: Vec<usize> = (20 - capacity..20).collect();
        assert_eq!(scheduler.window().indices(), expected);
    }
}

#[test]
fn test_all_redundant_candidates_exhaust_retries() {
    let table = PairTable {
        pairs: Vec::new(),
        default: 0.8,
    };
    let mut scheduler = FrameScheduler::new(
        SchedulerConfig::default()
            .with_max_window(Some(2))
            .with_covisibility_threshold(0.5)
            .with_max_attempts(7),
    );
    let mut stream = frames(0..=3);
    scheduler.next_frame(0, &mut stream, &table).unwrap();
    scheduler.next_frame(1, &mut stream, &table).unwrap();

    let err = scheduler.next_frame(2, &mut stream, &table).unwrap_err();
    assert!(matches!(err, SchedulerError::StreamExhausted { attempts: 7 }));
    assert_eq!(scheduler.window().indices(), vec![0, 1]);
    assert_eq!(scheduler.stats().rejected, 7);
}

#[test]
fn test_finite_stream_ends_retry_loop() {
    let table = PairTable {
        pairs: Vec::new(),
        default: 0.8,
    };
    let mut scheduler = scheduler(2, 0.5);
    let mut stream = frames(0..=4).with_max_cycles(1);
    scheduler.next_frame(0, &mut stream, &table).unwrap();
    scheduler.next_frame(1, &mut stream, &table).unwrap();

    let err = scheduler.next_frame(2, &mut stream, &table).unwrap_err();
    assert!(matches!(err, SchedulerError::StreamExhausted { attempts: 3 }));
}
