use super::*;

fn ev(tick: u64, channel: u8, kind: SourceEventKind) -> SourceEvent {
    SourceEvent {
        tick,
        channel,
        kind,
    }
}

#[test]
fn default_tempo_is_half_a_second_per_quarter() {
    let map = TempoMap::new(480, []);
    assert!((map.seconds_at(480) - 0.5).abs() < 1e-12);
    assert!((map.seconds_at(960) - 1.0).abs() < 1e-12);
}

#[test]
fn tempo_change_partitions_the_mapping() {
    // 120 bpm for one quarter, then 60 bpm.
    let map = TempoMap::new(100, [(100, 1_000_000)]);
    assert!((map.seconds_at(100) - 0.5).abs() < 1e-12);
    assert!((map.seconds_at(150) - 1.0).abs() < 1e-12);
    assert!((map.seconds_at(200) - 1.5).abs() < 1e-12);
}

#[test]
fn tempo_change_at_same_tick_replaces_previous() {
    let map = TempoMap::new(100, [(0, 250_000), (0, 1_000_000)]);
    assert!((map.seconds_at(100) - 1.0).abs() < 1e-12);
}

#[test]
fn next_events_windows_by_frame_end_inclusive() {
    // One tick per quarter at the default tempo is 0.5 s per tick; 4 fps is 0.25 s per frame.
    let list = EventList {
        ppqn: 1,
        events: vec![
            ev(0, 0, SourceEventKind::Program(5)),
            ev(1, 1, SourceEventKind::Program(7)),
            ev(2, 1, SourceEventKind::Bank(2)),
        ],
    };
    let mut tracker = EventTracker::new(&list, 4);

    assert_eq!(tracker.next_events(), &list.events[0..1]);
    // ends exactly at 0.5 s
    assert_eq!(tracker.next_events(), &list.events[1..2]);
    assert!(tracker.next_events().is_empty());
    assert!(!tracker.is_exhausted());
    assert_eq!(tracker.next_events(), &list.events[2..3]);
    assert!(tracker.is_exhausted());
    assert!(tracker.next_events().is_empty());
    assert_eq!(tracker.frame(), 5);
}

#[test]
fn tempo_events_shift_later_timestamps() {
    let list = EventList {
        ppqn: 10,
        events: vec![
            ev(0, 0, SourceEventKind::Tempo(2_000_000)),
            ev(10, 0, SourceEventKind::Program(1)),
        ],
    };
    let tracker = EventTracker::new(&list, 30);
    assert_eq!(tracker.times().len(), 2);
    assert!((tracker.times()[1] - 2.0).abs() < 1e-12);
}
