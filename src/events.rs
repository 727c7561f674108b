//! Frame-windowed delivery of control events (program and bank changes).

use crate::source::{EventList, SourceEvent, SourceEventKind};

/// Default tempo: 120 bpm.
pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;

/// Piecewise-linear tick to seconds mapping.
///
/// Each tempo change starts a new segment at the time reached under the previous tempo.
#[derive(Clone, Debug)]
pub struct TempoMap {
    ppqn: f64,
    // (start tick, start seconds, seconds per tick), sorted by tick.
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    /// `changes` are `(tick, microseconds per quarter note)` pairs in tick order.
    pub fn new(ppqn: u16, changes: impl IntoIterator<Item = (u64, u32)>) -> Self {
        let ppqn = f64::from(ppqn.max(1));
        let mut segments = vec![(0u64, 0.0f64, s_per_tick(DEFAULT_US_PER_QUARTER, ppqn))];
        for (tick, us) in changes {
            let start = Self::eval(&segments, tick);
            let rate = s_per_tick(us, ppqn);
            match segments.last_mut() {
                Some(last) if last.0 == tick => *last = (tick, start, rate),
                _ => segments.push((tick, start, rate)),
            }
        }
        Self { ppqn, segments }
    }

    /// Build from the tempo events of an [`EventList`].
    pub fn from_events(list: &EventList) -> Self {
        Self::new(
            list.ppqn,
            list.events.iter().filter_map(|e| match e.kind {
                SourceEventKind::Tempo(us) => Some((e.tick, us)),
                _ => None,
            }),
        )
    }

    pub fn ppqn(&self) -> f64 {
        self.ppqn
    }

    pub fn seconds_at(&self, tick: u64) -> f64 {
        Self::eval(&self.segments, tick)
    }

    fn eval(segments: &[(u64, f64, f64)], tick: u64) -> f64 {
        let idx = segments.partition_point(|s| s.0 <= tick).saturating_sub(1);
        let (start_tick, start_s, rate) = segments[idx];
        start_s + (tick - start_tick) as f64 * rate
    }
}

fn s_per_tick(us_per_quarter: u32, ppqn: f64) -> f64 {
    f64::from(us_per_quarter) * 1e-6 / ppqn
}

/// Forward-only cursor over time-stamped events, advanced once per output frame.
///
/// Timestamps are computed once at construction. There is no rewind; build a new tracker to
/// restart.
#[derive(Clone, Debug)]
pub struct EventTracker {
    events: Vec<SourceEvent>,
    times: Vec<f64>,
    cursor: usize,
    frame: u64,
    s_per_frame: f64,
}

impl EventTracker {
    pub fn new(list: &EventList, fps: u32) -> Self {
        let map = TempoMap::from_events(list);
        let times = list.events.iter().map(|e| map.seconds_at(e.tick)).collect();
        Self {
            events: list.events.clone(),
            times,
            cursor: 0,
            frame: 0,
            s_per_frame: 1.0 / f64::from(fps.max(1)),
        }
    }

    /// Advance one frame and return every unread event at or before the frame's end time.
    pub fn next_events(&mut self) -> &[SourceEvent] {
        self.frame += 1;
        let frame_end = self.frame as f64 * self.s_per_frame;
        let start = self.cursor;
        while self.cursor < self.times.len() && self.times[self.cursor] <= frame_end {
            self.cursor += 1;
        }
        &self.events[start..self.cursor]
    }

    /// Frames advanced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Timestamp in seconds of every event, in list order.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.events.len()
    }
}

#[cfg(test)]
#[path = "../tests/unit/events.rs"]
mod tests;
