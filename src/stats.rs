//! Time accounting for a measured copy.

use std::time::{Duration, Instant};

/// Snapshot of an active or finished [`MeasuringRingBuffer`].
///
/// Times include the phase that is in flight at the moment the snapshot was
/// taken, so two snapshots of the same buffer never go backwards.
///
/// [`MeasuringRingBuffer`]: crate::MeasuringRingBuffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub buffer_capacity: usize,
    pub buffered_bytes: usize,
    /// Bytes pulled from the source so far.
    pub bytes_read: u64,
    pub total_time: Duration,
    pub time_spent_reading: Duration,
    pub time_spent_writing: Duration,
}

impl Stats {
    /// Share of the elapsed time spent blocked on the source.
    ///
    /// `None` until any time has elapsed.
    pub fn read_fraction(&self) -> Option<f64> {
        fraction(self.time_spent_reading, self.total_time)
    }

    /// Share of the elapsed time spent blocked on the sink.
    pub fn write_fraction(&self) -> Option<f64> {
        fraction(self.time_spent_writing, self.total_time)
    }

    /// Average bytes per second read from the source.
    pub fn throughput(&self) -> Option<f64> {
        let secs = self.total_time.as_secs_f64();
        if secs > 0.0 {
            Some(self.bytes_read as f64 / secs)
        } else {
            None
        }
    }
}

fn fraction(part: Duration, whole: Duration) -> Option<f64> {
    if whole.is_zero() {
        None
    } else {
        Some(part.as_secs_f64() / whole.as_secs_f64())
    }
}

/// One stopwatch: time from closed intervals plus the open one, if any.
#[derive(Debug, Default)]
struct Phase {
    started: Option<Instant>,
    accumulated: Duration,
}

impl Phase {
    fn start(&mut self, now: Instant) {
        if self.started.is_none() {
            self.started = Some(now);
        }
    }

    fn stop(&mut self, now: Instant) {
        if let Some(started) = self.started.take() {
            self.accumulated += now.saturating_duration_since(started);
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        match self.started {
            Some(started) => self.accumulated + now.saturating_duration_since(started),
            None => self.accumulated,
        }
    }
}

/// Read, write and overall stopwatches of one buffer.
///
/// Lives inside the buffer's locked state; every method takes the current
/// instant from the caller so that one snapshot uses a single clock reading.
///
/// Read and write phases end at the instant the I/O call returned, before
/// the lock is taken back. A snapshot may land in between and already report
/// time up to its own instant, so a phase never closes earlier than the
/// latest snapshot.
#[derive(Debug, Default)]
pub(crate) struct Clock {
    total: Phase,
    reading: Phase,
    writing: Phase,
    observed: Option<Instant>,
}

impl Clock {
    /// Opens the overall timer unless a side already did.
    pub(crate) fn start_transfer(&mut self, now: Instant) {
        self.total.start(now);
    }

    pub(crate) fn stop_transfer(&mut self, now: Instant) {
        let end = self.settle(now);
        self.total.stop(end);
    }

    pub(crate) fn start_read(&mut self, now: Instant) {
        self.reading.start(now);
    }

    pub(crate) fn stop_read(&mut self, ended: Instant) {
        let end = self.settle(ended);
        self.reading.stop(end);
    }

    pub(crate) fn start_write(&mut self, now: Instant) {
        self.writing.start(now);
    }

    pub(crate) fn stop_write(&mut self, ended: Instant) {
        let end = self.settle(ended);
        self.writing.stop(end);
    }

    fn settle(&self, end: Instant) -> Instant {
        match self.observed {
            Some(seen) if seen > end => seen,
            _ => end,
        }
    }

    /// Like [`elapsed`](Self::elapsed), and remembers `now` as reported.
    pub(crate) fn observe(&mut self, now: Instant) -> (Duration, Duration, Duration) {
        self.observed = Some(self.observed.map_or(now, |seen| seen.max(now)));
        self.elapsed(now)
    }

    /// Returns `(total, reading, writing)` as of `now`.
    pub(crate) fn elapsed(&self, now: Instant) -> (Duration, Duration, Duration) {
        (
            self.total.elapsed(now),
            self.reading.elapsed(now),
            self.writing.elapsed(now),
        )
    }
}
