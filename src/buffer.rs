//! The measuring ring buffer: one producer, one consumer, one lock.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::circular_buffer::CircularBuffer;
use crate::error::Error;
use crate::stats::{Clock, Stats};

/// How the producer side ended.
#[derive(Debug, Clone)]
enum ReadEnd {
    Eof,
    Failed(Error),
}

struct State {
    ring: CircularBuffer,
    bytes_read: u64,
    read_end: Option<ReadEnd>,
    write_error: Option<Error>,
    clock: Clock,
    producer_attached: bool,
    consumer_attached: bool,
}

/// Outcome of one side of a copy.
#[derive(Debug)]
pub struct Transferred {
    /// Bytes this side moved: read from the source for the producer, written
    /// to the sink for the consumer and for [`MeasuringRingBuffer::copy`].
    pub bytes: u64,
    pub result: Result<(), Error>,
}

impl Transferred {
    fn done(bytes: u64) -> Self {
        Self { bytes, result: Ok(()) }
    }

    fn failed(bytes: u64, err: Error) -> Self {
        Self { bytes, result: Err(err) }
    }

    pub fn into_result(self) -> Result<u64, Error> {
        self.result.map(|()| self.bytes)
    }
}

/// A ring buffer that copies bytes from a reader to a writer and keeps
/// track of how long each side spends blocked.
///
/// Each buffer serves exactly one copy: one [`read_from`] and one
/// [`write_to`], or a single [`copy`] (or [`copy_scoped`]) doing both.
/// [`stats`] may be called from any thread at any time.
///
/// [`read_from`]: MeasuringRingBuffer::read_from
/// [`write_to`]: MeasuringRingBuffer::write_to
/// [`copy`]: MeasuringRingBuffer::copy
/// [`copy_scoped`]: MeasuringRingBuffer::copy_scoped
/// [`stats`]: MeasuringRingBuffer::stats
pub struct MeasuringRingBuffer {
    state: Mutex<State>,
    changed: Condvar,
    capacity: usize,
    max_write: usize,
}

impl MeasuringRingBuffer {
    /// Create a buffer holding up to `capacity` bytes.
    ///
    /// Besides the ring itself, the producer keeps a scratch slice that it
    /// reads into with the lock released, and the consumer keeps one of
    /// [`max_write`](Self::max_write) bytes. The scratch slice grows to the
    /// largest free run offered, which is the whole ring on the first read,
    /// so a busy copy holds roughly twice `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        Ok(Self {
            state: Mutex::new(State {
                ring: CircularBuffer::new(capacity),
                bytes_read: 0,
                read_end: None,
                write_error: None,
                clock: Clock::default(),
                producer_attached: false,
                consumer_attached: false,
            }),
            changed: Condvar::new(),
            capacity,
            // Writers usually block until the whole slice is written, so
            // small chunks hand space back to the producer sooner.
            max_write: (capacity / 8).max(1),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest slice handed to the sink in a single `write` call.
    pub fn max_write(&self) -> usize {
        self.max_write
    }

    /// Copy `source` into `sink` through this buffer.
    ///
    /// The producer runs on a detached thread while the consumer runs on the
    /// calling thread. Returns as soon as the consumer is done: the count is
    /// what reached the sink, and a source failure is reported once
    /// everything read before it has been written. After a sink failure a
    /// producer blocked inside `read` is left behind and stops when that read
    /// returns.
    pub fn copy<W, R>(self: &Arc<Self>, sink: W, source: R) -> Transferred
    where
        W: Write,
        R: Read + Send + 'static,
    {
        if let Err(err) = self.claim_both() {
            return Transferred::failed(0, err);
        }

        let buf = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("ring-producer".to_string())
            // The producer's outcome reaches the consumer through `read_end`.
            .spawn(move || {
                buf.produce(source);
            });
        if let Err(e) = spawned {
            return Transferred::failed(0, self.abort_read(e));
        }
        self.consume(sink)
    }

    /// Like [`copy`](Self::copy), but the producer runs on a scoped thread so
    /// neither side needs to be `'static`.
    ///
    /// Returns only after both sides have stopped: a producer blocked inside
    /// `read` keeps this call waiting until that read returns, even when the
    /// sink has already failed.
    pub fn copy_scoped<W, R>(&self, sink: W, source: R) -> Transferred
    where
        W: Write,
        R: Read + Send,
    {
        if let Err(err) = self.claim_both() {
            return Transferred::failed(0, err);
        }

        thread::scope(|scope| {
            scope.spawn(move || self.produce(source));
            self.consume(sink)
        })
    }

    fn claim_both(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.producer_attached || state.consumer_attached {
            return Err(Error::AlreadyUsed);
        }
        state.producer_attached = true;
        state.consumer_attached = true;
        Ok(())
    }

    /// Record a producer that never started as a failed source.
    fn abort_read(&self, err: io::Error) -> Error {
        let err = Error::read(err);
        let mut state = self.state.lock();
        state.read_end = Some(ReadEnd::Failed(err.clone()));
        self.changed.notify_all();
        err
    }

    /// Fill the buffer from `source` until end of input or an error.
    ///
    /// End of input counts as success. Stops early with the sink's error if
    /// the consumer has failed. Reads failing with `ErrorKind::Interrupted`
    /// are reissued, as `std::io` readers expect; every other error ends the
    /// producer.
    pub fn read_from<R: Read>(&self, source: R) -> Transferred {
        {
            let mut state = self.state.lock();
            if state.producer_attached {
                return Transferred::failed(0, Error::AlreadyUsed);
            }
            state.producer_attached = true;
        }
        self.produce(source)
    }

    /// Drain the buffer into `sink` until the producer is done and the ring
    /// is empty, or until the sink fails.
    ///
    /// Writes failing with `ErrorKind::Interrupted` are reissued; every other
    /// error, and a write of zero bytes, ends the consumer. The sink is
    /// flushed once the ring has been drained.
    pub fn write_to<W: Write>(&self, sink: W) -> Transferred {
        {
            let mut state = self.state.lock();
            if state.consumer_attached {
                return Transferred::failed(0, Error::AlreadyUsed);
            }
            state.consumer_attached = true;
        }
        self.consume(sink)
    }

    /// Consistent view of the counters, including time in flight.
    pub fn stats(&self) -> Stats {
        let mut state = self.state.lock();
        let now = Instant::now();
        let (total_time, time_spent_reading, time_spent_writing) = state.clock.observe(now);
        Stats {
            buffer_capacity: state.ring.capacity(),
            buffered_bytes: state.ring.len(),
            bytes_read: state.bytes_read,
            total_time,
            time_spent_reading,
            time_spent_writing,
        }
    }

    /// Producer loop. Only `Interrupted` reads are retried.
    fn produce<R: Read>(&self, mut source: R) -> Transferred {
        let mut scratch = Vec::new();
        let mut sum = 0u64;
        let mut state = self.state.lock();
        state.clock.start_transfer(Instant::now());

        loop {
            let want = state.ring.free_run().len();
            if scratch.len() < want {
                scratch.resize(want, 0);
            }
            state.clock.start_read(Instant::now());
            let (res, ended) = MutexGuard::unlocked(&mut state, || {
                let res = read_retrying(&mut source, &mut scratch[..want]);
                (res, Instant::now())
            });
            state.clock.stop_read(ended);

            match res {
                Ok(0) => {
                    state.read_end = Some(ReadEnd::Eof);
                    self.changed.notify_all();
                    debug!("producer reached end of input after {} bytes", sum);
                    return Transferred::done(sum);
                }
                Ok(n) => {
                    let stored = state.ring.fill(&scratch[..n]);
                    debug_assert_eq!(stored, n);
                    state.bytes_read += n as u64;
                    sum += n as u64;
                    self.changed.notify_all();
                    trace!("read {} bytes, {} buffered", n, state.ring.len());
                }
                Err(e) => {
                    let err = Error::read(e);
                    state.read_end = Some(ReadEnd::Failed(err.clone()));
                    self.changed.notify_all();
                    debug!("producer stopped after {} bytes: {}", sum, err);
                    return Transferred::failed(sum, err);
                }
            }

            if let Some(err) = &state.write_error {
                debug!("producer stopped after {} bytes, sink failed", sum);
                return Transferred::failed(sum, err.clone());
            }
            while state.ring.is_full() {
                self.changed.wait(&mut state);
                if let Some(err) = &state.write_error {
                    debug!("producer stopped after {} bytes, sink failed", sum);
                    return Transferred::failed(sum, err.clone());
                }
            }
        }
    }

    /// Consumer loop. Only `Interrupted` writes are retried.
    fn consume<W: Write>(&self, mut sink: W) -> Transferred {
        let mut scratch = vec![0u8; self.max_write];
        let mut sum = 0u64;
        let mut state = self.state.lock();
        state.clock.start_transfer(Instant::now());

        let result = self.drain(&mut state, &mut sink, &mut scratch, &mut sum);

        state.clock.stop_transfer(Instant::now());
        match result {
            Ok(()) => {
                debug!("consumer drained {} bytes", sum);
                Transferred::done(sum)
            }
            Err(err) => {
                debug!("consumer stopped after {} bytes: {}", sum, err);
                Transferred::failed(sum, err)
            }
        }
    }

    fn drain<W: Write>(
        &self,
        state: &mut MutexGuard<'_, State>,
        sink: &mut W,
        scratch: &mut [u8],
        sum: &mut u64,
    ) -> Result<(), Error> {
        loop {
            while state.ring.is_empty() {
                match state.read_end.clone() {
                    Some(ReadEnd::Eof) => return self.flush(state, sink),
                    Some(ReadEnd::Failed(err)) => return Err(err),
                    None => self.changed.wait(state),
                }
            }

            let n = state.ring.peek(scratch);
            let chunk = &scratch[..n];
            state.clock.start_write(Instant::now());
            let (res, ended) = MutexGuard::unlocked(state, || {
                let res = write_retrying(&mut *sink, chunk);
                (res, Instant::now())
            });
            state.clock.stop_write(ended);

            match res {
                Ok(0) => {
                    return Err(self.fail_write(state, io::ErrorKind::WriteZero.into()));
                }
                Ok(written) => {
                    let written = written.min(n);
                    state.ring.discard(written);
                    *sum += written as u64;
                    self.changed.notify_all();
                    trace!("wrote {} bytes, {} buffered", written, state.ring.len());
                }
                Err(e) => return Err(self.fail_write(state, e)),
            }
        }
    }

    fn flush<W: Write>(&self, state: &mut MutexGuard<'_, State>, sink: &mut W) -> Result<(), Error> {
        state.clock.start_write(Instant::now());
        let (res, ended) = MutexGuard::unlocked(state, || (sink.flush(), Instant::now()));
        state.clock.stop_write(ended);
        res.map_err(|e| self.fail_write(state, e))
    }

    /// Record a sink failure and wake a producer waiting for space.
    fn fail_write(&self, state: &mut MutexGuard<'_, State>, err: io::Error) -> Error {
        let err = Error::write(err);
        state.write_error = Some(err.clone());
        self.changed.notify_all();
        err
    }
}

/// `Read::read` that reissues calls interrupted by a signal.
fn read_retrying<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            // Retry if the call was interrupted.
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            res => return res,
        }
    }
}

fn write_retrying<W: Write>(sink: &mut W, buf: &[u8]) -> io::Result<usize> {
    loop {
        match sink.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            res => return res,
        }
    }
}
