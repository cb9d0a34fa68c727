//! Copy data from a reader to a writer while keeping track of how slow both
//! are.
//!
//! A [`MeasuringRingBuffer`] sits between one byte source and one byte sink.
//! Bytes move through a fixed-size ring; the time spent inside `read` and
//! inside `write` is accumulated separately, so a [`Stats`] snapshot tells
//! whether the source, the sink, or neither is the bottleneck.
//!
//! ```
//! use std::sync::Arc;
//! use measuring_ring_buffer::MeasuringRingBuffer;
//!
//! let buf = Arc::new(MeasuringRingBuffer::new(64).unwrap());
//! let mut out = Vec::new();
//! let copied = buf.copy(&mut out, &b"some bytes"[..]).into_result().unwrap();
//! assert_eq!(copied, 10);
//! assert_eq!(out, b"some bytes");
//!
//! let stats = buf.stats();
//! assert_eq!(stats.bytes_read, 10);
//! ```
//!
//! Each buffer is good for exactly one copy.

mod buffer;
mod circular_buffer;
mod error;
mod stats;

pub use buffer::{MeasuringRingBuffer, Transferred};
pub use error::Error;
pub use stats::Stats;
