// src/error.rs

use std::fmt;
use std::io;
use std::sync::Arc;

/// Error type for a measured copy.
///
/// I/O failures are kept behind an `Arc` so that one recorded failure can be
/// handed to both the producer and the consumer side.
#[derive(Debug, Clone)]
pub enum Error {
    /// The byte source failed.
    Read(Arc<io::Error>),
    /// The byte sink failed.
    Write(Arc<io::Error>),
    /// The buffer already had a producer or consumer attached.
    AlreadyUsed,
    /// A ring buffer needs room for at least one byte.
    InvalidCapacity,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Read(e) => write!(f, "read error: {}", e),
            Error::Write(e) => write!(f, "write error: {}", e),
            Error::AlreadyUsed => write!(f, "buffer has already been used for a copy"),
            Error::InvalidCapacity => write!(f, "buffer capacity must be at least one byte"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read(e) | Error::Write(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl Error {
    pub(crate) fn read(err: io::Error) -> Self {
        Error::Read(Arc::new(err))
    }

    pub(crate) fn write(err: io::Error) -> Self {
        Error::Write(Arc::new(err))
    }

    /// Maps the error to the exit status used by the `fv` binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Read(_) => 1,
            Error::Write(_) => 2,
            Error::AlreadyUsed => 3,
            Error::InvalidCapacity => 4,
        }
    }

    /// Kind of the underlying I/O error, if there is one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Read(e) | Error::Write(e) => Some(e.kind()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_tags_phase() {
        let err = Error::read(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(err.to_string(), "read error: disk on fire");

        let err = Error::write(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert_eq!(err.to_string(), "write error: pipe closed");
    }

    #[test]
    fn test_source_is_io_error() {
        let err = Error::write(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.source().is_some());
        assert_eq!(err.io_kind(), Some(io::ErrorKind::BrokenPipe));
        assert!(Error::AlreadyUsed.source().is_none());
        assert_eq!(Error::InvalidCapacity.io_kind(), None);
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            Error::read(io::ErrorKind::Other.into()).exit_code(),
            Error::write(io::ErrorKind::Other.into()).exit_code(),
            Error::AlreadyUsed.exit_code(),
            Error::InvalidCapacity.exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, 0);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
