use std::error;
use std::fmt::{self, Display, Formatter};

/// The error type for operations on a [`HashTable`](crate::HashTable).
///
/// Every failure is reported as one of these discrete codes. [`Error::errno`] gives the
/// conventional errno value for callers that marshal results across a syscall-like boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The element size (key + value + header) does not fit the element-size representation.
    TooLarge,
    /// Memory for the table or for a new element could not be obtained.
    OutOfMemory,
    /// The table already holds its maximum number of entries.
    Busy,
    /// [`UpdateFlags::NO_EXIST`](crate::UpdateFlags::NO_EXIST) was given, but the key is present.
    AlreadyExists,
    /// The key is absent, or there is no further key to iterate to.
    NotFound,
    /// A size, buffer length or flag bit is not acceptable for this table.
    InvalidArgument,
}

impl Error {
    /// Returns the (positive) errno value conventionally used for this error.
    pub fn errno(self) -> i32 {
        match self {
            Error::NotFound => 2,
            Error::TooLarge => 7,
            Error::OutOfMemory => 12,
            Error::Busy => 16,
            Error::AlreadyExists => 17,
            Error::InvalidArgument => 22,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let msg = match *self {
            Error::TooLarge => "element size overflows the element-size representation",
            Error::OutOfMemory => "out of memory",
            Error::Busy => "table is at its maximum number of entries",
            Error::AlreadyExists => "key already exists",
            Error::NotFound => "key not found",
            Error::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

impl error::Error for Error {
    #[inline]
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}
