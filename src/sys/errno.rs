use std::io;

use serde::{Deserialize, Serialize};

/// Result of every adapter and decorator operation. `Ok` is the "no error"
/// sentinel (errno 0).
pub type SysResult<T> = Result<T, Errno>;

/// The closed set of error codes visible above the adapter boundary.
///
/// Variants are declared in precedence order: when a native failure could
/// be read as more than one of them, the earlier variant wins.
#[derive(thiserror::Error, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Errno {
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    Exist,
    #[error("is a directory")]
    IsDirectory,
    #[error("invalid argument")]
    Invalid,
    #[error("I/O error")]
    Io,
}

impl Errno {
    /// POSIX symbol, as printed in log records.
    pub fn name(self) -> &'static str {
        match self {
            Errno::NotFound => "ENOENT",
            Errno::Exist => "EEXIST",
            Errno::IsDirectory => "EISDIR",
            Errno::Invalid => "EINVAL",
            Errno::Io => "EIO",
        }
    }

    /// WASI preview 1 errno number.
    pub fn code(self) -> u16 {
        match self {
            Errno::NotFound => 44,
            Errno::Exist => 20,
            Errno::IsDirectory => 31,
            Errno::Invalid => 28,
            Errno::Io => 29,
        }
    }
}

/// Numeric errno of a result: `0` on success.
pub fn errno_code<T>(result: &SysResult<T>) -> u16 {
    match result {
        Ok(_) => 0,
        Err(errno) => errno.code(),
    }
}

/// Map a native error onto the closed [`Errno`] set.
///
/// Rules are tried in order: not found, already exists, is a directory,
/// invalid argument. Raw OS error numbers are consulted for the same four
/// classes when the error kind is not specific enough. Anything left over
/// is [`Errno::Io`].
pub fn classify(err: &io::Error) -> Errno {
    match err.kind() {
        io::ErrorKind::NotFound => return Errno::NotFound,
        io::ErrorKind::AlreadyExists => return Errno::Exist,
        io::ErrorKind::IsADirectory => return Errno::IsDirectory,
        io::ErrorKind::InvalidInput | io::ErrorKind::NotADirectory => return Errno::Invalid,
        _ => {}
    }

    if let Some(errno) = err.raw_os_error().and_then(classify_raw) {
        return errno;
    }

    tracing::debug!(error = %err, kind = ?err.kind(), "unclassified native error, reporting EIO");
    Errno::Io
}

#[cfg(unix)]
fn classify_raw(raw: i32) -> Option<Errno> {
    match raw {
        libc::ENOENT => Some(Errno::NotFound),
        libc::EEXIST => Some(Errno::Exist),
        libc::EISDIR => Some(Errno::IsDirectory),
        libc::EINVAL | libc::ENOTDIR => Some(Errno::Invalid),
        _ => None,
    }
}

#[cfg(not(unix))]
fn classify_raw(_raw: i32) -> Option<Errno> {
    None
}
