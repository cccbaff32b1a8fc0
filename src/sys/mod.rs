//! Runtime-neutral filesystem vocabulary and the two capability sets every
//! backend implements: [`FileSystem`] for path-addressed operations and
//! [`File`] for operations on an open handle.
//!
//! Neither trait carries default method bodies. A backend or wrapper that
//! misses an operation does not compile.

mod errno;
mod oflag;
mod stat;

pub use errno::{classify, errno_code, Errno, SysResult};
pub use oflag::{AccessMode, OpenFlags};
pub use stat::{Dirent, FileType, Stat, Whence};

/// Path-addressed operations. All state lives in the backing store.
pub trait FileSystem: Send + Sync {
    /// Open `path`. Regular files and directories come back as different
    /// handle types; the choice is made once, here.
    fn open(&self, path: &str, flags: OpenFlags, perm: u32) -> SysResult<Box<dyn File>>;

    /// Stat `path`, following a trailing symlink.
    fn stat(&self, path: &str) -> SysResult<Stat>;

    /// Stat `path` without following a trailing symlink.
    fn lstat(&self, path: &str) -> SysResult<Stat>;

    fn mkdir(&self, path: &str, perm: u32) -> SysResult<()>;

    fn chmod(&self, path: &str, perm: u32) -> SysResult<()>;

    fn rename(&self, from: &str, to: &str) -> SysResult<()>;

    fn rmdir(&self, path: &str) -> SysResult<()>;

    fn unlink(&self, path: &str) -> SysResult<()>;

    fn link(&self, old_path: &str, new_path: &str) -> SysResult<()>;

    fn symlink(&self, target: &str, link_path: &str) -> SysResult<()>;

    fn readlink(&self, path: &str) -> SysResult<String>;

    /// Set access and modification times in nanoseconds. `None` leaves the
    /// corresponding time untouched.
    fn utimens(&self, path: &str, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()>;
}

/// Operations on one open resource.
///
/// After [`File::close`] every method fails with [`Errno::Invalid`], a
/// second `close` included. `is_append` keeps reporting the last value.
pub trait File: Send {
    fn dev(&mut self) -> SysResult<u64>;

    fn ino(&mut self) -> SysResult<u64>;

    fn is_dir(&mut self) -> SysResult<bool>;

    fn is_append(&self) -> bool;

    fn set_append(&mut self, enable: bool) -> SysResult<()>;

    fn stat(&mut self) -> SysResult<Stat>;

    /// Read at the current offset and advance it.
    fn read(&mut self, buf: &mut [u8]) -> SysResult<usize>;

    /// Read at `offset` without moving the current offset.
    fn pread(&mut self, buf: &mut [u8], offset: i64) -> SysResult<usize>;

    fn seek(&mut self, offset: i64, whence: Whence) -> SysResult<i64>;

    /// Next batch of at most `max` entries, or everything left when `max`
    /// is zero. An empty batch means the listing is exhausted; it does not
    /// start over.
    fn readdir(&mut self, max: usize) -> SysResult<Vec<Dirent>>;

    /// Write at the current offset, or at the end in append mode.
    fn write(&mut self, buf: &[u8]) -> SysResult<usize>;

    /// Write at `offset`. In append mode the offset is ignored and the data
    /// goes to the end of the file.
    fn pwrite(&mut self, buf: &[u8], offset: i64) -> SysResult<usize>;

    fn truncate(&mut self, size: i64) -> SysResult<()>;

    fn sync(&mut self) -> SysResult<()>;

    fn datasync(&mut self) -> SysResult<()>;

    fn utimens(&mut self, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()>;

    fn close(&mut self) -> SysResult<()>;
}
