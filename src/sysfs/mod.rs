//! Passthrough to the host operating system, rooted at one directory.

mod file;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use file::{SysDir, SysFile};

use crate::path;
use crate::sys::{classify, AccessMode, Errno, File, FileSystem, FileType, OpenFlags, Stat, SysResult};

/// Map neutral open flags onto the host's `O_*` bits.
///
/// Every neutral flag has a host counterpart except RSYNC outside Linux,
/// where it is dropped. `RDWR | WRONLY` maps to `O_RDWR`; callers reject
/// that combination before getting here.
#[cfg(unix)]
pub fn to_native_flags(flags: OpenFlags) -> libc::c_int {
    let mut out = if flags.contains(OpenFlags::RDWR) {
        libc::O_RDWR
    } else if flags.contains(OpenFlags::WRONLY) {
        libc::O_WRONLY
    } else {
        libc::O_RDONLY
    };
    let table = [
        (OpenFlags::APPEND, libc::O_APPEND),
        (OpenFlags::CREAT, libc::O_CREAT),
        (OpenFlags::DIRECTORY, libc::O_DIRECTORY),
        (OpenFlags::DSYNC, libc::O_DSYNC),
        (OpenFlags::EXCL, libc::O_EXCL),
        (OpenFlags::NOFOLLOW, libc::O_NOFOLLOW),
        (OpenFlags::NONBLOCK, libc::O_NONBLOCK),
        (OpenFlags::SYNC, libc::O_SYNC),
        (OpenFlags::TRUNC, libc::O_TRUNC),
    ];
    for (neutral, native) in table {
        if flags.contains(neutral) {
            out |= native;
        }
    }
    #[cfg(target_os = "linux")]
    {
        if flags.contains(OpenFlags::RSYNC) {
            out |= libc::O_RSYNC;
        }
    }
    out
}

/// Decode host `O_*` bits back into the neutral access mode and the
/// APPEND, CREAT, EXCL and TRUNC flags.
#[cfg(unix)]
pub fn from_native_flags(native: libc::c_int) -> OpenFlags {
    let mode = match native & libc::O_ACCMODE {
        libc::O_RDWR => AccessMode::ReadWrite,
        libc::O_WRONLY => AccessMode::WriteOnly,
        _ => AccessMode::ReadOnly,
    };
    let mut out = mode.flags();
    for (neutral, bit) in [
        (OpenFlags::APPEND, libc::O_APPEND),
        (OpenFlags::CREAT, libc::O_CREAT),
        (OpenFlags::EXCL, libc::O_EXCL),
        (OpenFlags::TRUNC, libc::O_TRUNC),
    ] {
        if native & bit != 0 {
            out |= neutral;
        }
    }
    out
}

/// Build `OpenOptions` for `flags`. On unix the creation and status bits
/// travel as raw `O_*` flags so that POSIX combinations std would reject
/// (such as `O_RDONLY|O_CREAT`) still reach the kernel.
#[cfg(unix)]
fn open_options(flags: OpenFlags, mode: AccessMode, perm: u32) -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options
        .read(mode.readable())
        .write(mode.writable())
        .custom_flags(to_native_flags(flags) & !libc::O_ACCMODE)
        .mode(perm);
    options
}

#[cfg(not(unix))]
fn open_options(flags: OpenFlags, mode: AccessMode, _perm: u32) -> OpenOptions {
    let mut options = OpenOptions::new();
    options
        .read(mode.readable())
        .write(mode.writable())
        .append(flags.contains(OpenFlags::APPEND) && mode.writable())
        .create(flags.contains(OpenFlags::CREAT) && !flags.contains(OpenFlags::EXCL))
        .create_new(flags.contains(OpenFlags::CREAT | OpenFlags::EXCL))
        .truncate(flags.contains(OpenFlags::TRUNC));
    options
}

#[cfg(unix)]
fn timespec(nanos: Option<i64>) -> libc::timespec {
    // SAFETY: timespec is plain data; zero is a valid value for every field.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    match nanos {
        Some(nanos) => {
            ts.tv_sec = nanos.div_euclid(1_000_000_000) as libc::time_t;
            ts.tv_nsec = nanos.rem_euclid(1_000_000_000) as _;
        }
        None => ts.tv_nsec = libc::UTIME_OMIT as _,
    }
    ts
}

/// Set times on `path` without opening it, following a final symlink.
#[cfg(unix)]
pub(crate) fn set_path_times(path: &Path, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::Invalid)?;
    let times = [timespec(atim), timespec(mtim)];
    // SAFETY: `c_path` is NUL-terminated and `times` holds the two entries
    // utimensat reads.
    let rc = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), 0) };
    if rc != 0 {
        return Err(errno(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_path_times(path: &Path, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
    let file = fs::File::open(path).map_err(errno)?;
    file::set_times(&file, atim, mtim)
}

pub(crate) fn system_time(nanos: i64) -> SystemTime {
    let offset = Duration::from_nanos(nanos.unsigned_abs());
    if nanos >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH.checked_sub(offset).unwrap_or(UNIX_EPOCH)
    }
}

#[cfg(not(unix))]
fn unix_nanos(time: std::io::Result<SystemTime>) -> i64 {
    match time.map(|t| t.duration_since(UNIX_EPOCH)) {
        Ok(Ok(d)) => d.as_nanos() as i64,
        Ok(Err(before)) => -(before.duration().as_nanos() as i64),
        Err(_) => 0,
    }
}

fn file_type(ft: fs::FileType) -> FileType {
    if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_dir() {
        FileType::Directory
    } else if ft.is_file() {
        FileType::Regular
    } else {
        FileType::Unknown
    }
}

/// Translate host metadata into a [`Stat`].
#[cfg(unix)]
pub fn stat_from_metadata(md: &fs::Metadata) -> Stat {
    use std::os::unix::fs::MetadataExt;

    let nanos = |secs: i64, nsec: i64| secs.saturating_mul(1_000_000_000).saturating_add(nsec);
    Stat {
        dev: md.dev(),
        ino: md.ino(),
        file_type: file_type(md.file_type()),
        perm: md.mode() & 0o7777,
        nlink: md.nlink(),
        size: md.size(),
        atim: nanos(md.atime(), md.atime_nsec()),
        mtim: nanos(md.mtime(), md.mtime_nsec()),
        ctim: nanos(md.ctime(), md.ctime_nsec()),
    }
}

/// Translate host metadata into a [`Stat`]. Device and inode are not
/// exposed here and read as zero.
#[cfg(not(unix))]
pub fn stat_from_metadata(md: &fs::Metadata) -> Stat {
    let perm = if md.permissions().readonly() { 0o555 } else { 0o755 };
    let mtim = unix_nanos(md.modified());
    Stat {
        dev: 0,
        ino: 0,
        file_type: file_type(md.file_type()),
        perm,
        nlink: 1,
        size: md.len(),
        atim: unix_nanos(md.accessed()),
        mtim,
        ctim: mtim,
    }
}

fn errno(err: std::io::Error) -> Errno {
    classify(&err)
}

/// Host directory exposed as a [`FileSystem`]. Guest paths resolve below
/// `root`; a leading `/` names the root itself.
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &str) -> PathBuf {
        let path = path::normalize(path);
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}

impl FileSystem for DirFs {
    fn open(&self, path: &str, flags: OpenFlags, perm: u32) -> SysResult<Box<dyn File>> {
        let mode = flags.access_mode()?;
        let host = self.host_path(path);

        #[cfg(windows)]
        {
            if fs::metadata(&host).map(|md| md.is_dir()).unwrap_or(false) {
                if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) {
                    return Err(Errno::Exist);
                }
                if mode.writable() {
                    return Err(Errno::IsDirectory);
                }
                return Ok(Box::new(SysDir::new(host)));
            }
        }

        let file = open_options(flags, mode, perm).open(&host).map_err(errno)?;
        let is_dir = file.metadata().map_err(errno)?.is_dir();
        if is_dir {
            if mode.writable() {
                return Err(Errno::IsDirectory);
            }
            return Ok(Box::new(SysDir::new(host)));
        }
        Ok(Box::new(SysFile::new(
            file,
            host,
            mode,
            flags.contains(OpenFlags::APPEND),
        )))
    }

    fn stat(&self, path: &str) -> SysResult<Stat> {
        let md = fs::metadata(self.host_path(path)).map_err(errno)?;
        Ok(stat_from_metadata(&md))
    }

    fn lstat(&self, path: &str) -> SysResult<Stat> {
        let md = fs::symlink_metadata(self.host_path(path)).map_err(errno)?;
        Ok(stat_from_metadata(&md))
    }

    fn mkdir(&self, path: &str, perm: u32) -> SysResult<()> {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;
        builder.create(self.host_path(path)).map_err(errno)
    }

    fn chmod(&self, path: &str, perm: u32) -> SysResult<()> {
        let host = self.host_path(path);
        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            fs::Permissions::from_mode(perm & 0o7777)
        };
        #[cfg(not(unix))]
        let permissions = {
            let mut permissions = fs::metadata(&host).map_err(errno)?.permissions();
            permissions.set_readonly(perm & 0o222 == 0);
            permissions
        };
        fs::set_permissions(host, permissions).map_err(errno)
    }

    fn rename(&self, from: &str, to: &str) -> SysResult<()> {
        fs::rename(self.host_path(from), self.host_path(to)).map_err(errno)
    }

    fn rmdir(&self, path: &str) -> SysResult<()> {
        fs::remove_dir(self.host_path(path)).map_err(errno)
    }

    fn unlink(&self, path: &str) -> SysResult<()> {
        fs::remove_file(self.host_path(path)).map_err(errno)
    }

    fn link(&self, old_path: &str, new_path: &str) -> SysResult<()> {
        fs::hard_link(self.host_path(old_path), self.host_path(new_path)).map_err(errno)
    }

    /// The target is stored as given, so relative links stay relative.
    fn symlink(&self, target: &str, link_path: &str) -> SysResult<()> {
        let target = path::normalize(target);
        let link = self.host_path(link_path);
        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(&*target, link);
        #[cfg(windows)]
        let result = std::os::windows::fs::symlink_file(&*target, link);
        result.map_err(errno)
    }

    fn readlink(&self, path: &str) -> SysResult<String> {
        let target = fs::read_link(self.host_path(path)).map_err(errno)?;
        let target = target.to_string_lossy();
        Ok(path::to_posix_path(&target).into_owned())
    }

    fn utimens(&self, path: &str, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
        set_path_times(&self.host_path(path), atim, mtim)
    }
}
