//! Bridge between the neutral vocabulary and the `wasi:filesystem` types a
//! wasmtime host hands to and expects from its filesystem implementation.

use wasmtime_wasi::p2::bindings::clocks::wall_clock::Datetime;
use wasmtime_wasi::p2::bindings::filesystem::types::{
    DescriptorFlags, DescriptorStat, DescriptorType, DirectoryEntry, ErrorCode, OpenFlags,
    PathFlags,
};
use wasmtime_wasi::p2::{FsError, FsResult};

use crate::sys::{self, Dirent, Errno, File, FileSystem, FileType, Stat};

/// Permission bits used for files created through `open_at`, which carries
/// no mode of its own.
pub const DEFAULT_CREATE_PERM: u32 = 0o644;

impl From<Errno> for ErrorCode {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::NotFound => ErrorCode::NoEntry,
            Errno::Exist => ErrorCode::Exist,
            Errno::IsDirectory => ErrorCode::IsDirectory,
            Errno::Invalid => ErrorCode::Invalid,
            Errno::Io => ErrorCode::Io,
        }
    }
}

pub fn fs_error(errno: Errno) -> FsError {
    FsError::from(ErrorCode::from(errno))
}

pub fn descriptor_type(file_type: FileType) -> DescriptorType {
    match file_type {
        FileType::Regular => DescriptorType::RegularFile,
        FileType::Directory => DescriptorType::Directory,
        FileType::Symlink => DescriptorType::SymbolicLink,
        FileType::Unknown => DescriptorType::Unknown,
    }
}

/// Timestamps before the epoch have no WASI representation and are
/// reported as absent.
fn datetime(nanos: i64) -> Option<Datetime> {
    let nanos = u64::try_from(nanos).ok()?;
    Some(Datetime {
        seconds: nanos / 1_000_000_000,
        nanoseconds: (nanos % 1_000_000_000) as u32,
    })
}

pub fn descriptor_stat(stat: &Stat) -> DescriptorStat {
    DescriptorStat {
        type_: descriptor_type(stat.file_type),
        link_count: stat.nlink,
        size: stat.size,
        data_access_timestamp: datetime(stat.atim),
        data_modification_timestamp: datetime(stat.mtim),
        status_change_timestamp: datetime(stat.ctim),
    }
}

pub fn directory_entry(dirent: Dirent) -> DirectoryEntry {
    DirectoryEntry {
        type_: descriptor_type(dirent.file_type),
        name: dirent.name,
    }
}

/// Combine the three flag sets of `open-at` into neutral open flags.
///
/// `mutate-directory` has no neutral counterpart and is dropped. Without
/// `symlink-follow` the open is `NOFOLLOW`.
pub fn open_flags(
    path_flags: PathFlags,
    open_flags: OpenFlags,
    descriptor_flags: DescriptorFlags,
) -> sys::OpenFlags {
    let mut out = match (
        descriptor_flags.contains(DescriptorFlags::READ),
        descriptor_flags.contains(DescriptorFlags::WRITE),
    ) {
        (true, true) => sys::OpenFlags::RDWR,
        (false, true) => sys::OpenFlags::WRONLY,
        _ => sys::OpenFlags::RDONLY,
    };

    if !path_flags.contains(PathFlags::SYMLINK_FOLLOW) {
        out |= sys::OpenFlags::NOFOLLOW;
    }
    if open_flags.contains(OpenFlags::CREATE) {
        out |= sys::OpenFlags::CREAT;
    }
    if open_flags.contains(OpenFlags::DIRECTORY) {
        out |= sys::OpenFlags::DIRECTORY;
    }
    if open_flags.contains(OpenFlags::EXCLUSIVE) {
        out |= sys::OpenFlags::EXCL;
    }
    if open_flags.contains(OpenFlags::TRUNCATE) {
        out |= sys::OpenFlags::TRUNC;
    }
    if descriptor_flags.contains(DescriptorFlags::FILE_INTEGRITY_SYNC) {
        out |= sys::OpenFlags::SYNC;
    }
    if descriptor_flags.contains(DescriptorFlags::DATA_INTEGRITY_SYNC) {
        out |= sys::OpenFlags::DSYNC;
    }
    if descriptor_flags.contains(DescriptorFlags::REQUESTED_WRITE_SYNC) {
        out |= sys::OpenFlags::RSYNC;
    }
    out
}

/// `descriptor.open-at` over any [`FileSystem`].
pub fn open_at(
    fs: &dyn FileSystem,
    path_flags: PathFlags,
    path: &str,
    oflags: OpenFlags,
    descriptor_flags: DescriptorFlags,
) -> FsResult<Box<dyn File>> {
    let flags = open_flags(path_flags, oflags, descriptor_flags);
    fs.open(path, flags, DEFAULT_CREATE_PERM).map_err(fs_error)
}

/// `descriptor.stat-at` over any [`FileSystem`].
pub fn stat_at(fs: &dyn FileSystem, path_flags: PathFlags, path: &str) -> FsResult<DescriptorStat> {
    let stat = if path_flags.contains(PathFlags::SYMLINK_FOLLOW) {
        fs.stat(path)
    } else {
        fs.lstat(path)
    };
    stat.map(|s| descriptor_stat(&s)).map_err(fs_error)
}

/// Drain a directory handle into WASI directory entries.
pub fn read_directory(dir: &mut dyn File) -> FsResult<Vec<DirectoryEntry>> {
    let entries = dir.readdir(0).map_err(fs_error)?;
    Ok(entries.into_iter().map(directory_entry).collect())
}
