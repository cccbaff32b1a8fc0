//! Memory-only filesystem.
//!
//! [`MemFs`] adapts the tree in [`store`] to the neutral vocabulary. Opening
//! a directory yields a [`MemDir`]; everything else yields a [`MemFile`].

mod store;

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

pub use store::{FileInfo, MemHandle, MemStore, NodeKind, StoreFlags, MAX_FILE_SIZE};

use crate::path;
use crate::sys::{
    classify, AccessMode, Dirent, Errno, File, FileSystem, FileType, OpenFlags, Stat, SysResult,
    Whence,
};

/// Device number reported for every memfs node.
pub const MEMFS_DEV: u64 = 1;

/// Map neutral open flags onto the store's flags.
///
/// DIRECTORY, DSYNC, NOFOLLOW, NONBLOCK and RSYNC have no store
/// equivalent and are dropped; [`MemFs::open`] handles DIRECTORY itself.
/// Exclusivity of the access bits is checked by the caller, so
/// `RDWR | WRONLY` simply maps to read-write here.
pub fn to_store_flags(flags: OpenFlags) -> StoreFlags {
    let mut out = if flags.contains(OpenFlags::RDWR) {
        StoreFlags::READ | StoreFlags::WRITE
    } else if flags.contains(OpenFlags::WRONLY) {
        StoreFlags::WRITE
    } else {
        StoreFlags::READ
    };
    if flags.contains(OpenFlags::APPEND) {
        out |= StoreFlags::APPEND;
    }
    if flags.contains(OpenFlags::CREAT) {
        out |= StoreFlags::CREATE;
    }
    if flags.contains(OpenFlags::EXCL) {
        out |= StoreFlags::EXCL;
    }
    if flags.contains(OpenFlags::TRUNC) {
        out |= StoreFlags::TRUNC;
    }
    if flags.contains(OpenFlags::SYNC) {
        out |= StoreFlags::SYNC;
    }
    out
}

/// Inverse of [`to_store_flags`] for the bits the store keeps.
pub fn from_store_flags(flags: StoreFlags) -> OpenFlags {
    let mode = match (
        flags.contains(StoreFlags::READ),
        flags.contains(StoreFlags::WRITE),
    ) {
        (_, false) => AccessMode::ReadOnly,
        (false, true) => AccessMode::WriteOnly,
        (true, true) => AccessMode::ReadWrite,
    };
    let mut out = mode.flags();
    for (store, neutral) in [
        (StoreFlags::APPEND, OpenFlags::APPEND),
        (StoreFlags::CREATE, OpenFlags::CREAT),
        (StoreFlags::EXCL, OpenFlags::EXCL),
        (StoreFlags::TRUNC, OpenFlags::TRUNC),
        (StoreFlags::SYNC, OpenFlags::SYNC),
    ] {
        if flags.contains(store) {
            out |= neutral;
        }
    }
    out
}

fn canonical(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    format!("/{}", parts.join("/"))
}

/// Stable stand-in inode: the store has none, so hash the path.
///
/// Two names for one node (hard links) get two values. An open handle keeps
/// the value of the path it was opened by, so after a rename its `ino` no
/// longer matches a stat of the new path.
fn fake_ino(path: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    canonical(path).hash(&mut hasher);
    hasher.finish().max(1)
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::File => FileType::Regular,
        NodeKind::Dir => FileType::Directory,
        NodeKind::Symlink => FileType::Symlink,
    }
}

/// Translate store info for `path` into a [`Stat`].
pub fn to_stat(path: &str, info: &FileInfo) -> Stat {
    Stat {
        dev: MEMFS_DEV,
        ino: fake_ino(path),
        file_type: file_type(info.kind),
        perm: info.mode & 0o7777,
        nlink: info.nlink,
        size: info.size,
        atim: info.atime,
        mtim: info.mtime,
        ctim: info.ctime,
    }
}

fn to_dirent(dir: &str, info: FileInfo) -> Dirent {
    let ino = fake_ino(&format!("{}/{}", canonical(dir), info.name));
    Dirent {
        ino,
        file_type: file_type(info.kind),
        name: info.name,
    }
}

fn errno(err: std::io::Error) -> Errno {
    classify(&err)
}

fn offset(value: i64) -> SysResult<u64> {
    u64::try_from(value).map_err(|_| Errno::Invalid)
}

pub struct MemFs {
    store: Arc<MemStore>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            store: MemStore::new(),
        }
    }

    /// Create or replace the file at `path` with `content`.
    pub fn write_file(&self, path: &str, content: &[u8]) -> SysResult<()> {
        let path = path::normalize(path);
        let flags = StoreFlags::WRITE | StoreFlags::CREATE | StoreFlags::TRUNC;
        let mut handle = self.store.open_file(&path, flags, 0o644).map_err(errno)?;
        handle.write_all(content).map_err(errno)
    }

    /// Whole content of the file at `path`.
    pub fn read_file(&self, path: &str) -> SysResult<Vec<u8>> {
        let path = path::normalize(path);
        let mut handle = self
            .store
            .open_file(&path, StoreFlags::READ, 0)
            .map_err(errno)?;
        let mut content = Vec::new();
        handle.read_to_end(&mut content).map_err(errno)?;
        Ok(content)
    }

    fn open_dir(&self, path: String, mode: AccessMode) -> SysResult<Box<dyn File>> {
        if mode.writable() {
            return Err(Errno::IsDirectory);
        }
        Ok(Box::new(MemDir::new(Arc::clone(&self.store), path)))
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str, flags: OpenFlags, perm: u32) -> SysResult<Box<dyn File>> {
        let mode = flags.access_mode()?;
        let path = path::normalize(path).into_owned();

        if flags.contains(OpenFlags::DIRECTORY) {
            let info = self.store.stat(&path).map_err(errno)?;
            if !info.is_dir() {
                return Err(Errno::Invalid);
            }
            return self.open_dir(path, mode);
        }

        match self.store.open_file(&path, to_store_flags(flags), perm) {
            Ok(handle) => Ok(Box::new(MemFile::new(handle, path))),
            Err(err) => match classify(&err) {
                Errno::IsDirectory => self.open_dir(path, mode),
                errno => Err(errno),
            },
        }
    }

    fn stat(&self, path: &str) -> SysResult<Stat> {
        let path = path::normalize(path);
        let info = self.store.stat(&path).map_err(errno)?;
        Ok(to_stat(&path, &info))
    }

    fn lstat(&self, path: &str) -> SysResult<Stat> {
        let path = path::normalize(path);
        let info = self.store.lstat(&path).map_err(errno)?;
        Ok(to_stat(&path, &info))
    }

    fn mkdir(&self, path: &str, perm: u32) -> SysResult<()> {
        self.store.mkdir(&path::normalize(path), perm).map_err(errno)
    }

    fn chmod(&self, path: &str, perm: u32) -> SysResult<()> {
        self.store.chmod(&path::normalize(path), perm).map_err(errno)
    }

    fn rename(&self, from: &str, to: &str) -> SysResult<()> {
        self.store
            .rename(&path::normalize(from), &path::normalize(to))
            .map_err(errno)
    }

    fn rmdir(&self, path: &str) -> SysResult<()> {
        self.store.remove_dir(&path::normalize(path)).map_err(errno)
    }

    fn unlink(&self, path: &str) -> SysResult<()> {
        self.store.remove_file(&path::normalize(path)).map_err(errno)
    }

    fn link(&self, old_path: &str, new_path: &str) -> SysResult<()> {
        self.store
            .link(&path::normalize(old_path), &path::normalize(new_path))
            .map_err(errno)
    }

    fn symlink(&self, target: &str, link_path: &str) -> SysResult<()> {
        self.store
            .symlink(&path::normalize(target), &path::normalize(link_path))
            .map_err(errno)
    }

    fn readlink(&self, path: &str) -> SysResult<String> {
        self.store.readlink(&path::normalize(path)).map_err(errno)
    }

    fn utimens(&self, path: &str, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
        self.store
            .set_times(&path::normalize(path), atim, mtim)
            .map_err(errno)
    }
}

/// Open regular file in a [`MemFs`].
pub struct MemFile {
    handle: Option<MemHandle>,
    path: String,
    append: bool,
}

impl MemFile {
    fn new(handle: MemHandle, path: String) -> Self {
        let append = handle.flags().contains(StoreFlags::APPEND);
        Self {
            handle: Some(handle),
            path,
            append,
        }
    }

    fn handle(&mut self) -> SysResult<&mut MemHandle> {
        self.handle.as_mut().ok_or(Errno::Invalid)
    }
}

impl File for MemFile {
    fn dev(&mut self) -> SysResult<u64> {
        self.handle()?;
        Ok(MEMFS_DEV)
    }

    fn ino(&mut self) -> SysResult<u64> {
        self.handle()?;
        Ok(fake_ino(&self.path))
    }

    fn is_dir(&mut self) -> SysResult<bool> {
        self.handle()?;
        Ok(false)
    }

    fn is_append(&self) -> bool {
        self.append
    }

    fn set_append(&mut self, enable: bool) -> SysResult<()> {
        self.handle()?.set_append(enable);
        self.append = enable;
        Ok(())
    }

    fn stat(&mut self) -> SysResult<Stat> {
        let path = self.path.clone();
        let info = self.handle()?.info(&path).map_err(errno)?;
        Ok(to_stat(&path, &info))
    }

    fn read(&mut self, buf: &mut [u8]) -> SysResult<usize> {
        self.handle()?.read(buf).map_err(errno)
    }

    fn pread(&mut self, buf: &mut [u8], offset: i64) -> SysResult<usize> {
        let offset = self::offset(offset)?;
        self.handle()?.read_at(buf, offset).map_err(errno)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> SysResult<i64> {
        let pos = match whence {
            Whence::Start => SeekFrom::Start(self::offset(offset)?),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        let new_offset = self.handle()?.seek(pos).map_err(errno)?;
        i64::try_from(new_offset).map_err(|_| Errno::Invalid)
    }

    fn readdir(&mut self, _max: usize) -> SysResult<Vec<Dirent>> {
        self.handle()?;
        Err(Errno::Invalid)
    }

    fn write(&mut self, buf: &[u8]) -> SysResult<usize> {
        self.handle()?.write(buf).map_err(errno)
    }

    fn pwrite(&mut self, buf: &[u8], offset: i64) -> SysResult<usize> {
        let offset = self::offset(offset)?;
        let append = self.append;
        let handle = self.handle()?;
        if append {
            handle.write_end(buf).map_err(errno)?;
            return Ok(buf.len());
        }
        handle.write_at(buf, offset).map_err(errno)
    }

    fn truncate(&mut self, size: i64) -> SysResult<()> {
        let size = offset(size)?;
        self.handle()?.set_len(size).map_err(errno)
    }

    fn sync(&mut self) -> SysResult<()> {
        self.handle()?.flush().map_err(errno)
    }

    fn datasync(&mut self) -> SysResult<()> {
        self.handle()?.flush().map_err(errno)
    }

    fn utimens(&mut self, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
        self.handle()?.set_times(atim, mtim).map_err(errno)
    }

    fn close(&mut self) -> SysResult<()> {
        self.handle.take().map(drop).ok_or(Errno::Invalid)
    }
}

/// Open directory in a [`MemFs`]. Supports listing and metadata only.
pub struct MemDir {
    store: Arc<MemStore>,
    path: String,
    pending: Option<VecDeque<Dirent>>,
    closed: bool,
}

impl MemDir {
    fn new(store: Arc<MemStore>, path: String) -> Self {
        Self {
            store,
            path,
            pending: None,
            closed: false,
        }
    }

    fn check_open(&self) -> SysResult<()> {
        if self.closed {
            Err(Errno::Invalid)
        } else {
            Ok(())
        }
    }
}

impl File for MemDir {
    fn dev(&mut self) -> SysResult<u64> {
        self.check_open()?;
        Ok(MEMFS_DEV)
    }

    fn ino(&mut self) -> SysResult<u64> {
        self.check_open()?;
        Ok(fake_ino(&self.path))
    }

    fn is_dir(&mut self) -> SysResult<bool> {
        self.check_open()?;
        Ok(true)
    }

    fn is_append(&self) -> bool {
        false
    }

    fn set_append(&mut self, _enable: bool) -> SysResult<()> {
        self.check_open()?;
        Err(Errno::IsDirectory)
    }

    fn stat(&mut self) -> SysResult<Stat> {
        self.check_open()?;
        let info = self.store.stat(&self.path).map_err(errno)?;
        Ok(to_stat(&self.path, &info))
    }

    fn read(&mut self, _buf: &mut [u8]) -> SysResult<usize> {
        self.check_open()?;
        Err(Errno::IsDirectory)
    }

    fn pread(&mut self, _buf: &mut [u8], _offset: i64) -> SysResult<usize> {
        self.check_open()?;
        Err(Errno::IsDirectory)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> SysResult<i64> {
        self.check_open()?;
        Err(Errno::IsDirectory)
    }

    fn readdir(&mut self, max: usize) -> SysResult<Vec<Dirent>> {
        self.check_open()?;
        if self.pending.is_none() {
            let entries = self.store.read_dir(&self.path).map_err(errno)?;
            let path = &self.path;
            self.pending = Some(entries.into_iter().map(|e| to_dirent(path, e)).collect());
        }
        let pending = self.pending.get_or_insert_with(VecDeque::new);
        let take = if max == 0 { pending.len() } else { max.min(pending.len()) };
        Ok(pending.drain(..take).collect())
    }

    fn write(&mut self, _buf: &[u8]) -> SysResult<usize> {
        self.check_open()?;
        Err(Errno::IsDirectory)
    }

    fn pwrite(&mut self, _buf: &[u8], _offset: i64) -> SysResult<usize> {
        self.check_open()?;
        Err(Errno::IsDirectory)
    }

    fn truncate(&mut self, _size: i64) -> SysResult<()> {
        self.check_open()?;
        Err(Errno::IsDirectory)
    }

    fn sync(&mut self) -> SysResult<()> {
        self.check_open()
    }

    fn datasync(&mut self) -> SysResult<()> {
        self.check_open()
    }

    fn utimens(&mut self, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
        self.check_open()?;
        self.store.set_times(&self.path, atim, mtim).map_err(errno)
    }

    fn close(&mut self) -> SysResult<()> {
        self.check_open()?;
        self.closed = true;
        self.pending = None;
        Ok(())
    }
}
