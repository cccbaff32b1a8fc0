//! Memory-resident tree that backs [`super::MemFs`].
//!
//! The store speaks its own vocabulary: [`StoreFlags`] for opening and
//! `std::io::Error` for failures. Its info records carry no device or inode
//! numbers. One mutex guards the whole tree; that lock is the only
//! synchronization between concurrent callers.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;

type NodeId = u64;

const ROOT: NodeId = 1;
const MAX_SYMLINK_HOPS: usize = 40;

/// Largest file the store will grow to. Writes and truncates past it fail
/// with `ErrorKind::InvalidInput` instead of reaching the allocator.
pub const MAX_FILE_SIZE: u64 = 1 << 32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StoreFlags: u32 {
        const READ = 1;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const CREATE = 1 << 3;
        const EXCL = 1 << 4;
        const TRUNC = 1 << 5;
        const SYNC = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
    Symlink,
}

/// What the store reports about a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub mode: u32,
    pub nlink: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }
}

enum Content {
    File(Vec<u8>),
    Dir {
        parent: NodeId,
        entries: BTreeMap<String, NodeId>,
    },
    Symlink(String),
}

struct Node {
    content: Content,
    mode: u32,
    nlink: u64,
    open: usize,
    atime: i64,
    mtime: i64,
    ctime: i64,
}

impl Node {
    fn new(content: Content, mode: u32) -> Self {
        let now = now();
        let nlink = match content {
            Content::Dir { .. } => 2,
            _ => 1,
        };
        Self {
            content,
            mode: mode & 0o7777,
            nlink,
            open: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    fn kind(&self) -> NodeKind {
        match self.content {
            Content::File(_) => NodeKind::File,
            Content::Dir { .. } => NodeKind::Dir,
            Content::Symlink(_) => NodeKind::Symlink,
        }
    }

    fn info(&self, name: &str) -> FileInfo {
        let size = match &self.content {
            Content::File(data) => data.len() as u64,
            Content::Dir { .. } => 0,
            Content::Symlink(target) => target.len() as u64,
        };
        FileInfo {
            name: name.to_string(),
            kind: self.kind(),
            size,
            mode: self.mode,
            nlink: self.nlink,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn components(path: &str) -> VecDeque<String> {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(str::to_string)
        .collect()
}

fn base_name(path: &str) -> String {
    components(path)
        .pop_back()
        .unwrap_or_else(|| "/".to_string())
}

fn too_large() -> io::Error {
    io::Error::new(ErrorKind::InvalidInput, "file too large")
}

/// End of a `len`-byte write at `start`, checked against [`MAX_FILE_SIZE`].
fn checked_end(start: u64, len: usize) -> io::Result<usize> {
    start
        .checked_add(len as u64)
        .filter(|end| *end <= MAX_FILE_SIZE)
        .and_then(|end| usize::try_from(end).ok())
        .ok_or_else(too_large)
}

fn truncate_denied() -> io::Error {
    io::Error::new(ErrorKind::InvalidInput, "truncate requires write access")
}

fn stale_handle() -> io::Error {
    io::Error::other("node no longer exists")
}

struct Tree {
    nodes: HashMap<NodeId, Node>,
    next_id: NodeId,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT,
            Node::new(
                Content::Dir {
                    parent: ROOT,
                    entries: BTreeMap::new(),
                },
                0o755,
            ),
        );
        Self {
            nodes,
            next_id: ROOT + 1,
        }
    }

    fn node(&self, id: NodeId) -> io::Result<&Node> {
        self.nodes.get(&id).ok_or_else(stale_handle)
    }

    fn node_mut(&mut self, id: NodeId) -> io::Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or_else(stale_handle)
    }

    fn entries(&self, dir: NodeId) -> io::Result<&BTreeMap<String, NodeId>> {
        match &self.node(dir)?.content {
            Content::Dir { entries, .. } => Ok(entries),
            _ => Err(ErrorKind::NotADirectory.into()),
        }
    }

    fn entries_mut(&mut self, dir: NodeId) -> io::Result<&mut BTreeMap<String, NodeId>> {
        match &mut self.node_mut(dir)?.content {
            Content::Dir { entries, .. } => Ok(entries),
            _ => Err(ErrorKind::NotADirectory.into()),
        }
    }

    fn parent_of(&self, dir: NodeId) -> io::Result<NodeId> {
        match &self.node(dir)?.content {
            Content::Dir { parent, .. } => Ok(*parent),
            _ => Err(ErrorKind::NotADirectory.into()),
        }
    }

    fn lookup(&self, dir: NodeId, name: &str) -> io::Result<NodeId> {
        self.entries(dir)?
            .get(name)
            .copied()
            .ok_or_else(|| ErrorKind::NotFound.into())
    }

    /// Walk `path` from the root. Intermediate symlinks are always
    /// followed; the last one only when `follow_last` is set.
    fn resolve(&self, path: &str, follow_last: bool) -> io::Result<NodeId> {
        let mut pending = components(path);
        let mut cur = ROOT;
        let mut hops = 0;

        while let Some(name) = pending.pop_front() {
            if name == ".." {
                cur = self.parent_of(cur)?;
                continue;
            }
            let child = self.lookup(cur, &name)?;
            if let Content::Symlink(target) = &self.node(child)?.content {
                if !pending.is_empty() || follow_last {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    if target.starts_with('/') {
                        cur = ROOT;
                    }
                    let mut next = components(target);
                    next.extend(pending.drain(..));
                    pending = next;
                    continue;
                }
            }
            cur = child;
        }
        Ok(cur)
    }

    /// Resolve the directory that holds the last component of `path`.
    fn resolve_parent(&self, path: &str) -> io::Result<(NodeId, String)> {
        let mut parts = components(path);
        let name = match parts.pop_back() {
            Some(name) if name != ".." => name,
            _ => {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    "path has no final component",
                ))
            }
        };
        let parent_path = parts.into_iter().collect::<Vec<_>>().join("/");
        let parent = self.resolve(&parent_path, true)?;
        self.entries(parent)?;
        Ok((parent, name))
    }

    fn insert(&mut self, parent: NodeId, name: String, node: Node) -> io::Result<NodeId> {
        if self.entries(parent)?.contains_key(&name) {
            return Err(ErrorKind::AlreadyExists.into());
        }
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        self.entries_mut(parent)?.insert(name, id);
        self.touch(parent)?;
        Ok(id)
    }

    fn touch(&mut self, id: NodeId) -> io::Result<()> {
        let node = self.node_mut(id)?;
        let now = now();
        node.mtime = now;
        node.ctime = now;
        Ok(())
    }

    /// Drop `id` once nothing links to it and no handle has it open.
    fn release(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get(&id) {
            if node.nlink == 0 && node.open == 0 {
                self.nodes.remove(&id);
            }
        }
    }

    fn unlink_entry(&mut self, parent: NodeId, name: &str, id: NodeId) -> io::Result<()> {
        self.entries_mut(parent)?.remove(name);
        self.touch(parent)?;
        let node = self.node_mut(id)?;
        node.nlink = match node.content {
            Content::Dir { .. } => 0,
            _ => node.nlink.saturating_sub(1),
        };
        node.ctime = now();
        self.release(id);
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, mut dir: NodeId) -> io::Result<bool> {
        loop {
            if dir == ancestor {
                return Ok(true);
            }
            if dir == ROOT {
                return Ok(false);
            }
            dir = self.parent_of(dir)?;
        }
    }
}

pub struct MemStore {
    tree: Mutex<Tree>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tree: Mutex::new(Tree::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a regular file. Directories are refused with
    /// `ErrorKind::IsADirectory` before anything is created or truncated.
    pub fn open_file(self: &Arc<Self>, path: &str, flags: StoreFlags, perm: u32) -> io::Result<MemHandle> {
        let trunc_denied = flags.contains(StoreFlags::TRUNC) && !flags.contains(StoreFlags::WRITE);
        let mut tree = self.lock();
        let id = match tree.resolve(path, true) {
            Ok(id) => {
                if flags.contains(StoreFlags::CREATE | StoreFlags::EXCL) {
                    return Err(ErrorKind::AlreadyExists.into());
                }
                if tree.node(id)?.kind() == NodeKind::Dir {
                    return Err(ErrorKind::IsADirectory.into());
                }
                id
            }
            Err(err) if err.kind() == ErrorKind::NotFound && flags.contains(StoreFlags::CREATE) => {
                let (parent, name) = tree.resolve_parent(path)?;
                if trunc_denied {
                    return Err(truncate_denied());
                }
                tree.insert(parent, name, Node::new(Content::File(Vec::new()), perm))?
            }
            Err(err) => return Err(err),
        };

        if flags.contains(StoreFlags::TRUNC) {
            if trunc_denied {
                return Err(truncate_denied());
            }
            if let Content::File(data) = &mut tree.node_mut(id)?.content {
                data.clear();
            }
            tree.touch(id)?;
        }

        tree.node_mut(id)?.open += 1;
        Ok(MemHandle {
            store: Arc::clone(self),
            id,
            offset: 0,
            flags,
        })
    }

    pub fn stat(&self, path: &str) -> io::Result<FileInfo> {
        let tree = self.lock();
        let id = tree.resolve(path, true)?;
        Ok(tree.node(id)?.info(&base_name(path)))
    }

    pub fn lstat(&self, path: &str) -> io::Result<FileInfo> {
        let tree = self.lock();
        let id = tree.resolve(path, false)?;
        Ok(tree.node(id)?.info(&base_name(path)))
    }

    pub fn mkdir(&self, path: &str, perm: u32) -> io::Result<()> {
        let mut tree = self.lock();
        let (parent, name) = tree.resolve_parent(path)?;
        let dir = Content::Dir {
            parent,
            entries: BTreeMap::new(),
        };
        tree.insert(parent, name, Node::new(dir, perm))?;
        Ok(())
    }

    pub fn remove_file(&self, path: &str) -> io::Result<()> {
        let mut tree = self.lock();
        let (parent, name) = tree.resolve_parent(path)?;
        let id = tree.lookup(parent, &name)?;
        if tree.node(id)?.kind() == NodeKind::Dir {
            return Err(ErrorKind::IsADirectory.into());
        }
        tree.unlink_entry(parent, &name, id)
    }

    pub fn remove_dir(&self, path: &str) -> io::Result<()> {
        let mut tree = self.lock();
        let (parent, name) = tree.resolve_parent(path)?;
        let id = tree.lookup(parent, &name)?;
        if !tree.entries(id)?.is_empty() {
            return Err(ErrorKind::DirectoryNotEmpty.into());
        }
        tree.unlink_entry(parent, &name, id)
    }

    pub fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut tree = self.lock();
        let (src_parent, src_name) = tree.resolve_parent(from)?;
        let src = tree.lookup(src_parent, &src_name)?;
        let (dst_parent, dst_name) = tree.resolve_parent(to)?;
        let src_is_dir = tree.node(src)?.kind() == NodeKind::Dir;

        if src_is_dir && tree.is_ancestor(src, dst_parent)? {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "cannot move a directory into itself",
            ));
        }

        if let Ok(dst) = tree.lookup(dst_parent, &dst_name) {
            if dst == src {
                return Ok(());
            }
            match (src_is_dir, tree.node(dst)?.kind() == NodeKind::Dir) {
                (false, true) => return Err(ErrorKind::IsADirectory.into()),
                (true, false) => return Err(ErrorKind::NotADirectory.into()),
                (true, true) if !tree.entries(dst)?.is_empty() => {
                    return Err(ErrorKind::DirectoryNotEmpty.into())
                }
                _ => {}
            }
            tree.unlink_entry(dst_parent, &dst_name, dst)?;
        }

        tree.entries_mut(src_parent)?.remove(&src_name);
        tree.touch(src_parent)?;
        tree.entries_mut(dst_parent)?.insert(dst_name, src);
        tree.touch(dst_parent)?;
        let node = tree.node_mut(src)?;
        if let Content::Dir { parent, .. } = &mut node.content {
            *parent = dst_parent;
        }
        node.ctime = now();
        Ok(())
    }

    pub fn link(&self, old_path: &str, new_path: &str) -> io::Result<()> {
        let mut tree = self.lock();
        let id = tree.resolve(old_path, false)?;
        if tree.node(id)?.kind() == NodeKind::Dir {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "hard links to directories are not allowed",
            ));
        }
        let (parent, name) = tree.resolve_parent(new_path)?;
        if tree.entries(parent)?.contains_key(&name) {
            return Err(ErrorKind::AlreadyExists.into());
        }
        tree.entries_mut(parent)?.insert(name, id);
        tree.touch(parent)?;
        let node = tree.node_mut(id)?;
        node.nlink += 1;
        node.ctime = now();
        Ok(())
    }

    pub fn symlink(&self, target: &str, link_path: &str) -> io::Result<()> {
        let mut tree = self.lock();
        let (parent, name) = tree.resolve_parent(link_path)?;
        let link = Node::new(Content::Symlink(target.to_string()), 0o777);
        tree.insert(parent, name, link)?;
        Ok(())
    }

    pub fn readlink(&self, path: &str) -> io::Result<String> {
        let tree = self.lock();
        let id = tree.resolve(path, false)?;
        match &tree.node(id)?.content {
            Content::Symlink(target) => Ok(target.clone()),
            _ => Err(io::Error::new(ErrorKind::InvalidInput, "not a symbolic link")),
        }
    }

    pub fn chmod(&self, path: &str, perm: u32) -> io::Result<()> {
        let mut tree = self.lock();
        let id = tree.resolve(path, true)?;
        let node = tree.node_mut(id)?;
        node.mode = perm & 0o7777;
        node.ctime = now();
        Ok(())
    }

    pub fn set_times(&self, path: &str, atime: Option<i64>, mtime: Option<i64>) -> io::Result<()> {
        let mut tree = self.lock();
        let id = tree.resolve(path, true)?;
        set_node_times(tree.node_mut(id)?, atime, mtime);
        Ok(())
    }

    /// Entries of the directory at `path`, ordered by name.
    pub fn read_dir(&self, path: &str) -> io::Result<Vec<FileInfo>> {
        let tree = self.lock();
        let id = tree.resolve(path, true)?;
        tree.entries(id)?
            .iter()
            .map(|(name, child)| Ok(tree.node(*child)?.info(name)))
            .collect()
    }
}

fn set_node_times(node: &mut Node, atime: Option<i64>, mtime: Option<i64>) {
    if let Some(atime) = atime {
        node.atime = atime;
    }
    if let Some(mtime) = mtime {
        node.mtime = mtime;
    }
    node.ctime = now();
}

/// An open regular file. Keeps its node alive after the last unlink.
pub struct MemHandle {
    store: Arc<MemStore>,
    id: NodeId,
    offset: u64,
    flags: StoreFlags,
}

impl MemHandle {
    pub fn flags(&self) -> StoreFlags {
        self.flags
    }

    pub fn set_append(&mut self, enable: bool) {
        self.flags.set(StoreFlags::APPEND, enable);
    }

    pub fn info(&self, name: &str) -> io::Result<FileInfo> {
        let tree = self.store.lock();
        Ok(tree.node(self.id)?.info(name))
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if !self.flags.contains(StoreFlags::READ) {
            return Err(io::Error::new(ErrorKind::InvalidInput, "file not open for reading"));
        }
        let mut tree = self.store.lock();
        let node = tree.node_mut(self.id)?;
        let Content::File(data) = &node.content else {
            return Err(ErrorKind::IsADirectory.into());
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        node.atime = now();
        Ok(n)
    }

    /// Write at `offset`, zero-filling any gap past the end.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.write_locked(buf, Some(offset))?;
        Ok(buf.len())
    }

    /// Write at the current end of the file without touching the handle
    /// offset. Returns the new end.
    pub fn write_end(&self, buf: &[u8]) -> io::Result<u64> {
        self.write_locked(buf, None)
    }

    /// Append and move the offset past the new data.
    pub fn append_data(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.offset = self.write_locked(buf, None)?;
        Ok(buf.len())
    }

    fn write_locked(&self, buf: &[u8], offset: Option<u64>) -> io::Result<u64> {
        if !self.flags.contains(StoreFlags::WRITE) {
            return Err(io::Error::new(ErrorKind::InvalidInput, "file not open for writing"));
        }
        let mut tree = self.store.lock();
        let node = tree.node_mut(self.id)?;
        let Content::File(data) = &mut node.content else {
            return Err(ErrorKind::IsADirectory.into());
        };
        let start = offset.unwrap_or(data.len() as u64);
        let end = checked_end(start, buf.len())?;
        let start = end - buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        let now = now();
        node.mtime = now;
        node.ctime = now;
        Ok(end as u64)
    }

    pub fn size(&self) -> io::Result<u64> {
        let tree = self.store.lock();
        match &tree.node(self.id)?.content {
            Content::File(data) => Ok(data.len() as u64),
            _ => Err(ErrorKind::IsADirectory.into()),
        }
    }

    pub fn set_len(&self, size: u64) -> io::Result<()> {
        if !self.flags.contains(StoreFlags::WRITE) {
            return Err(io::Error::new(ErrorKind::InvalidInput, "file not open for writing"));
        }
        let size = checked_end(size, 0)?;
        let mut tree = self.store.lock();
        if let Content::File(data) = &mut tree.node_mut(self.id)?.content {
            data.resize(size, 0);
        }
        tree.touch(self.id)
    }

    pub fn set_times(&self, atime: Option<i64>, mtime: Option<i64>) -> io::Result<()> {
        let mut tree = self.store.lock();
        set_node_times(tree.node_mut(self.id)?, atime, mtime);
        Ok(())
    }
}

impl Read for MemHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl Write for MemHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.flags.contains(StoreFlags::APPEND) {
            return self.append_data(buf);
        }
        let n = self.write_at(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (0, i128::from(offset)),
            SeekFrom::Current(delta) => (self.offset, i128::from(delta)),
            SeekFrom::End(delta) => (self.size()?, i128::from(delta)),
        };
        let target = i128::from(base) + delta;
        if target < 0 || target > i128::from(i64::MAX) {
            return Err(io::Error::new(ErrorKind::InvalidInput, "invalid seek offset"));
        }
        self.offset = target as u64;
        Ok(self.offset)
    }
}

impl Drop for MemHandle {
    fn drop(&mut self) {
        let mut tree = self.store.lock();
        if let Some(node) = tree.nodes.get_mut(&self.id) {
            node.open = node.open.saturating_sub(1);
        }
        tree.release(self.id);
    }
}
