use crate::sys::{Errno, File, FileSystem, SysResult};

use super::call::{Call, Entry, Outcome};

/// Largest buffer a single `read` or `pread` call gets. Longer requests come
/// back short, as a host read would.
pub const MAX_READ_LEN: usize = 1 << 20;

/// Replay `calls` against `fs` and collect one outcome per call.
///
/// Handles still open at the end are dropped without an explicit close.
pub fn run(fs: &dyn FileSystem, calls: &[Call]) -> Vec<Outcome> {
    let mut session = Session::new(fs);
    calls.iter().map(|call| session.apply(call)).collect()
}

struct Session<'a> {
    fs: &'a dyn FileSystem,
    handles: Vec<Box<dyn File>>,
}

impl<'a> Session<'a> {
    fn new(fs: &'a dyn FileSystem) -> Self {
        Self {
            fs,
            handles: Vec::new(),
        }
    }

    fn apply(&mut self, call: &Call) -> Outcome {
        let outcome = self.dispatch(call).unwrap_or_else(|errno| Outcome::Error { errno });
        tracing::trace!(?call, ?outcome, "script call");
        outcome
    }

    /// Unknown slots behave like closed handles.
    fn file(&mut self, fd: usize) -> SysResult<&mut Box<dyn File>> {
        self.handles.get_mut(fd).ok_or(Errno::Invalid)
    }

    fn dispatch(&mut self, call: &Call) -> SysResult<Outcome> {
        let fs = self.fs;
        let outcome = match call {
            Call::Open { path, flags, perm } => {
                let file = fs.open(path, *flags, *perm)?;
                self.handles.push(file);
                Outcome::Handle {
                    fd: self.handles.len() - 1,
                }
            }
            Call::Stat { path } => Outcome::Stat {
                stat: fs.stat(path)?.into(),
            },
            Call::Lstat { path } => Outcome::Stat {
                stat: fs.lstat(path)?.into(),
            },
            Call::Mkdir { path, perm } => done(fs.mkdir(path, *perm))?,
            Call::Chmod { path, perm } => done(fs.chmod(path, *perm))?,
            Call::Rename { from, to } => done(fs.rename(from, to))?,
            Call::Rmdir { path } => done(fs.rmdir(path))?,
            Call::Unlink { path } => done(fs.unlink(path))?,
            Call::Link { old_path, new_path } => done(fs.link(old_path, new_path))?,
            Call::Symlink { target, link_path } => done(fs.symlink(target, link_path))?,
            Call::Readlink { path } => Outcome::Target {
                path: fs.readlink(path)?,
            },
            Call::Utimens { path, atim, mtim } => done(fs.utimens(path, *atim, *mtim))?,
            Call::Dev { fd } => Outcome::Number {
                value: self.file(*fd)?.dev()?,
            },
            Call::Ino { fd } => Outcome::Number {
                value: self.file(*fd)?.ino()?,
            },
            Call::IsDir { fd } => Outcome::Flag {
                value: self.file(*fd)?.is_dir()?,
            },
            Call::IsAppend { fd } => Outcome::Flag {
                value: self.file(*fd)?.is_append(),
            },
            Call::SetAppend { fd, enable } => done(self.file(*fd)?.set_append(*enable))?,
            Call::Fstat { fd } => Outcome::Stat {
                stat: self.file(*fd)?.stat()?.into(),
            },
            Call::Read { fd, len } => {
                let mut buf = vec![0; (*len).min(MAX_READ_LEN)];
                let n = self.file(*fd)?.read(&mut buf)?;
                buf.truncate(n);
                Outcome::Data { data: buf }
            }
            Call::Pread { fd, len, offset } => {
                let mut buf = vec![0; (*len).min(MAX_READ_LEN)];
                let n = self.file(*fd)?.pread(&mut buf, *offset)?;
                buf.truncate(n);
                Outcome::Data { data: buf }
            }
            Call::Seek { fd, offset, whence } => Outcome::Offset {
                offset: self.file(*fd)?.seek(*offset, *whence)?,
            },
            Call::Readdir { fd, max } => {
                let entries = self.file(*fd)?.readdir(*max)?;
                Outcome::Entries {
                    entries: entries
                        .into_iter()
                        .map(|d| Entry {
                            name: d.name,
                            file_type: d.file_type,
                        })
                        .collect(),
                }
            }
            Call::Write { fd, data } => Outcome::Written {
                count: self.file(*fd)?.write(data)?,
            },
            Call::Pwrite { fd, data, offset } => Outcome::Written {
                count: self.file(*fd)?.pwrite(data, *offset)?,
            },
            Call::Truncate { fd, size } => done(self.file(*fd)?.truncate(*size))?,
            Call::Sync { fd } => done(self.file(*fd)?.sync())?,
            Call::Datasync { fd } => done(self.file(*fd)?.datasync())?,
            Call::Futimens { fd, atim, mtim } => done(self.file(*fd)?.utimens(*atim, *mtim))?,
            Call::Close { fd } => done(self.file(*fd)?.close())?,
        };
        Ok(outcome)
    }
}

fn done(result: SysResult<()>) -> SysResult<Outcome> {
    result.map(|()| Outcome::Done)
}
