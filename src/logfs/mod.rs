//! Logging decorator over any [`FileSystem`].
//!
//! [`LoggingFs`] and the [`LoggingFile`] handles it opens emit one record
//! before and one after every call and return exactly what the wrapped
//! implementation returned. Errors pass through untouched.
//!
//! Records look like
//!
//! ```text
//! LogFS memfs Stat: calling with params: "/a.txt"
//! LogFS memfs Stat: returned results: Stat { .. } errno=0
//! LogFS memfs "/a.txt" Write: calling with params: (data)
//! LogFS memfs "/a.txt" Write: returned results: 2, buffer: (data) errno=0
//! ```
//!
//! Nothing here serializes whole calls. When several threads share one
//! sink, the before and after records of different calls may interleave;
//! each record line stays intact.

mod file;
mod sink;

use std::sync::Arc;

pub use file::LoggingFile;
pub use sink::{BufferSink, LogConfig, LogSink, Payload, TracingSink, WriterSink, REDACTED};

use crate::sys::{File, FileSystem, OpenFlags, Stat, SysResult};

fn unit(_: &()) -> String {
    String::new()
}

fn show_stat(stat: &Stat) -> String {
    format!("{stat:?}")
}

pub struct LoggingFs<F> {
    base: F,
    config: Arc<LogConfig>,
}

impl<F: FileSystem> LoggingFs<F> {
    pub fn new(base: F, config: LogConfig) -> Self {
        Self {
            base,
            config: Arc::new(config),
        }
    }

    pub fn base(&self) -> &F {
        &self.base
    }

    pub fn into_inner(self) -> F {
        self.base
    }
}

// Every method is spelled out; a new capability must be added here by hand.
impl<F: FileSystem> FileSystem for LoggingFs<F> {
    fn open(&self, path: &str, flags: OpenFlags, perm: u32) -> SysResult<Box<dyn File>> {
        let opened = self.config.call(
            None,
            "OpenFile",
            &format!("{path:?} {flags}; {perm:#o}"),
            || self.base.open(path, flags, perm),
            |_| format!("handle={path:?}"),
        )?;
        Ok(Box::new(LoggingFile::new(
            opened,
            path.to_string(),
            Arc::clone(&self.config),
        )))
    }

    fn stat(&self, path: &str) -> SysResult<Stat> {
        self.config
            .call(None, "Stat", &format!("{path:?}"), || self.base.stat(path), show_stat)
    }

    fn lstat(&self, path: &str) -> SysResult<Stat> {
        self.config
            .call(None, "Lstat", &format!("{path:?}"), || self.base.lstat(path), show_stat)
    }

    fn mkdir(&self, path: &str, perm: u32) -> SysResult<()> {
        self.config.call(
            None,
            "Mkdir",
            &format!("{path:?} {perm:#o}"),
            || self.base.mkdir(path, perm),
            unit,
        )
    }

    fn chmod(&self, path: &str, perm: u32) -> SysResult<()> {
        self.config.call(
            None,
            "Chmod",
            &format!("{path:?} {perm:#o}"),
            || self.base.chmod(path, perm),
            unit,
        )
    }

    fn rename(&self, from: &str, to: &str) -> SysResult<()> {
        self.config.call(
            None,
            "Rename",
            &format!("{from:?} {to:?}"),
            || self.base.rename(from, to),
            unit,
        )
    }

    fn rmdir(&self, path: &str) -> SysResult<()> {
        self.config
            .call(None, "Rmdir", &format!("{path:?}"), || self.base.rmdir(path), unit)
    }

    fn unlink(&self, path: &str) -> SysResult<()> {
        self.config
            .call(None, "Unlink", &format!("{path:?}"), || self.base.unlink(path), unit)
    }

    fn link(&self, old_path: &str, new_path: &str) -> SysResult<()> {
        self.config.call(
            None,
            "Link",
            &format!("{old_path:?} {new_path:?}"),
            || self.base.link(old_path, new_path),
            unit,
        )
    }

    fn symlink(&self, target: &str, link_path: &str) -> SysResult<()> {
        self.config.call(
            None,
            "Symlink",
            &format!("{target:?} {link_path:?}"),
            || self.base.symlink(target, link_path),
            unit,
        )
    }

    fn readlink(&self, path: &str) -> SysResult<String> {
        self.config.call(
            None,
            "Readlink",
            &format!("{path:?}"),
            || self.base.readlink(path),
            |target| format!("{target:?}"),
        )
    }

    fn utimens(&self, path: &str, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
        self.config.call(
            None,
            "Utimens",
            &format!("{path:?} {atim:?} {mtim:?}"),
            || self.base.utimens(path, atim, mtim),
            unit,
        )
    }
}
