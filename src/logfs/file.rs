use std::sync::Arc;

use super::sink::{results, LogConfig};
use super::{show_stat, unit};
use crate::sys::{Dirent, File, Stat, SysResult, Whence};

/// Handle returned by [`super::LoggingFs::open`]. Its records carry the
/// path it was opened with.
pub struct LoggingFile {
    base: Box<dyn File>,
    name: String,
    config: Arc<LogConfig>,
}

impl LoggingFile {
    pub(super) fn new(base: Box<dyn File>, name: String, config: Arc<LogConfig>) -> Self {
        Self { base, name, config }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self) -> Option<&str> {
        Some(&self.name)
    }
}

fn whence(whence: Whence) -> &'static str {
    match whence {
        Whence::Start => "SeekStart",
        Whence::Current => "SeekCurrent",
        Whence::End => "SeekEnd",
    }
}

impl File for LoggingFile {
    fn dev(&mut self) -> SysResult<u64> {
        self.config
            .call(Some(&self.name), "Dev", "(none)", || self.base.dev(), u64::to_string)
    }

    fn ino(&mut self) -> SysResult<u64> {
        self.config
            .call(Some(&self.name), "Ino", "(none)", || self.base.ino(), u64::to_string)
    }

    fn is_dir(&mut self) -> SysResult<bool> {
        self.config.call(
            Some(&self.name),
            "IsDir",
            "(none)",
            || self.base.is_dir(),
            bool::to_string,
        )
    }

    fn is_append(&self) -> bool {
        self.config.before(self.handle(), "IsAppend", "(none)");
        let append = self.base.is_append();
        self.config.after(self.handle(), "IsAppend", &append.to_string());
        append
    }

    fn set_append(&mut self, enable: bool) -> SysResult<()> {
        self.config.call(
            Some(&self.name),
            "SetAppend",
            &enable.to_string(),
            || self.base.set_append(enable),
            unit,
        )
    }

    fn stat(&mut self) -> SysResult<Stat> {
        self.config
            .call(Some(&self.name), "Stat", "(none)", || self.base.stat(), show_stat)
    }

    fn read(&mut self, buf: &mut [u8]) -> SysResult<usize> {
        let handle = Some(self.name.as_str());
        self.config.before(handle, "Read", &format!("len={}", buf.len()));
        let result = self.base.read(buf);
        let shown = results(&result, |n| {
            format!("{n}, buffer: {}", self.config.bytes(&buf[..*n]))
        });
        self.config.after(handle, "Read", &shown);
        result
    }

    fn pread(&mut self, buf: &mut [u8], offset: i64) -> SysResult<usize> {
        let handle = Some(self.name.as_str());
        self.config
            .before(handle, "Pread", &format!("len={} {offset}", buf.len()));
        let result = self.base.pread(buf, offset);
        let shown = results(&result, |n| {
            format!("{n}, buffer: {}", self.config.bytes(&buf[..*n]))
        });
        self.config.after(handle, "Pread", &shown);
        result
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> SysResult<i64> {
        self.config.call(
            Some(&self.name),
            "Seek",
            &format!("{offset} {}", self::whence(whence)),
            || self.base.seek(offset, whence),
            i64::to_string,
        )
    }

    fn readdir(&mut self, max: usize) -> SysResult<Vec<Dirent>> {
        self.config.call(
            Some(&self.name),
            "Readdir",
            &max.to_string(),
            || self.base.readdir(max),
            |entries| format!("{entries:?}"),
        )
    }

    fn write(&mut self, buf: &[u8]) -> SysResult<usize> {
        let payload = self.config.bytes(buf);
        self.config.call(
            Some(&self.name),
            "Write",
            &payload,
            || self.base.write(buf),
            |n| format!("{n}, buffer: {payload}"),
        )
    }

    fn pwrite(&mut self, buf: &[u8], offset: i64) -> SysResult<usize> {
        let payload = self.config.bytes(buf);
        self.config.call(
            Some(&self.name),
            "Pwrite",
            &format!("{payload} {offset}"),
            || self.base.pwrite(buf, offset),
            |n| format!("{n}, buffer: {payload}"),
        )
    }

    fn truncate(&mut self, size: i64) -> SysResult<()> {
        self.config.call(
            Some(&self.name),
            "Truncate",
            &size.to_string(),
            || self.base.truncate(size),
            unit,
        )
    }

    fn sync(&mut self) -> SysResult<()> {
        self.config
            .call(Some(&self.name), "Sync", "(none)", || self.base.sync(), unit)
    }

    fn datasync(&mut self) -> SysResult<()> {
        self.config
            .call(Some(&self.name), "Datasync", "(none)", || self.base.datasync(), unit)
    }

    fn utimens(&mut self, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
        self.config.call(
            Some(&self.name),
            "Utimens",
            &format!("{atim:?} {mtim:?}"),
            || self.base.utimens(atim, mtim),
            unit,
        )
    }

    fn close(&mut self) -> SysResult<()> {
        self.config
            .call(Some(&self.name), "Close", "(none)", || self.base.close(), unit)
    }
}
