use std::fs;
#[cfg(not(unix))]
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use super::{errno, file_type, set_path_times, stat_from_metadata, system_time};
use crate::sys::{AccessMode, Dirent, Errno, File, FileType, Stat, SysResult, Whence};

pub(super) fn set_times(file: &fs::File, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
    let mut times = fs::FileTimes::new();
    if let Some(atim) = atim {
        times = times.set_accessed(system_time(atim));
    }
    if let Some(mtim) = mtim {
        times = times.set_modified(system_time(mtim));
    }
    file.set_times(times).map_err(errno)
}

fn offset(value: i64) -> SysResult<u64> {
    u64::try_from(value).map_err(|_| Errno::Invalid)
}

#[cfg(unix)]
fn read_at(file: &fs::File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(unix)]
fn write_at(file: &fs::File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &fs::File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(windows)]
fn write_at(file: &fs::File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, buf, offset)
}

/// Flip `O_APPEND` on the open descriptor. The offset and every other
/// status flag stay as they are.
#[cfg(unix)]
fn set_append_flag(file: &fs::File, enable: bool) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` belongs to `file`, which outlives both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let flags = if enable {
        flags | libc::O_APPEND
    } else {
        flags & !libc::O_APPEND
    };
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Open regular host file.
pub struct SysFile {
    file: Option<fs::File>,
    #[cfg(not(unix))]
    path: PathBuf,
    #[cfg(not(unix))]
    mode: AccessMode,
    append: bool,
}

impl SysFile {
    pub(super) fn new(file: fs::File, path: PathBuf, mode: AccessMode, append: bool) -> Self {
        #[cfg(unix)]
        let _ = (path, mode);
        Self {
            file: Some(file),
            #[cfg(not(unix))]
            path,
            #[cfg(not(unix))]
            mode,
            append,
        }
    }

    fn file(&mut self) -> SysResult<&mut fs::File> {
        self.file.as_mut().ok_or(Errno::Invalid)
    }

    /// Without `fcntl` the append bit is only settable at open time, so the
    /// path is opened again at the current offset.
    #[cfg(not(unix))]
    fn reopen(&mut self, append: bool) -> SysResult<fs::File> {
        let position = self.file()?.stream_position().map_err(errno)?;
        let mut reopened = OpenOptions::new()
            .read(self.mode.readable())
            .write(self.mode.writable())
            .append(append && self.mode.writable())
            .open(&self.path)
            .map_err(errno)?;
        reopened.seek(SeekFrom::Start(position)).map_err(errno)?;
        Ok(reopened)
    }
}

impl File for SysFile {
    fn dev(&mut self) -> SysResult<u64> {
        Ok(self.stat()?.dev)
    }

    fn ino(&mut self) -> SysResult<u64> {
        Ok(self.stat()?.ino)
    }

    fn is_dir(&mut self) -> SysResult<bool> {
        self.file()?;
        Ok(false)
    }

    fn is_append(&self) -> bool {
        self.append
    }

    fn set_append(&mut self, enable: bool) -> SysResult<()> {
        self.file()?;
        if enable == self.append {
            return Ok(());
        }
        #[cfg(unix)]
        set_append_flag(self.file()?, enable).map_err(errno)?;
        #[cfg(not(unix))]
        {
            let reopened = self.reopen(enable)?;
            self.file = Some(reopened);
        }
        self.append = enable;
        Ok(())
    }

    fn stat(&mut self) -> SysResult<Stat> {
        let md = self.file()?.metadata().map_err(errno)?;
        Ok(stat_from_metadata(&md))
    }

    fn read(&mut self, buf: &mut [u8]) -> SysResult<usize> {
        self.file()?.read(buf).map_err(errno)
    }

    fn pread(&mut self, buf: &mut [u8], offset: i64) -> SysResult<usize> {
        let offset = self::offset(offset)?;
        read_at(self.file()?, buf, offset).map_err(errno)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> SysResult<i64> {
        let pos = match whence {
            Whence::Start => SeekFrom::Start(self::offset(offset)?),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        let new_offset = self.file()?.seek(pos).map_err(errno)?;
        i64::try_from(new_offset).map_err(|_| Errno::Invalid)
    }

    fn readdir(&mut self, _max: usize) -> SysResult<Vec<Dirent>> {
        self.file()?;
        Err(Errno::Invalid)
    }

    fn write(&mut self, buf: &[u8]) -> SysResult<usize> {
        self.file()?.write(buf).map_err(errno)
    }

    fn pwrite(&mut self, buf: &[u8], offset: i64) -> SysResult<usize> {
        let offset = self::offset(offset)?;
        let append = self.append;
        let file = self.file()?;
        let offset = if append {
            file.metadata().map_err(errno)?.len()
        } else {
            offset
        };
        write_at(file, buf, offset).map_err(errno)
    }

    fn truncate(&mut self, size: i64) -> SysResult<()> {
        let size = offset(size)?;
        self.file()?.set_len(size).map_err(errno)
    }

    fn sync(&mut self) -> SysResult<()> {
        self.file()?.sync_all().map_err(errno)
    }

    fn datasync(&mut self) -> SysResult<()> {
        self.file()?.sync_data().map_err(errno)
    }

    fn utimens(&mut self, atim: Option<i64>, mtim: Option<i64>) -> SysResult<()> {
        set_times(self.file()?, atim, mtim)
    }

    fn close(&mut self) -> SysResult<()> {
        self.file.take().map(drop).ok_or(Errno::Invalid)
    }
}

fn to_dirent(entry: fs::DirEntry) -> Dirent {
    #[cfg(unix)]
    let ino = std::os::unix::fs::DirEntryExt::ino(&entry);
    #[cfg(not(unix))]
    let ino = 0;
    Dirent {
        ino,
        name: entry.file_name().to_string_lossy().into_owned(),
        file_type: entry.file_type().map(file_type).unwrap_or(FileType::Unknown),
    }
}

/// Open host directory. The listing is read lazily and only once.
pub struct SysDir {
    path: PathBuf,
    entries: Option<fs::ReadDir>,
    closed: bool,
}

impl SysDir {
    pub(super) fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: None,
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

impl File for SysDir {
    fn dev(&mut self) -> SysResult<u64> {
        Ok(self.stat()?.dev)
    }

    fn ino(&mut self) -> SysResult<u64> {
        Ok(self.stat()?.ino)
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
        let md = fs::metadata(&self.path).map_err(errno)?;
        Ok(stat_from_metadata(&md))
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
        if self.entries.is_none() {
            self.entries = Some(fs::read_dir(&self.path).map_err(errno)?);
        }
        let Some(entries) = self.entries.as_mut() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        while max == 0 || out.len() < max {
            match entries.next() {
                Some(entry) => out.push(to_dirent(entry.map_err(errno)?)),
                None => break,
            }
        }
        Ok(out)
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
        set_path_times(&self.path, atim, mtim)
    }

    fn close(&mut self) -> SysResult<()> {
        self.check_open()?;
        self.closed = true;
        self.entries = None;
        Ok(())
    }
}
