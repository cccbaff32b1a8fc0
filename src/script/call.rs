use serde::{Deserialize, Serialize};

use crate::sys::{Errno, FileType, OpenFlags, Stat, Whence};

fn default_perm() -> u32 {
    0o644
}

fn default_dir_perm() -> u32 {
    0o755
}

/// One step of a call script.
///
/// Path calls go to the filesystem. Handle calls name a handle by `fd`, the
/// index of the `open` that produced it, counting from zero. Closed handles
/// keep their slot, so later calls on them observe the closed-handle error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    Open {
        path: String,
        #[serde(default)]
        flags: OpenFlags,
        #[serde(default = "default_perm")]
        perm: u32,
    },
    Stat {
        path: String,
    },
    Lstat {
        path: String,
    },
    Mkdir {
        path: String,
        #[serde(default = "default_dir_perm")]
        perm: u32,
    },
    Chmod {
        path: String,
        perm: u32,
    },
    Rename {
        from: String,
        to: String,
    },
    Rmdir {
        path: String,
    },
    Unlink {
        path: String,
    },
    Link {
        old_path: String,
        new_path: String,
    },
    Symlink {
        target: String,
        link_path: String,
    },
    Readlink {
        path: String,
    },
    Utimens {
        path: String,
        #[serde(default)]
        atim: Option<i64>,
        #[serde(default)]
        mtim: Option<i64>,
    },
    Dev {
        fd: usize,
    },
    Ino {
        fd: usize,
    },
    IsDir {
        fd: usize,
    },
    IsAppend {
        fd: usize,
    },
    SetAppend {
        fd: usize,
        enable: bool,
    },
    Fstat {
        fd: usize,
    },
    Read {
        fd: usize,
        len: usize,
    },
    Pread {
        fd: usize,
        len: usize,
        offset: i64,
    },
    Seek {
        fd: usize,
        offset: i64,
        whence: Whence,
    },
    Readdir {
        fd: usize,
        #[serde(default)]
        max: usize,
    },
    Write {
        fd: usize,
        #[serde(with = "hex")]
        data: Vec<u8>,
    },
    Pwrite {
        fd: usize,
        #[serde(with = "hex")]
        data: Vec<u8>,
        offset: i64,
    },
    Truncate {
        fd: usize,
        size: i64,
    },
    Sync {
        fd: usize,
    },
    Datasync {
        fd: usize,
    },
    Futimens {
        fd: usize,
        #[serde(default)]
        atim: Option<i64>,
        #[serde(default)]
        mtim: Option<i64>,
    },
    Close {
        fd: usize,
    },
}

/// The part of a stat that is reproducible across runs.
///
/// Timestamps are left out so that outcomes of two runs can be compared.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatSummary {
    pub file_type: FileType,
    pub perm: u32,
    pub nlink: u64,
    pub size: u64,
}

impl From<Stat> for StatSummary {
    fn from(stat: Stat) -> Self {
        Self {
            file_type: stat.file_type,
            perm: stat.perm,
            nlink: stat.nlink,
            size: stat.size,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub file_type: FileType,
}

/// Result of one [`Call`], in the same position as the call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Handle {
        fd: usize,
    },
    Stat {
        stat: StatSummary,
    },
    Number {
        value: u64,
    },
    Flag {
        value: bool,
    },
    Offset {
        offset: i64,
    },
    Data {
        #[serde(with = "hex")]
        data: Vec<u8>,
    },
    Written {
        count: usize,
    },
    Entries {
        entries: Vec<Entry>,
    },
    Target {
        path: String,
    },
    Error {
        errno: Errno,
    },
}
