use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    #[default]
    Unknown,
}

/// Runtime-neutral stat record. Times are nanoseconds since the Unix epoch.
///
/// Backends that do not model devices or inodes fill `dev` and `ino` with
/// placeholders that stay the same for repeated stats of one path.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    pub dev: u64,
    pub ino: u64,
    pub file_type: FileType,
    /// Permission bits only (`0o7777` mask).
    pub perm: u32,
    pub nlink: u64,
    pub size: u64,
    pub atim: i64,
    pub mtim: i64,
    pub ctim: i64,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// One directory entry returned by `File::readdir`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub ino: u64,
    pub name: String,
    pub file_type: FileType,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Whence {
    Start,
    Current,
    End,
}
