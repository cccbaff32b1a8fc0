use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::errno::{Errno, SysResult};

bitflags! {
    /// Open flags in the runtime-neutral vocabulary.
    ///
    /// Bit values match the wasm runtime convention. Read-only has no bit of its
    /// own: it is the absence of both `RDWR` and `WRONLY`.
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[serde(transparent)]
    pub struct OpenFlags: u32 {
        const RDWR = 1;
        const WRONLY = 1 << 1;
        const APPEND = 1 << 3;
        const CREAT = 1 << 4;
        const DIRECTORY = 1 << 5;
        const DSYNC = 1 << 6;
        const EXCL = 1 << 7;
        const NOFOLLOW = 1 << 8;
        const NONBLOCK = 1 << 9;
        const RSYNC = 1 << 10;
        const SYNC = 1 << 11;
        const TRUNC = 1 << 12;
    }
}

/// The mutually exclusive access part of [`OpenFlags`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        !matches!(self, AccessMode::WriteOnly)
    }

    pub fn writable(self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }

    pub fn flags(self) -> OpenFlags {
        match self {
            AccessMode::ReadOnly => OpenFlags::empty(),
            AccessMode::WriteOnly => OpenFlags::WRONLY,
            AccessMode::ReadWrite => OpenFlags::RDWR,
        }
    }
}

impl OpenFlags {
    pub const RDONLY: OpenFlags = OpenFlags::empty();

    /// Resolve the access mode, rejecting `RDWR | WRONLY`.
    pub fn access_mode(self) -> SysResult<AccessMode> {
        match (self.contains(OpenFlags::RDWR), self.contains(OpenFlags::WRONLY)) {
            (false, false) => Ok(AccessMode::ReadOnly),
            (false, true) => Ok(AccessMode::WriteOnly),
            (true, false) => Ok(AccessMode::ReadWrite),
            (true, true) => Err(Errno::Invalid),
        }
    }

    /// True when the flags ask for anything that may modify file contents.
    pub fn write_intent(self) -> bool {
        self.intersects(OpenFlags::RDWR | OpenFlags::WRONLY)
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.write_intent() {
            f.write_str("O_RDONLY")?;
        }
        let mut first = !self.write_intent();
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "O_{name}")?;
            first = false;
        }
        Ok(())
    }
}
