use std::io;

use quickcheck_macros::quickcheck;
use wasm_fs::memfs::{from_store_flags, to_store_flags, StoreFlags};
use wasm_fs::sys::{classify, errno_code, AccessMode, Errno, OpenFlags, SysResult};

/// Flags the memory store keeps; the others are dropped on the way in.
fn store_kept() -> OpenFlags {
    OpenFlags::RDWR
        | OpenFlags::WRONLY
        | OpenFlags::APPEND
        | OpenFlags::CREAT
        | OpenFlags::EXCL
        | OpenFlags::TRUNC
        | OpenFlags::SYNC
}

fn valid(bits: u32) -> Option<OpenFlags> {
    let flags = OpenFlags::from_bits_truncate(bits);
    flags.access_mode().ok().map(|_| flags)
}

#[quickcheck]
fn store_flags_round_trip(bits: u32) -> bool {
    match valid(bits) {
        Some(flags) => from_store_flags(to_store_flags(flags)) == flags & store_kept(),
        None => true,
    }
}

#[quickcheck]
fn store_access_follows_access_mode(bits: u32) -> bool {
    let Some(flags) = valid(bits) else {
        return true;
    };
    let store = to_store_flags(flags);
    let Ok(mode) = flags.access_mode() else {
        return false;
    };
    store.contains(StoreFlags::READ) == mode.readable()
        && store.contains(StoreFlags::WRITE) == mode.writable()
}

#[quickcheck]
fn both_access_bits_are_rejected(bits: u32) -> bool {
    let flags = OpenFlags::from_bits_truncate(bits) | OpenFlags::RDWR | OpenFlags::WRONLY;
    flags.access_mode() == Err(Errno::Invalid)
}

#[cfg(unix)]
#[quickcheck]
fn native_flags_round_trip(bits: u32) -> bool {
    use wasm_fs::sysfs::{from_native_flags, to_native_flags};

    let kept = OpenFlags::RDWR
        | OpenFlags::WRONLY
        | OpenFlags::APPEND
        | OpenFlags::CREAT
        | OpenFlags::EXCL
        | OpenFlags::TRUNC;
    match valid(bits) {
        Some(flags) => from_native_flags(to_native_flags(flags)) == flags & kept,
        None => true,
    }
}

#[cfg(unix)]
#[test]
fn native_flags_carry_status_bits() {
    use wasm_fs::sysfs::to_native_flags;

    let native = to_native_flags(
        OpenFlags::WRONLY | OpenFlags::DSYNC | OpenFlags::NOFOLLOW | OpenFlags::DIRECTORY,
    );
    assert_eq!(native & libc::O_ACCMODE, libc::O_WRONLY);
    assert_ne!(native & libc::O_DSYNC, 0);
    assert_ne!(native & libc::O_NOFOLLOW, 0);
    assert_ne!(native & libc::O_DIRECTORY, 0);
    assert_eq!(to_native_flags(OpenFlags::RDONLY), libc::O_RDONLY);
}

#[test]
fn memory_store_drops_unsupported_flags() {
    let flags = OpenFlags::RDWR
        | OpenFlags::DIRECTORY
        | OpenFlags::DSYNC
        | OpenFlags::NOFOLLOW
        | OpenFlags::NONBLOCK
        | OpenFlags::RSYNC;
    assert_eq!(to_store_flags(flags), StoreFlags::READ | StoreFlags::WRITE);
    assert_eq!(to_store_flags(OpenFlags::RDONLY), StoreFlags::READ);
    assert_eq!(to_store_flags(OpenFlags::WRONLY), StoreFlags::WRITE);
}

#[test]
fn access_modes() {
    assert_eq!(OpenFlags::RDONLY.access_mode(), Ok(AccessMode::ReadOnly));
    assert_eq!(
        (OpenFlags::WRONLY | OpenFlags::APPEND).access_mode(),
        Ok(AccessMode::WriteOnly)
    );
    assert_eq!(OpenFlags::RDWR.access_mode(), Ok(AccessMode::ReadWrite));
    assert!(!OpenFlags::CREAT.write_intent());
    assert!(OpenFlags::RDWR.write_intent());
}

#[test]
fn flags_display_like_posix() {
    assert_eq!(OpenFlags::RDONLY.to_string(), "O_RDONLY");
    assert_eq!(
        (OpenFlags::RDONLY | OpenFlags::CREAT).to_string(),
        "O_RDONLY|O_CREAT"
    );
    assert_eq!(
        (OpenFlags::RDWR | OpenFlags::APPEND | OpenFlags::TRUNC).to_string(),
        "O_RDWR|O_APPEND|O_TRUNC"
    );
}

#[test]
fn errno_codes() {
    let ok: SysResult<()> = Ok(());
    assert_eq!(errno_code(&ok), 0);
    let cases = [
        (Errno::NotFound, 44, "ENOENT"),
        (Errno::Exist, 20, "EEXIST"),
        (Errno::IsDirectory, 31, "EISDIR"),
        (Errno::Invalid, 28, "EINVAL"),
        (Errno::Io, 29, "EIO"),
    ];
    for (errno, code, name) in cases {
        let result: SysResult<()> = Err(errno);
        assert_eq!(errno_code(&result), code);
        assert_eq!(errno.name(), name);
    }
}

#[test]
fn classify_native_errors() {
    let kind = |k: io::ErrorKind| classify(&io::Error::from(k));
    assert_eq!(kind(io::ErrorKind::NotFound), Errno::NotFound);
    assert_eq!(kind(io::ErrorKind::AlreadyExists), Errno::Exist);
    assert_eq!(kind(io::ErrorKind::IsADirectory), Errno::IsDirectory);
    assert_eq!(kind(io::ErrorKind::InvalidInput), Errno::Invalid);
    assert_eq!(kind(io::ErrorKind::NotADirectory), Errno::Invalid);
    assert_eq!(kind(io::ErrorKind::PermissionDenied), Errno::Io);
    assert_eq!(kind(io::ErrorKind::DirectoryNotEmpty), Errno::Io);
    assert_eq!(classify(&io::Error::other("boom")), Errno::Io);
}

#[cfg(unix)]
#[test]
fn classify_raw_os_errors() {
    let raw = |code| classify(&io::Error::from_raw_os_error(code));
    assert_eq!(raw(libc::ENOENT), Errno::NotFound);
    assert_eq!(raw(libc::EEXIST), Errno::Exist);
    assert_eq!(raw(libc::EISDIR), Errno::IsDirectory);
    assert_eq!(raw(libc::ENOTDIR), Errno::Invalid);
    assert_eq!(raw(libc::EACCES), Errno::Io);
}
