use wasm_fs::memfs::{MemFs, MAX_FILE_SIZE, MEMFS_DEV};
use wasm_fs::sys::{Errno, FileSystem, FileType, OpenFlags, Whence};

fn write_flags() -> OpenFlags {
    OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC
}

#[test]
fn write_then_read_back() {
    let fs = MemFs::new();
    let mut file = fs.open("/a.txt", write_flags(), 0o644).unwrap();
    assert_eq!(file.write(b"hi").unwrap(), 2);
    file.close().unwrap();

    let mut file = fs.open("/a.txt", OpenFlags::RDONLY, 0).unwrap();
    let mut buf = [0u8; 8];
    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"hi");
    assert_eq!(file.read(&mut buf).unwrap(), 0);
    assert_eq!(fs.read_file("/a.txt").unwrap(), b"hi");
}

#[test]
fn open_missing_file_is_not_found() {
    let fs = MemFs::new();
    assert_eq!(
        fs.open("/missing", OpenFlags::RDONLY, 0).err(),
        Some(Errno::NotFound)
    );
    assert_eq!(fs.stat("/missing").err(), Some(Errno::NotFound));
}

#[test]
fn writable_open_of_directory_is_rejected_without_side_effects() {
    let fs = MemFs::new();
    fs.mkdir("/d", 0o755).unwrap();
    fs.write_file("/d/x", b"x").unwrap();

    for flags in [
        OpenFlags::WRONLY,
        OpenFlags::RDWR,
        OpenFlags::WRONLY | OpenFlags::TRUNC,
        OpenFlags::WRONLY | OpenFlags::CREAT,
    ] {
        assert_eq!(fs.open("/", flags, 0).err(), Some(Errno::IsDirectory));
        assert_eq!(fs.open("/d", flags, 0).err(), Some(Errno::IsDirectory));
    }

    assert!(fs.stat("/d").unwrap().is_dir());
    assert_eq!(fs.read_file("/d/x").unwrap(), b"x");
}

#[test]
fn exclusive_create_of_existing_path_is_exist() {
    let fs = MemFs::new();
    fs.write_file("/a", b"keep").unwrap();
    fs.mkdir("/d", 0o755).unwrap();

    let flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::EXCL;
    assert_eq!(fs.open("/a", flags, 0o644).err(), Some(Errno::Exist));
    assert_eq!(fs.open("/d", flags, 0o644).err(), Some(Errno::Exist));
    assert_eq!(fs.read_file("/a").unwrap(), b"keep");
}

#[test]
fn conflicting_access_bits_are_invalid() {
    let fs = MemFs::new();
    let flags = OpenFlags::RDWR | OpenFlags::WRONLY | OpenFlags::CREAT;
    assert_eq!(fs.open("/a", flags, 0o644).err(), Some(Errno::Invalid));
    assert_eq!(fs.stat("/a").err(), Some(Errno::NotFound));
}

#[test]
fn directory_flag_on_regular_file_is_invalid() {
    let fs = MemFs::new();
    fs.write_file("/a", b"").unwrap();
    assert_eq!(
        fs.open("/a", OpenFlags::DIRECTORY, 0).err(),
        Some(Errno::Invalid)
    );
}

#[test]
fn closed_handles_report_invalid() {
    let fs = MemFs::new();
    let mut file = fs.open("/a", write_flags() | OpenFlags::APPEND, 0o644).unwrap();
    file.close().unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(file.write(b"x").err(), Some(Errno::Invalid));
    assert_eq!(file.read(&mut buf).err(), Some(Errno::Invalid));
    assert_eq!(file.stat().err(), Some(Errno::Invalid));
    assert_eq!(file.seek(0, Whence::Start).err(), Some(Errno::Invalid));
    assert_eq!(file.close().err(), Some(Errno::Invalid));
    assert!(file.is_append());

    fs.mkdir("/d", 0o755).unwrap();
    let mut dir = fs.open("/d", OpenFlags::RDONLY, 0).unwrap();
    dir.close().unwrap();
    assert_eq!(dir.readdir(0).err(), Some(Errno::Invalid));
    assert_eq!(dir.close().err(), Some(Errno::Invalid));
}

#[test]
fn directory_handle_lists_entries_once() {
    let fs = MemFs::new();
    fs.mkdir("/d", 0o755).unwrap();
    fs.write_file("/d/b", b"").unwrap();
    fs.write_file("/d/a", b"").unwrap();
    fs.mkdir("/d/sub", 0o755).unwrap();

    let mut dir = fs.open("/d", OpenFlags::RDONLY, 0).unwrap();
    assert!(dir.is_dir().unwrap());
    assert_eq!(dir.dev().unwrap(), MEMFS_DEV);

    let first = dir.readdir(2).unwrap();
    let rest = dir.readdir(0).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(rest.len(), 1);
    assert!(dir.readdir(0).unwrap().is_empty());

    let mut names: Vec<_> = first.iter().chain(&rest).map(|d| d.name.clone()).collect();
    names.sort();
    assert_eq!(names, ["a", "b", "sub"]);
    let sub = first.iter().chain(&rest).find(|d| d.name == "sub").unwrap();
    assert_eq!(sub.file_type, FileType::Directory);

    let mut buf = [0u8; 1];
    assert_eq!(dir.read(&mut buf).err(), Some(Errno::IsDirectory));
    assert_eq!(dir.write(b"x").err(), Some(Errno::IsDirectory));
}

#[test]
fn regular_file_handle_cannot_list() {
    let fs = MemFs::new();
    let mut file = fs.open("/a", write_flags(), 0o644).unwrap();
    assert!(!file.is_dir().unwrap());
    assert_eq!(file.readdir(0).err(), Some(Errno::Invalid));
}

#[test]
fn positioned_io_leaves_offset_alone() {
    let fs = MemFs::new();
    let mut file = fs
        .open("/a", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
        .unwrap();
    file.write(b"hello world").unwrap();
    assert_eq!(file.seek(0, Whence::Current).unwrap(), 11);

    assert_eq!(file.pwrite(b"W", 6).unwrap(), 1);
    let mut buf = [0u8; 5];
    assert_eq!(file.pread(&mut buf, 6).unwrap(), 5);
    assert_eq!(&buf, b"World");
    assert_eq!(file.seek(0, Whence::Current).unwrap(), 11);

    assert_eq!(file.seek(-5, Whence::End).unwrap(), 6);
    assert_eq!(file.seek(-7, Whence::Current).err(), Some(Errno::Invalid));
    assert_eq!(file.pread(&mut buf, -1).err(), Some(Errno::Invalid));
}

#[test]
fn append_mode_writes_at_end() {
    let fs = MemFs::new();
    fs.write_file("/log", b"ab").unwrap();

    let mut file = fs
        .open("/log", OpenFlags::RDWR | OpenFlags::APPEND, 0)
        .unwrap();
    assert!(file.is_append());
    file.seek(0, Whence::Start).unwrap();
    file.write(b"cd").unwrap();
    file.pwrite(b"ef", 0).unwrap();
    assert_eq!(fs.read_file("/log").unwrap(), b"abcdef");

    file.set_append(false).unwrap();
    assert!(!file.is_append());
    file.pwrite(b"X", 0).unwrap();
    assert_eq!(fs.read_file("/log").unwrap(), b"Xbcdef");
}

#[test]
fn truncate_and_stat_size() {
    let fs = MemFs::new();
    let mut file = fs.open("/a", write_flags(), 0o600).unwrap();
    file.write(b"0123456789").unwrap();
    file.truncate(4).unwrap();

    let stat = file.stat().unwrap();
    assert_eq!(stat.size, 4);
    assert_eq!(stat.perm, 0o600);
    assert_eq!(stat.file_type, FileType::Regular);
    assert_eq!(stat.dev, MEMFS_DEV);
    assert_eq!(stat.ino, fs.stat("/a").unwrap().ino);
    assert_eq!(file.truncate(-1).err(), Some(Errno::Invalid));
}

#[test]
fn stat_inode_is_stable_per_path() {
    let fs = MemFs::new();
    fs.write_file("/a", b"").unwrap();
    fs.write_file("/b", b"").unwrap();

    let a1 = fs.stat("/a").unwrap().ino;
    let a2 = fs.stat("/a").unwrap().ino;
    let b = fs.stat("/b").unwrap().ino;
    assert_eq!(a1, a2);
    assert_ne!(a1, b);
    assert_ne!(a1, 0);
}

#[test]
fn symlinks_are_followed_except_by_lstat() {
    let fs = MemFs::new();
    fs.write_file("/target", b"data").unwrap();
    fs.symlink("/target", "/link").unwrap();

    assert_eq!(fs.readlink("/link").unwrap(), "/target");
    assert_eq!(fs.lstat("/link").unwrap().file_type, FileType::Symlink);
    assert_eq!(fs.stat("/link").unwrap().file_type, FileType::Regular);
    assert_eq!(fs.read_file("/link").unwrap(), b"data");
    assert_eq!(fs.readlink("/target").err(), Some(Errno::Invalid));

    fs.symlink("/nowhere", "/dangling").unwrap();
    assert_eq!(fs.stat("/dangling").err(), Some(Errno::NotFound));
}

#[test]
fn hard_links_share_content() {
    let fs = MemFs::new();
    fs.write_file("/a", b"one").unwrap();
    fs.link("/a", "/b").unwrap();
    assert_eq!(fs.stat("/a").unwrap().nlink, 2);

    fs.write_file("/b", b"two").unwrap();
    assert_eq!(fs.read_file("/a").unwrap(), b"two");

    fs.unlink("/a").unwrap();
    assert_eq!(fs.read_file("/b").unwrap(), b"two");
    assert_eq!(fs.stat("/b").unwrap().nlink, 1);
    assert_eq!(fs.link("/b", "/b").err(), Some(Errno::Exist));
}

#[test]
fn unlinked_file_stays_readable_through_open_handle() {
    let fs = MemFs::new();
    fs.write_file("/a", b"ghost").unwrap();
    let mut file = fs.open("/a", OpenFlags::RDONLY, 0).unwrap();
    fs.unlink("/a").unwrap();

    assert_eq!(fs.stat("/a").err(), Some(Errno::NotFound));
    let mut buf = [0u8; 5];
    assert_eq!(file.read(&mut buf).unwrap(), 5);
    assert_eq!(&buf, b"ghost");
}

#[test]
fn rename_moves_and_replaces() {
    let fs = MemFs::new();
    fs.mkdir("/d", 0o755).unwrap();
    fs.write_file("/a", b"a").unwrap();
    fs.write_file("/d/b", b"b").unwrap();

    fs.rename("/a", "/d/b").unwrap();
    assert_eq!(fs.stat("/a").err(), Some(Errno::NotFound));
    assert_eq!(fs.read_file("/d/b").unwrap(), b"a");

    fs.rename("/d", "/e").unwrap();
    assert_eq!(fs.read_file("/e/b").unwrap(), b"a");

    fs.mkdir("/f", 0o755).unwrap();
    assert_eq!(fs.rename("/e/b", "/f").err(), Some(Errno::IsDirectory));
    assert_eq!(fs.rename("/missing", "/g").err(), Some(Errno::NotFound));
}

#[test]
fn mkdir_rmdir_unlink() {
    let fs = MemFs::new();
    fs.mkdir("/d", 0o755).unwrap();
    assert_eq!(fs.mkdir("/d", 0o755).err(), Some(Errno::Exist));
    assert_eq!(fs.mkdir("/x/y", 0o755).err(), Some(Errno::NotFound));

    fs.write_file("/d/f", b"").unwrap();
    assert_eq!(fs.rmdir("/d").err(), Some(Errno::Io));
    assert_eq!(fs.unlink("/d").err(), Some(Errno::IsDirectory));

    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(fs.stat("/d").err(), Some(Errno::NotFound));
}

#[test]
fn chmod_and_utimens() {
    let fs = MemFs::new();
    fs.write_file("/a", b"").unwrap();
    fs.chmod("/a", 0o400).unwrap();
    assert_eq!(fs.stat("/a").unwrap().perm, 0o400);

    fs.utimens("/a", Some(1_000), Some(2_000)).unwrap();
    let stat = fs.stat("/a").unwrap();
    assert_eq!((stat.atim, stat.mtim), (1_000, 2_000));

    fs.utimens("/a", None, Some(3_000)).unwrap();
    let stat = fs.stat("/a").unwrap();
    assert_eq!((stat.atim, stat.mtim), (1_000, 3_000));

    let mut file = fs.open("/a", OpenFlags::RDONLY, 0).unwrap();
    file.utimens(Some(5), None).unwrap();
    assert_eq!(fs.stat("/a").unwrap().atim, 5);
}

#[test]
fn trunc_requires_write_access() {
    let fs = MemFs::new();
    fs.write_file("/a", b"keep").unwrap();
    assert_eq!(
        fs.open("/a", OpenFlags::TRUNC, 0).err(),
        Some(Errno::Invalid)
    );
    assert_eq!(fs.read_file("/a").unwrap(), b"keep");
}

#[test]
fn rejected_trunc_creates_nothing() {
    let fs = MemFs::new();
    assert_eq!(
        fs.open("/new", OpenFlags::CREAT | OpenFlags::TRUNC, 0o644).err(),
        Some(Errno::Invalid)
    );
    assert_eq!(fs.stat("/new").err(), Some(Errno::NotFound));
}

#[test]
fn sizes_past_the_limit_fail_without_growing_the_file() {
    let fs = MemFs::new();
    let mut file = fs
        .open("/a", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
        .unwrap();
    file.write(b"abc").unwrap();
    let limit = MAX_FILE_SIZE as i64;

    assert_eq!(file.truncate(i64::MAX).err(), Some(Errno::Invalid));
    assert_eq!(file.truncate(limit + 1).err(), Some(Errno::Invalid));
    assert_eq!(file.truncate(-1).err(), Some(Errno::Invalid));
    assert_eq!(file.pwrite(b"x", i64::MAX).err(), Some(Errno::Invalid));
    assert_eq!(file.pwrite(b"xy", limit - 1).err(), Some(Errno::Invalid));
    assert_eq!(file.pwrite(b"x", -1).err(), Some(Errno::Invalid));

    assert_eq!(fs.read_file("/a").unwrap(), b"abc");
    assert_eq!(file.stat().unwrap().size, 3);
}

#[test]
fn seek_to_extreme_offsets() {
    let fs = MemFs::new();
    let mut file = fs
        .open("/a", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
        .unwrap();
    file.write(b"abc").unwrap();

    assert_eq!(file.seek(i64::MAX, Whence::Start).unwrap(), i64::MAX);
    let mut buf = [0u8; 4];
    assert_eq!(file.read(&mut buf).unwrap(), 0);
    assert_eq!(file.write(b"x").err(), Some(Errno::Invalid));
    assert_eq!(file.seek(1, Whence::Current).err(), Some(Errno::Invalid));

    assert_eq!(file.seek(-1, Whence::Start).err(), Some(Errno::Invalid));
    assert_eq!(file.seek(i64::MIN, Whence::End).err(), Some(Errno::Invalid));
    assert_eq!(file.pread(&mut buf, i64::MAX).unwrap(), 0);
    assert_eq!(fs.read_file("/a").unwrap(), b"abc");
}

#[test]
fn handle_keeps_ino_of_its_open_path_across_rename() {
    let fs = MemFs::new();
    fs.write_file("/a", b"x").unwrap();
    let before = fs.stat("/a").unwrap().ino;
    let mut file = fs.open("/a", OpenFlags::RDONLY, 0).unwrap();

    fs.rename("/a", "/b").unwrap();
    assert_eq!(file.ino().unwrap(), before);
    assert_eq!(file.stat().unwrap().ino, before);
    assert_ne!(fs.stat("/b").unwrap().ino, before);
}
