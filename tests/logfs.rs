use std::sync::Arc;

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use wasm_fs::logfs::{BufferSink, LogConfig, LoggingFs, Payload, WriterSink, REDACTED};
use wasm_fs::memfs::{MemFs, MAX_FILE_SIZE};
use wasm_fs::script::{self, Call};
use wasm_fs::sys::{Errno, FileSystem, OpenFlags, Whence};

fn logged(payload: Payload) -> (Arc<BufferSink>, LoggingFs<MemFs>) {
    let sink = Arc::new(BufferSink::new());
    let config = LogConfig::new("memfs", sink.clone()).with_payload(payload);
    (sink, LoggingFs::new(MemFs::new(), config))
}

#[test]
fn path_calls_log_params_and_results() {
    let (sink, fs) = logged(Payload::Redacted);
    fs.mkdir("/d", 0o755).unwrap();
    assert_eq!(fs.stat("/missing").err(), Some(Errno::NotFound));

    let lines = sink.lines();
    assert_eq!(
        lines,
        [
            "LogFS memfs Mkdir: calling with params: \"/d\" 0o755",
            "LogFS memfs Mkdir: returned results: errno=0",
            "LogFS memfs Stat: calling with params: \"/missing\"",
            "LogFS memfs Stat: returned results: errno=ENOENT",
        ]
    );
}

#[test]
fn open_logs_flags_and_handle() {
    let (sink, fs) = logged(Payload::Redacted);
    let flags = OpenFlags::WRONLY | OpenFlags::CREAT;
    let mut file = fs.open("/a", flags, 0o644).unwrap();
    file.close().unwrap();

    let lines = sink.lines();
    assert_eq!(
        lines[0],
        "LogFS memfs OpenFile: calling with params: \"/a\" O_WRONLY|O_CREAT; 0o644"
    );
    assert_eq!(
        lines[1],
        "LogFS memfs OpenFile: returned results: handle=\"/a\" errno=0"
    );
    assert_eq!(
        lines[2],
        "LogFS memfs \"/a\" Close: calling with params: (none)"
    );
    assert_eq!(lines[3], "LogFS memfs \"/a\" Close: returned results: errno=0");
}

#[test]
fn payload_bytes_are_redacted_by_default() {
    let (sink, fs) = logged(Payload::default());
    let mut file = fs
        .open("/a", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
        .unwrap();
    file.write(b"AB").unwrap();

    let lines = sink.lines();
    let write_lines: Vec<_> = lines.iter().filter(|l| l.contains(" Write: ")).collect();
    assert_eq!(write_lines.len(), 2);
    assert!(write_lines[0].ends_with(&format!("calling with params: {REDACTED}")));
    assert!(write_lines[1].ends_with("returned results: 2, buffer: (data) errno=0"));
    assert!(lines.iter().all(|l| !l.contains("[65, 66]")));
}

#[test]
fn raw_payload_shows_bytes() {
    let (sink, fs) = logged(Payload::Raw);
    let mut file = fs
        .open("/a", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
        .unwrap();
    file.write(b"AB").unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(file.pread(&mut buf, 0).unwrap(), 2);

    let lines = sink.lines();
    assert!(lines
        .iter()
        .any(|l| l.ends_with("Write: calling with params: [65, 66]")));
    assert!(lines
        .iter()
        .any(|l| l.ends_with("Pread: returned results: 2, buffer: [65, 66] errno=0")));
    assert!(lines
        .iter()
        .any(|l| l.ends_with("Pread: calling with params: len=8 0")));
}

#[test]
fn failed_open_creates_no_handle_records() {
    let (sink, fs) = logged(Payload::Redacted);
    assert_eq!(
        fs.open("/missing", OpenFlags::RDONLY, 0).err(),
        Some(Errno::NotFound)
    );

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        "LogFS memfs OpenFile: returned results: errno=ENOENT"
    );
}

#[test]
fn every_call_has_a_before_and_after_record() {
    let (sink, fs) = logged(Payload::Redacted);
    let mut file = fs
        .open("/a", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
        .unwrap();
    file.write(b"xyz").unwrap();
    file.seek(1, Whence::Start).unwrap();
    let _ = file.is_append();
    file.set_append(true).unwrap();
    file.sync().unwrap();
    file.close().unwrap();
    assert_eq!(file.close().err(), Some(Errno::Invalid));

    let lines = sink.lines();
    let before = lines.iter().filter(|l| l.contains("calling with params")).count();
    let after = lines.iter().filter(|l| l.contains("returned results")).count();
    assert_eq!(before, 8);
    assert_eq!(after, 8);
    assert!(lines
        .iter()
        .any(|l| l.ends_with("Seek: calling with params: 1 SeekStart")));
    assert!(lines
        .iter()
        .any(|l| l.ends_with("IsAppend: returned results: false")));
    assert!(lines
        .last()
        .unwrap()
        .ends_with("Close: returned results: errno=EINVAL"));
}

#[test]
fn decorator_returns_base_values() {
    let (_sink, fs) = logged(Payload::Redacted);
    fs.base().write_file("/f", b"data").unwrap();
    fs.symlink("/f", "/l").unwrap();

    assert_eq!(fs.readlink("/l").unwrap(), "/f");
    assert_eq!(fs.stat("/l").unwrap(), fs.base().stat("/l").unwrap());
    assert_eq!(
        fs.open("/", OpenFlags::WRONLY, 0).err(),
        Some(Errno::IsDirectory)
    );

    let mut dir = fs.open("/", OpenFlags::RDONLY, 0).unwrap();
    let names: Vec<_> = dir.readdir(0).unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, ["f", "l"]);
}

#[test]
fn writer_sink_writes_one_line_per_record() {
    let out = tempfile::NamedTempFile::new().unwrap();
    let sink = Arc::new(WriterSink::new(out.reopen().unwrap()));
    let fs = LoggingFs::new(MemFs::new(), LogConfig::new("mem", sink));
    fs.mkdir("/d", 0o700).unwrap();
    drop(fs);

    let text = std::fs::read_to_string(out.path()).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("LogFS mem Mkdir: calling with params:"));
}

const PATHS: &[&str] = &["/a", "/b", "/d", "/d/x", "/l", "/missing/y"];

/// Short call sequence over a small namespace so calls collide often.
#[derive(Debug, Clone)]
struct Ops(Vec<Call>);

fn path(g: &mut Gen) -> String {
    g.choose(PATHS).unwrap().to_string()
}

fn fd(g: &mut Gen) -> usize {
    usize::arbitrary(g) % 4
}

fn data(g: &mut Gen) -> Vec<u8> {
    let len = usize::arbitrary(g) % 16;
    (0..len).map(|_| u8::arbitrary(g)).collect()
}

/// Mostly small offsets, sometimes one that must be rejected.
fn offset(g: &mut Gen) -> i64 {
    if u8::arbitrary(g) % 6 == 0 {
        let past_limit = MAX_FILE_SIZE as i64 + 1;
        *g.choose(&[i64::MIN, -1, past_limit, i64::MAX]).unwrap()
    } else {
        i64::from(u8::arbitrary(g) % 32)
    }
}

fn read_len(g: &mut Gen) -> usize {
    if u8::arbitrary(g) % 8 == 0 {
        usize::MAX
    } else {
        usize::arbitrary(g) % 32
    }
}

fn flags(g: &mut Gen) -> OpenFlags {
    let choices = [
        OpenFlags::RDONLY,
        OpenFlags::WRONLY | OpenFlags::CREAT,
        OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::TRUNC,
        OpenFlags::RDWR | OpenFlags::APPEND,
        OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::EXCL,
        OpenFlags::RDONLY | OpenFlags::DIRECTORY,
        OpenFlags::RDWR | OpenFlags::WRONLY,
    ];
    *g.choose(&choices).unwrap()
}

impl Arbitrary for Ops {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 24;
        let calls = (0..len)
            .map(|_| match u8::arbitrary(g) % 16 {
                0 | 1 => Call::Open {
                    path: path(g),
                    flags: flags(g),
                    perm: 0o644,
                },
                2 => Call::Stat { path: path(g) },
                3 => Call::Mkdir {
                    path: path(g),
                    perm: 0o755,
                },
                4 => Call::Unlink { path: path(g) },
                5 => Call::Rmdir { path: path(g) },
                6 => Call::Rename {
                    from: path(g),
                    to: path(g),
                },
                7 => Call::Symlink {
                    target: path(g),
                    link_path: path(g),
                },
                8 => Call::Link {
                    old_path: path(g),
                    new_path: path(g),
                },
                9 => Call::Write {
                    fd: fd(g),
                    data: data(g),
                },
                10 => Call::Pwrite {
                    fd: fd(g),
                    data: data(g),
                    offset: offset(g),
                },
                11 => Call::Read {
                    fd: fd(g),
                    len: read_len(g),
                },
                12 => Call::Seek {
                    fd: fd(g),
                    offset: if bool::arbitrary(g) {
                        offset(g)
                    } else {
                        i64::from(i8::arbitrary(g))
                    },
                    whence: *g
                        .choose(&[Whence::Start, Whence::Current, Whence::End])
                        .unwrap(),
                },
                13 => Call::Readdir {
                    fd: fd(g),
                    max: usize::arbitrary(g) % 3,
                },
                14 => Call::Truncate {
                    fd: fd(g),
                    size: offset(g),
                },
                _ => Call::Close { fd: fd(g) },
            })
            .collect();
        Ops(calls)
    }
}

#[quickcheck]
fn logging_never_changes_outcomes(ops: Ops) -> bool {
    let plain = MemFs::new();
    let (sink, logged) = logged(Payload::Raw);

    let expected = script::run(&plain, &ops.0);
    let actual = script::run(&logged, &ops.0);

    let lines = sink.lines();
    let before = lines.iter().filter(|l| l.contains("calling with params")).count();
    let after = lines.iter().filter(|l| l.contains("returned results")).count();
    expected == actual && before == after
}
