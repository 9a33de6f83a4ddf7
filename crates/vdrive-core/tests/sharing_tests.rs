//! Share-mode rules and all-or-nothing deletes.

use std::io::{Read, Write};

use vdrive_core::*;

fn fs_with_file(path: &str, content: &str) -> FileSystem {
    let fs = FileSystem::new(FsConfig::default()).unwrap();
    if let Some((parent, _)) = path.rsplit_once('\\').filter(|(p, _)| p.contains('\\')) {
        fs.directory().create_directory(parent).unwrap();
    }
    fs.file().write_all_text(path, content).unwrap();
    fs
}

fn open(fs: &FileSystem, path: &str, access: FileAccess, share: FileShare) -> FsResult<FileStream> {
    let mut options = OpenOptions::new(FileMode::Open);
    options.access = access;
    options.share = share;
    fs.file().open_with(path, options)
}

#[test]
fn test_readers_coexist_when_both_share_read() {
    let fs = fs_with_file(r"C:\data.txt", "shared");
    let _first = open(&fs, r"C:\data.txt", FileAccess::Read, FileShare::READ).unwrap();
    let mut second = open(&fs, r"C:\data.txt", FileAccess::Read, FileShare::READ).unwrap();

    let mut text = String::new();
    second.read_to_string(&mut text).unwrap();
    assert_eq!(text, "shared");
}

#[test]
fn test_writer_refused_while_reader_only_shares_read() {
    let fs = fs_with_file(r"C:\data.txt", "x");
    let _reader = open(&fs, r"C:\data.txt", FileAccess::Read, FileShare::READ).unwrap();

    let err = open(&fs, r"C:\data.txt", FileAccess::Write, FileShare::READ_WRITE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);
    assert_eq!(
        err.to_string(),
        r"The process cannot access the file 'C:\data.txt' because it is being used by another process."
    );
}

#[test]
fn test_share_rule_is_symmetric() {
    let fs = fs_with_file(r"C:\data.txt", "x");
    let _writer = open(&fs, r"C:\data.txt", FileAccess::Write, FileShare::READ).unwrap();

    // The writer lets readers in, but this reader does not tolerate a writer.
    let err = open(&fs, r"C:\data.txt", FileAccess::Read, FileShare::READ).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);

    let _reader = open(&fs, r"C:\data.txt", FileAccess::Read, FileShare::READ_WRITE).unwrap();
}

#[test]
fn test_closing_releases_the_lock() {
    let fs = fs_with_file(r"C:\data.txt", "x");
    let mut exclusive = open(&fs, r"C:\data.txt", FileAccess::ReadWrite, FileShare::empty()).unwrap();
    assert!(fs.file().read_all_text(r"C:\data.txt").is_err());

    exclusive.close().unwrap();
    assert!(!exclusive.can_read());
    let err = exclusive.write(b"late").unwrap_err();
    assert_eq!(err.to_string(), "Cannot access a closed file.");
    assert_eq!(fs.file().read_all_text(r"C:\data.txt").unwrap(), "x");
}

#[test]
fn test_open_handle_blocks_delete_and_move_without_delete_share() {
    let fs = fs_with_file(r"C:\dir\locked.txt", "x");
    let _stream = open(&fs, r"C:\dir\locked.txt", FileAccess::Read, FileShare::READ).unwrap();

    let err = fs.file().delete(r"C:\dir\locked.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);
    let err = fs
        .file()
        .move_file(r"C:\dir\locked.txt", r"C:\dir\moved.txt", false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);
    assert!(fs.file().exists(r"C:\dir\locked.txt"));
}

#[test]
fn test_delete_share_permits_delete() {
    let fs = fs_with_file(r"C:\dir\temp.txt", "x");
    let _stream = open(
        &fs,
        r"C:\dir\temp.txt",
        FileAccess::Read,
        FileShare::READ | FileShare::DELETE,
    )
    .unwrap();

    fs.file().delete(r"C:\dir\temp.txt").unwrap();
    assert!(!fs.file().exists(r"C:\dir\temp.txt"));
}

#[test]
fn test_copy_source_must_admit_a_reader() {
    let fs = fs_with_file(r"C:\busy.txt", "x");
    let _writer = open(&fs, r"C:\busy.txt", FileAccess::Write, FileShare::empty()).unwrap();

    let err = fs.file().copy(r"C:\busy.txt", r"C:\copy.txt", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);
    assert_eq!(err.path(), r"C:\busy.txt");
    assert!(!fs.file().exists(r"C:\copy.txt"));
}

#[test]
fn test_recursive_delete_is_all_or_nothing() {
    let fs = FileSystem::new(FsConfig::default()).unwrap();
    fs.directory().create_directory(r"C:\root\a\deep").unwrap();
    fs.directory().create_directory(r"C:\root\b").unwrap();
    fs.file().write_all_text(r"C:\root\a\first.txt", "1").unwrap();
    fs.file().write_all_text(r"C:\root\a\deep\open.txt", "2").unwrap();
    fs.file().write_all_text(r"C:\root\b\last.txt", "3").unwrap();
    let before = fs
        .directory()
        .get_file_system_entries(r"C:\root", "*", SearchOption::AllDirectories)
        .unwrap();

    let stream = fs.file().open_read(r"C:\root\a\deep\open.txt").unwrap();
    let err = fs.directory().delete(r"C:\root", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);
    assert_eq!(err.path(), r"C:\root\a\deep\open.txt");

    let after = fs
        .directory()
        .get_file_system_entries(r"C:\root", "*", SearchOption::AllDirectories)
        .unwrap();
    assert_eq!(before, after);

    drop(stream);
    fs.directory().delete(r"C:\root", true).unwrap();
    assert!(!fs.directory().exists(r"C:\root"));
}

#[test]
fn test_read_only_entry_aborts_recursive_delete() {
    let fs = fs_with_file(r"C:\keep\inner\pinned.txt", "x");
    fs.file()
        .set_attributes(r"C:\keep\inner\pinned.txt", FileAttributes::READ_ONLY)
        .unwrap();

    let err = fs.directory().delete(r"C:\keep", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(err.path(), r"C:\keep\inner\pinned.txt");
    assert!(fs.file().exists(r"C:\keep\inner\pinned.txt"));
}

#[test]
fn test_open_file_blocks_directory_move() {
    let fs = fs_with_file(r"C:\src\log.txt", "x");
    let _stream = fs.file().open_read(r"C:\src\log.txt").unwrap();

    let err = fs.directory().move_directory(r"C:\src", r"C:\dst").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);
    assert_eq!(err.path(), r"C:\src\log.txt");
    assert!(fs.directory().exists(r"C:\src"));
}

#[test]
fn test_stream_access_is_enforced() {
    let fs = fs_with_file(r"C:\ro.txt", "abc");
    let mut reader = fs.file().open_read(r"C:\ro.txt").unwrap();
    assert!(reader.can_read());
    assert!(!reader.can_write());
    let err = reader.write(b"x").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);

    let mut writer = fs
        .file()
        .open(r"C:\wo.txt", FileMode::CreateNew, FileAccess::Write)
        .unwrap();
    let mut buf = [0u8; 4];
    let err = writer.read(&mut buf).unwrap_err();
    assert_eq!(err.to_string(), "Stream does not support reading.");
}

#[test]
fn test_handle_follows_renamed_file() {
    let fs = fs_with_file(r"C:\before.txt", "");
    let mut stream = open(
        &fs,
        r"C:\before.txt",
        FileAccess::Write,
        FileShare::READ | FileShare::DELETE,
    )
    .unwrap();

    fs.file().move_file(r"C:\before.txt", r"C:\after.txt", false).unwrap();
    stream.write_all(b"moved").unwrap();
    drop(stream);
    assert_eq!(fs.file().read_all_text(r"C:\after.txt").unwrap(), "moved");
}
