//! Free-space accounting across every size-changing operation.

use std::io::{Seek, SeekFrom, Write};

use vdrive_core::*;

const C_CAPACITY: u64 = 64 * 1024;
const D_CAPACITY: u64 = 4 * 1024;

fn two_volumes() -> FileSystem {
    let config = FsConfig {
        include_default_drive: false,
        volumes: vec![
            VolumeConfig::new("C:", C_CAPACITY),
            VolumeConfig::new("D:", D_CAPACITY),
        ],
        ..FsConfig::default()
    };
    FileSystem::new(config).unwrap()
}

/// Sum of the lengths of every file on `drive`.
fn stored_bytes(fs: &FileSystem, drive: &str) -> u64 {
    fs.directory()
        .get_files(drive, "*", SearchOption::AllDirectories)
        .unwrap()
        .iter()
        .map(|path| fs.file().read_all_bytes(path).unwrap().len() as u64)
        .sum()
}

fn assert_balanced(fs: &FileSystem) {
    for drive in fs.drive().get_drives() {
        assert_eq!(
            drive.total_size - drive.total_free_space,
            stored_bytes(fs, &drive.name),
            "ledger out of balance on {}",
            drive.name
        );
        assert_eq!(drive.available_free_space, drive.total_free_space);
    }
}

fn free(fs: &FileSystem, drive: &str) -> u64 {
    fs.drive().get_drive(drive).unwrap().total_free_space
}

#[test]
fn test_writes_and_truncation_balance() {
    let fs = two_volumes();
    fs.file().write_all_bytes(r"C:\a.bin", &[7; 100]).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 100);

    let mut stream = fs
        .file()
        .open(r"C:\a.bin", FileMode::Open, FileAccess::ReadWrite)
        .unwrap();
    stream.set_len(500).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 500);
    stream.set_len(50).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 50);

    stream.seek(SeekFrom::Start(1000)).unwrap();
    stream.write_all(&[1]).unwrap();
    assert_eq!(stream.len().unwrap(), 1001);
    drop(stream);
    assert_balanced(&fs);

    fs.file().append_all_bytes(r"C:\a.bin", &[2; 24]).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 1025);

    fs.file().write_all_bytes(r"C:\a.bin", &[3; 10]).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 10);
    assert_balanced(&fs);
}

#[test]
fn test_copy_and_overwrite_balance() {
    let fs = two_volumes();
    fs.file().write_all_bytes(r"C:\src.bin", &[1; 300]).unwrap();
    fs.file().write_all_bytes(r"C:\small.bin", &[1; 20]).unwrap();

    fs.file().copy(r"C:\src.bin", r"D:\copy.bin", false).unwrap();
    assert_eq!(free(&fs, "D:"), D_CAPACITY - 300);

    fs.file().copy(r"C:\small.bin", r"D:\copy.bin", true).unwrap();
    assert_eq!(free(&fs, "D:"), D_CAPACITY - 20);
    assert_eq!(fs.file().read_all_bytes(r"D:\copy.bin").unwrap().len(), 20);

    let err = fs.file().copy(r"C:\src.bin", r"D:\copy.bin", false).unwrap_err();
    assert_eq!(err.to_string(), r"The file 'D:\copy.bin' already exists.");
    assert_balanced(&fs);
}

#[test]
fn test_copy_that_does_not_fit_changes_nothing() {
    let fs = two_volumes();
    fs.file()
        .write_all_bytes(r"C:\huge.bin", &vec![0; D_CAPACITY as usize + 1])
        .unwrap();

    let err = fs.file().copy(r"C:\huge.bin", r"D:\huge.bin", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientDiskSpace);
    assert!(!fs.file().exists(r"D:\huge.bin"));
    assert_eq!(free(&fs, "D:"), D_CAPACITY);
    assert_balanced(&fs);
}

#[test]
fn test_cross_volume_moves_transfer_usage() {
    let fs = two_volumes();
    fs.directory().create_directory(r"C:\proj\src").unwrap();
    fs.file().write_all_bytes(r"C:\proj\src\main.rs", &[b'x'; 400]).unwrap();
    fs.file().write_all_bytes(r"C:\proj\readme", &[b'y'; 100]).unwrap();
    fs.file().write_all_bytes(r"C:\loose.bin", &[b'z'; 50]).unwrap();

    fs.file().move_file(r"C:\loose.bin", r"D:\loose.bin", false).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 500);
    assert_eq!(free(&fs, "D:"), D_CAPACITY - 50);

    fs.directory().move_directory(r"C:\proj", r"D:\proj").unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY);
    assert_eq!(free(&fs, "D:"), D_CAPACITY - 550);
    assert_eq!(
        fs.file().read_all_bytes(r"D:\proj\src\main.rs").unwrap().len(),
        400
    );
    assert!(!fs.directory().exists(r"C:\proj"));
    assert_balanced(&fs);
}

#[test]
fn test_cross_volume_move_that_does_not_fit_is_rejected() {
    let fs = two_volumes();
    fs.directory().create_directory(r"C:\big").unwrap();
    fs.file()
        .write_all_bytes(r"C:\big\blob", &vec![0; D_CAPACITY as usize + 10])
        .unwrap();

    let err = fs.directory().move_directory(r"C:\big", r"D:\big").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientDiskSpace);
    assert!(fs.file().exists(r"C:\big\blob"));
    assert!(!fs.directory().exists(r"D:\big"));
    assert_balanced(&fs);
}

#[test]
fn test_move_over_existing_file_credits_the_replaced_bytes() {
    let fs = two_volumes();
    fs.file().write_all_bytes(r"C:\new.txt", &[1; 10]).unwrap();
    fs.file().write_all_bytes(r"C:\old.txt", &[2; 90]).unwrap();

    let err = fs.file().move_file(r"C:\new.txt", r"C:\old.txt", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    fs.file().move_file(r"C:\new.txt", r"C:\old.txt", true).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 10);
    assert!(!fs.file().exists(r"C:\new.txt"));
    assert_balanced(&fs);
}

#[test]
fn test_replace_with_backup_balances() {
    let fs = two_volumes();
    fs.file().write_all_bytes(r"C:\next.cfg", &[1; 30]).unwrap();
    fs.file().write_all_bytes(r"C:\live.cfg", &[2; 70]).unwrap();
    fs.file().write_all_bytes(r"C:\live.bak", &[3; 5]).unwrap();
    fs.file()
        .set_attributes(r"C:\live.cfg", FileAttributes::HIDDEN)
        .unwrap();

    fs.file()
        .replace(r"C:\next.cfg", r"C:\live.cfg", Some(r"C:\live.bak"))
        .unwrap();

    assert!(!fs.file().exists(r"C:\next.cfg"));
    assert_eq!(fs.file().read_all_bytes(r"C:\live.cfg").unwrap(), vec![1; 30]);
    assert_eq!(fs.file().read_all_bytes(r"C:\live.bak").unwrap(), vec![2; 70]);
    assert_eq!(
        fs.file().get_attributes(r"C:\live.cfg").unwrap(),
        FileAttributes::HIDDEN
    );
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 100);
    assert_balanced(&fs);

    fs.file().write_all_bytes(r"C:\next.cfg", &[4; 8]).unwrap();
    fs.file().replace(r"C:\next.cfg", r"C:\live.cfg", None).unwrap();
    assert_eq!(free(&fs, "C:"), C_CAPACITY - 78);
    assert_balanced(&fs);
}

#[test]
fn test_deletes_release_space() {
    let fs = two_volumes();
    fs.directory().create_directory(r"D:\tree\a\b").unwrap();
    fs.file().write_all_bytes(r"D:\tree\a\one", &[0; 100]).unwrap();
    fs.file().write_all_bytes(r"D:\tree\a\b\two", &[0; 200]).unwrap();
    fs.file().write_all_bytes(r"D:\keep", &[0; 5]).unwrap();

    fs.directory().delete(r"D:\tree", true).unwrap();
    assert_eq!(free(&fs, "D:"), D_CAPACITY - 5);

    fs.file().delete(r"D:\keep").unwrap();
    assert_eq!(free(&fs, "D:"), D_CAPACITY);
    assert_balanced(&fs);
}

#[test]
fn test_configured_free_space_is_capped_at_capacity() {
    let mut volume = VolumeConfig::new("E:", 1000);
    volume.free_space = Some(5000);
    let fs = FileSystem::new(FsConfig::default().with_volume(volume)).unwrap();
    let drive = fs.drive().get_drive("E").unwrap();
    assert_eq!(drive.total_free_space, 1000);
    assert_eq!(drive.name, r"E:\");
}

#[test]
fn test_unaddressable_writes_leave_the_ledger_alone() {
    let fs = two_volumes();
    let mut stream = fs.file().create(r"D:\edge.bin").unwrap();
    stream.write_all(b"abcd").unwrap();

    stream.seek(SeekFrom::Start(u64::MAX - 1)).unwrap();
    let err = stream.write(b"wxyz").unwrap_err();
    assert!(err.to_string().starts_with("There is not enough space on the disk."));

    let err = stream.set_len(u64::MAX).unwrap_err();
    assert!(err.to_string().starts_with("There is not enough space on the disk."));

    assert_eq!(stream.len().unwrap(), 4);
    drop(stream);
    assert_eq!(free(&fs, "D:"), D_CAPACITY - 4);
    assert_balanced(&fs);
}
