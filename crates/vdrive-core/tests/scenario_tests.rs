//! End-to-end scenarios against the public facade.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use vdrive_core::*;

fn single_volume(capacity: u64, free: u64) -> FileSystem {
    let mut volume = VolumeConfig::new("C:", capacity);
    volume.free_space = Some(free);
    FileSystem::new(FsConfig::default().with_volume(volume)).unwrap()
}

#[test]
fn test_write_beyond_free_space_leaves_file_empty() {
    let fs = single_volume(8192, 512);

    let err = fs.file().write_all_bytes(r"C:\big.bin", &[0xAB; 1024]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientDiskSpace);
    assert!(err.to_string().starts_with("There is not enough space on the disk."));

    assert!(fs.file().exists(r"C:\big.bin"));
    assert!(fs.file().read_all_bytes(r"C:\big.bin").unwrap().is_empty());
    assert_eq!(fs.drive().get_drive("C:").unwrap().total_free_space, 512);
}

#[test]
fn test_write_debits_exact_bytes() {
    let fs = single_volume(8192, 4096);
    fs.file().write_all_bytes(r"C:\file.bin", &[1; 1024]).unwrap();

    let drive = fs.drive().get_drive("C:").unwrap();
    assert_eq!(drive.total_free_space, 3072);
    assert_eq!(drive.available_free_space, 3072);
    assert_eq!(drive.total_size, 8192);
}

#[test]
fn test_pattern_question_mark() {
    assert!(PathPattern::new("*.ba?").unwrap().is_match("file.bak"));
}

#[test]
fn test_create_raises_one_created_event() {
    let fs = FileSystem::new(FsConfig::default()).unwrap();
    fs.directory().create_directory(r"C:\some").unwrap();

    let watcher = fs.create_watcher(r"C:\some").unwrap();
    watcher.set_notify_filter(NotifyFilters::all());
    watcher.set_enabled(true);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = |events: &Arc<Mutex<Vec<FileSystemEventArgs>>>| {
        let events = Arc::clone(events);
        move |e: &FileSystemEventArgs| events.lock().unwrap().push(e.clone())
    };
    watcher.on_created(sink(&events));
    watcher.on_deleted(sink(&events));
    watcher.on_changed(sink(&events));
    watcher.on_renamed(sink(&events));

    drop(fs.file().create(r"C:\some\file.txt").unwrap());
    assert!(watcher.wait_idle(Duration::from_secs(5)));
    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, ChangeKind::Created);
        assert_eq!(events[0].name, "file.txt");
        assert_eq!(events[0].full_path, r"C:\some\file.txt");
    }

    drop(fs.file().create(r"C:\some\file.txt").unwrap());
    assert!(watcher.wait_idle(Duration::from_secs(5)));
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn test_temp_file_name_takes_first_free_slot() {
    let files = (0..=0xFFFF_u32)
        .filter(|i| *i != 0x1234)
        .map(|i| FileSeed::new(format!(r"C:\Temp\tmp{i:X}.tmp"), Vec::new()))
        .collect();
    let config = FsConfig {
        files,
        ..FsConfig::default()
    };
    let fs = FileSystem::new(config).unwrap();

    assert_eq!(fs.path().get_temp_file_name().unwrap(), r"C:\Temp\tmp1234.tmp");

    let err = fs.path().get_temp_file_name().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(err.to_string().starts_with("The file exists."));
    assert_eq!(err.path(), r"C:\Temp");
}

#[test]
fn test_lookup_is_case_insensitive_and_case_preserving() {
    let fs = FileSystem::new(FsConfig::default()).unwrap();
    fs.directory().create_directory(r"C:\Some\Folder").unwrap();
    assert!(fs.directory().exists(r"c:\SOME\folder"));

    fs.directory().create_directory(r"c:\some\FOLDER\Inner").unwrap();
    let dirs = fs
        .directory()
        .get_directories(r"C:\", "*", SearchOption::AllDirectories)
        .unwrap();
    assert_eq!(
        dirs,
        vec![
            r"C:\Some".to_string(),
            r"C:\Some\Folder".to_string(),
            r"C:\Some\Folder\Inner".to_string(),
        ]
    );
}

#[test]
fn test_path_round_trip_resolves_to_same_entry() {
    let fs = FileSystem::new(FsConfig::default()).unwrap();
    fs.directory().create_directory(r"C:\a").unwrap();
    fs.file().write_all_text(r"C:\a\.\..\b.txt", "x").unwrap();

    let path = AbsolutePath::parse(r"c:/a/../B.TXT").unwrap();
    let rendered = path.to_string();
    assert_eq!(rendered, r"c:\B.TXT");
    assert_eq!(fs.file().read_all_text(&rendered).unwrap(), "x");
}

#[test]
fn test_non_recursive_delete_of_non_empty_directory() {
    let fs = FileSystem::new(FsConfig::default()).unwrap();
    fs.directory().create_directory(r"C:\dir\child").unwrap();

    let err = fs.directory().delete(r"C:\dir", false).unwrap_err();
    assert!(err.to_string().starts_with("The directory is not empty."));
    assert!(fs.directory().exists(r"C:\dir\child"));

    fs.directory().delete(r"C:\dir", true).unwrap();
    assert!(!fs.directory().exists(r"C:\dir"));
}
