//! Change notification through the public watcher API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use vdrive_core::*;

const IDLE: Duration = Duration::from_secs(5);

type Log = Arc<Mutex<Vec<FileSystemEventArgs>>>;

fn record(log: &Log) -> impl Fn(&FileSystemEventArgs) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |event: &FileSystemEventArgs| log.lock().unwrap().push(event.clone())
}

/// Enabled watcher on `dir` recording every kind of event into one log.
fn watch(fs: &FileSystem, dir: &str) -> (FileSystemWatcher, Log) {
    fs.directory().create_directory(dir).unwrap();
    let watcher = fs.create_watcher(dir).unwrap();
    let log = Log::default();
    watcher.on_created(record(&log));
    watcher.on_deleted(record(&log));
    watcher.on_changed(record(&log));
    watcher.on_renamed(record(&log));
    watcher.set_enabled(true);
    (watcher, log)
}

fn drain(watcher: &FileSystemWatcher, log: &Log) -> Vec<FileSystemEventArgs> {
    assert!(watcher.wait_idle(IDLE));
    std::mem::take(&mut *log.lock().unwrap())
}

fn new_fs() -> FileSystem {
    FileSystem::new(FsConfig::default()).unwrap()
}

#[test]
fn test_watcher_defaults() {
    let fs = new_fs();
    let watcher = fs.create_watcher(r"c:\").unwrap();
    assert!(!watcher.is_enabled());
    assert!(!watcher.include_subdirectories());
    assert_eq!(
        watcher.notify_filter(),
        NotifyFilters::FILE_NAME | NotifyFilters::DIRECTORY_NAME | NotifyFilters::LAST_WRITE
    );
    assert_eq!(watcher.path().to_string(), r"C:\");
}

#[test]
fn test_watching_a_missing_directory_fails() {
    let fs = new_fs();
    let err = fs.create_watcher(r"C:\nope").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFoundDirectory);
}

#[test]
fn test_disabled_watcher_sees_nothing() {
    let fs = new_fs();
    let (watcher, log) = watch(&fs, r"C:\w");
    watcher.set_enabled(false);
    fs.file().write_all_text(r"C:\w\quiet.txt", "x").unwrap();
    assert!(drain(&watcher, &log).is_empty());
}

#[test]
fn test_rename_inside_scope() {
    let fs = new_fs();
    let (watcher, log) = watch(&fs, r"C:\w");
    fs.file().write_all_text(r"C:\w\a.txt", "x").unwrap();
    drain(&watcher, &log);

    fs.file().move_file(r"C:\w\a.txt", r"C:\w\b.txt", false).unwrap();
    let events = drain(&watcher, &log);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].change_type, ChangeKind::Renamed);
    assert_eq!(events[0].name, "b.txt");
    assert_eq!(events[0].old_name.as_deref(), Some("a.txt"));
    assert_eq!(events[0].old_full_path.as_deref(), Some(r"C:\w\a.txt"));
}

#[test]
fn test_moves_across_the_watched_boundary() {
    let fs = new_fs();
    fs.directory().create_directory(r"C:\outside").unwrap();
    let (watcher, log) = watch(&fs, r"C:\w");
    fs.file().write_all_text(r"C:\w\leaving.txt", "x").unwrap();
    fs.file().write_all_text(r"C:\outside\arriving.txt", "y").unwrap();
    drain(&watcher, &log);

    fs.file()
        .move_file(r"C:\w\leaving.txt", r"C:\outside\leaving.txt", false)
        .unwrap();
    fs.file()
        .move_file(r"C:\outside\arriving.txt", r"C:\w\arriving.txt", false)
        .unwrap();

    let events = drain(&watcher, &log);
    let kinds: Vec<_> = events.iter().map(|e| (e.change_type, e.name.as_str())).collect();
    assert_eq!(
        kinds,
        vec![
            (ChangeKind::Deleted, "leaving.txt"),
            (ChangeKind::Created, "arriving.txt"),
        ]
    );
}

#[test]
fn test_subdirectories_only_when_requested() {
    let fs = new_fs();
    let (watcher, log) = watch(&fs, r"C:\w");
    fs.directory().create_directory(r"C:\w\sub").unwrap();
    drain(&watcher, &log);

    fs.file().write_all_text(r"C:\w\sub\deep.txt", "x").unwrap();
    assert!(drain(&watcher, &log).is_empty());

    watcher.set_include_subdirectories(true);
    fs.file().write_all_text(r"C:\w\sub\deeper.txt", "").unwrap();
    let events = drain(&watcher, &log);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, r"sub\deeper.txt");
    assert_eq!(events[0].full_path, r"C:\w\sub\deeper.txt");
}

#[test]
fn test_notify_filter_gates_event_kinds() {
    let fs = new_fs();
    let (watcher, log) = watch(&fs, r"C:\w");
    fs.file().write_all_text(r"C:\w\f.txt", "x").unwrap();
    drain(&watcher, &log);

    watcher.set_notify_filter(NotifyFilters::DIRECTORY_NAME);
    fs.file().write_all_text(r"C:\w\g.txt", "").unwrap();
    fs.file().append_all_text(r"C:\w\f.txt", "more").unwrap();
    fs.directory().create_directory(r"C:\w\dir").unwrap();
    let events = drain(&watcher, &log);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "dir");

    watcher.set_notify_filter(NotifyFilters::ATTRIBUTES);
    fs.file()
        .set_attributes(r"C:\w\f.txt", FileAttributes::HIDDEN)
        .unwrap();
    fs.file().append_all_text(r"C:\w\f.txt", "ignored").unwrap();
    let events = drain(&watcher, &log);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].change_type, ChangeKind::Changed);
}

#[test]
fn test_name_filter() {
    let fs = new_fs();
    let (watcher, log) = watch(&fs, r"C:\w");
    watcher.set_filter("*.log").unwrap();

    fs.file().write_all_text(r"C:\w\app.log", "").unwrap();
    fs.file().write_all_text(r"C:\w\app.txt", "").unwrap();
    let events = drain(&watcher, &log);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "app.log");
}

#[test]
fn test_recursive_delete_reports_each_entry() {
    let fs = new_fs();
    let (watcher, log) = watch(&fs, r"C:\w");
    watcher.set_include_subdirectories(true);
    fs.directory().create_directory(r"C:\w\gone\inner").unwrap();
    fs.file().write_all_text(r"C:\w\gone\inner\x.txt", "").unwrap();
    drain(&watcher, &log);

    fs.directory().delete(r"C:\w\gone", true).unwrap();
    let mut names: Vec<_> = drain(&watcher, &log)
        .into_iter()
        .inspect(|e| assert_eq!(e.change_type, ChangeKind::Deleted))
        .map(|e| e.name)
        .collect();
    names.sort();
    assert_eq!(names, vec![r"gone", r"gone\inner", r"gone\inner\x.txt"]);
}

#[test]
fn test_dispose_stops_delivery() {
    let fs = new_fs();
    let (watcher, log) = watch(&fs, r"C:\w");
    watcher.dispose();
    fs.file().write_all_text(r"C:\w\after.txt", "").unwrap();
    assert!(watcher.wait_idle(IDLE));
    assert!(log.lock().unwrap().is_empty());

    drop(watcher);
    fs.file().write_all_text(r"C:\w\later.txt", "").unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_overflow_raises_one_error() {
    let config = FsConfig {
        watcher_queue_capacity: 1,
        ..FsConfig::default()
    };
    let fs = FileSystem::new(config).unwrap();
    fs.directory().create_directory(r"C:\w").unwrap();
    let watcher = fs.create_watcher(r"C:\w").unwrap();

    let gate = Arc::new(AtomicBool::new(false));
    let blocker = Arc::clone(&gate);
    watcher.on_created(move |_| {
        while !blocker.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }
    });
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    watcher.on_error(move |e: &WatcherError| sink.lock().unwrap().push(e.clone()));
    watcher.set_enabled(true);

    for i in 0..5 {
        fs.file().write_all_text(&format!(r"C:\w\f{i}.txt"), "").unwrap();
    }
    gate.store(true, Ordering::Release);
    assert!(watcher.wait_idle(IDLE));

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, r"Too many changes at once in directory:C:\w.");
}

#[test]
fn test_callbacks_run_off_the_calling_thread() {
    let fs = new_fs();
    let (watcher, _log) = watch(&fs, r"C:\w");
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    watcher.on_created(move |_| *sink.lock().unwrap() = Some(thread::current().id()));

    fs.file().write_all_text(r"C:\w\t.txt", "").unwrap();
    assert!(watcher.wait_idle(IDLE));
    let worker = seen.lock().unwrap().expect("callback ran");
    assert_ne!(worker, thread::current().id());
}
