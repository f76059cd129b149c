//! Tests for atomic file acquisition, commit and cancel.

use super::{Acquire, AtomicFileManager, CreateMode};
use crate::config::{Config, Durability};
use crate::error::AtomError;
use crate::flock::{AccessMode, LockState, Wait};
use serial_test::serial;
use std::fs;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const RWX_USER: u32 = 0o700;

/// Long enough for a thread that is not blocked to finish.
const SETTLE: Duration = Duration::from_millis(200);
const PATIENCE: Duration = Duration::from_secs(10);

fn manager() -> AtomicFileManager {
    AtomicFileManager::default()
}

fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("testFile.txt");
    (temp_dir, path)
}

fn staging_leftovers(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".bak~~"))
        .collect()
}

#[cfg(unix)]
fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).unwrap().permissions().mode() & 0o7777
}

/// Sets the process umask for the duration of a test.
#[cfg(unix)]
struct UmaskGuard {
    previous: libc::mode_t,
}

#[cfg(unix)]
impl UmaskGuard {
    fn set(mask: libc::mode_t) -> Self {
        let previous = unsafe { libc::umask(mask) };
        Self { previous }
    }
}

#[cfg(unix)]
impl Drop for UmaskGuard {
    fn drop(&mut self) {
        unsafe {
            libc::umask(self.previous);
        }
    }
}

// ============================================================================
// Open / TryOpen
// ============================================================================

#[test]
fn test_open_missing_file_is_not_found() {
    let (_temp_dir, path) = setup();

    for mode in [AccessMode::Read, AccessMode::Write] {
        assert!(matches!(manager().open(&path, mode), Err(AtomError::NotFound(_))));
        assert!(matches!(manager().try_open(&path, mode), Err(AtomError::NotFound(_))));
    }
}

#[test]
fn test_open_in_missing_directory_is_fault() {
    let (temp_dir, _) = setup();
    let path = temp_dir.path().join("no_such_dir").join("testFile.txt");

    let err = manager().open(&path, AccessMode::Read).unwrap_err();
    assert!(matches!(err, AtomError::Fault { .. }), "got {:?}", err);
}

#[test]
fn test_open_directory_is_fault() {
    let (temp_dir, _) = setup();
    let err = manager().open(temp_dir.path(), AccessMode::Read).unwrap_err();
    assert!(matches!(err, AtomError::Fault { .. }));
}

#[test]
fn test_read_open_sees_content() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager().open(&path, AccessMode::Read).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    assert_eq!(content, "Hello World");
    assert!(!file.is_created());
    file.close().unwrap();
}

#[test]
fn test_read_handle_rejects_writes() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager().open(&path, AccessMode::Read).unwrap();
    let err = file.write(b"String Foo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(file.set_len(0).is_err());
    file.close().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World");
}

#[test]
fn test_write_open_starts_from_current_content() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager().open(&path, AccessMode::Write).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    assert_eq!(content, "Hello World");

    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(b"String Foo").unwrap();
    file.close().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "String Food");
}

#[test]
fn test_write_is_invisible_until_close() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager().open(&path, AccessMode::Write).unwrap();
    file.set_len(0).unwrap();
    file.write_all(b"String Foo").unwrap();
    file.flush().unwrap();

    // A non-cooperating reader still sees the old content.
    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World");

    file.close().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "String Foo");
}

#[test]
fn test_try_open_refused_while_write_held() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let holder = manager().open(&path, AccessMode::Write).unwrap();

    for mode in [AccessMode::Read, AccessMode::Write] {
        let err = manager().try_open(&path, mode).unwrap_err();
        assert!(matches!(err, AtomError::WouldBlock(_)), "mode {:?}", mode);
    }
    // Refusal must not disturb the target.
    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World");

    holder.close().unwrap();
    manager()
        .try_open(&path, AccessMode::Write)
        .unwrap()
        .close()
        .unwrap();
}

#[test]
fn test_read_locks_are_shared() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let a = manager().try_open(&path, AccessMode::Read).unwrap();
    let b = manager().try_open(&path, AccessMode::Read).unwrap();
    assert!(matches!(
        manager().try_open(&path, AccessMode::Write),
        Err(AtomError::WouldBlock(_))
    ));

    a.close().unwrap();
    b.cancel();
    manager()
        .try_open(&path, AccessMode::Write)
        .unwrap()
        .close()
        .unwrap();
}

#[test]
fn test_try_open_returns_promptly_under_contention() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "x").unwrap();
    let holder = manager().open(&path, AccessMode::Write).unwrap();

    let start = Instant::now();
    for _ in 0..50 {
        assert!(manager().try_open(&path, AccessMode::Read).is_err());
    }
    assert!(start.elapsed() < Duration::from_secs(5));
    holder.cancel();
}

#[test]
fn test_blocking_open_waits_and_sees_commit() {
    let (_temp_dir, path) = setup();

    let mut holder = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    holder.write_all(b"String Foo").unwrap();

    let (tx, rx) = mpsc::channel();
    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        let mut file = manager().open(&waiter_path, AccessMode::Read).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        file.close().unwrap();
        tx.send(content).unwrap();
    });

    assert!(rx.recv_timeout(SETTLE).is_err(), "reader got in while write was held");
    holder.close().unwrap();

    assert_eq!(rx.recv_timeout(PATIENCE).unwrap(), "String Foo");
    waiter.join().unwrap();
}

#[test]
fn test_blocking_open_after_cancel_of_new_file_is_not_found() {
    let (_temp_dir, path) = setup();

    let holder = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        let result = manager().open(&waiter_path, AccessMode::Write);
        let not_found = matches!(result, Err(AtomError::NotFound(_)));
        if let Ok(file) = result {
            file.cancel();
        }
        tx.send(not_found).unwrap();
    });

    assert!(rx.recv_timeout(SETTLE).is_err());
    holder.cancel();

    assert!(rx.recv_timeout(PATIENCE).unwrap());
    waiter.join().unwrap();
}

#[test]
fn test_concurrent_writers_never_lose_updates() {
    let (temp_dir, path) = setup();
    fs::write(&path, "0").unwrap();

    const THREADS: usize = 4;
    const ROUNDS: usize = 25;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let mut file = manager().open(&path, AccessMode::Write).unwrap();
                    let mut content = String::new();
                    file.read_to_string(&mut content).unwrap();
                    let n: usize = content.trim().parse().unwrap();
                    file.set_len(0).unwrap();
                    file.seek(SeekFrom::Start(0)).unwrap();
                    write!(file, "{}", n + 1).unwrap();
                    file.close().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let total: usize = fs::read_to_string(&path).unwrap().parse().unwrap();
    assert_eq!(total, THREADS * ROUNDS);
    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

// ============================================================================
// Create / TryCreate
// ============================================================================

#[test]
fn test_create_fail_if_exists_then_duplicate() {
    let (_temp_dir, path) = setup();

    let file = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    assert!(file.is_created());
    file.close().unwrap();
    assert!(path.exists());

    let err = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap_err();
    assert!(matches!(err, AtomError::Duplicate(_)));

    let err = manager()
        .try_create(&path, AccessMode::Read, CreateMode::FailIfExists, RWX_USER)
        .unwrap_err();
    assert!(matches!(err, AtomError::Duplicate(_)));
}

#[test]
fn test_duplicate_releases_the_lock() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    assert!(
        manager()
            .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
            .is_err()
    );
    manager()
        .try_open(&path, AccessMode::Write)
        .unwrap()
        .close()
        .unwrap();
}

#[test]
fn test_create_in_missing_directory_is_fault() {
    let (temp_dir, _) = setup();
    let path = temp_dir.path().join("no_such_dir").join("testFile.txt");

    for create_mode in [CreateMode::FailIfExists, CreateMode::OpenIfExists] {
        let err = manager()
            .create(&path, AccessMode::Write, create_mode, RWX_USER)
            .unwrap_err();
        assert!(matches!(err, AtomError::Fault { .. }));

        let err = manager()
            .try_create(&path, AccessMode::Write, create_mode, RWX_USER)
            .unwrap_err();
        assert!(matches!(err, AtomError::Fault { .. }));
    }
}

#[test]
fn test_create_open_if_exists_keeps_content() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager()
        .create(&path, AccessMode::Write, CreateMode::OpenIfExists, RWX_USER)
        .unwrap();
    assert!(!file.is_created());
    file.seek(SeekFrom::End(0)).unwrap();
    file.write_all(b"!").unwrap();
    file.close().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World!");
}

#[test]
fn test_roundtrip_create_write_close_then_read() {
    let (_temp_dir, path) = setup();
    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

    let mut file = manager()
        .create(&path, AccessMode::Write, CreateMode::OpenIfExists, RWX_USER)
        .unwrap();
    file.write_all(&payload).unwrap();
    file.close().unwrap();

    let mut file = manager().open(&path, AccessMode::Read).unwrap();
    let mut read_back = Vec::new();
    file.read_to_end(&mut read_back).unwrap();
    file.close().unwrap();

    assert_eq!(read_back, payload);
}

#[test]
fn test_read_create_makes_empty_file() {
    let (_temp_dir, path) = setup();

    let mut file = manager()
        .create(&path, AccessMode::Read, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    assert!(content.is_empty());
    file.close().unwrap();

    assert!(path.exists());
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_try_create_fail_if_exists_while_held_would_block() {
    let (_temp_dir, path) = setup();

    let holder = manager()
        .try_create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();

    let err = manager()
        .try_create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap_err();
    assert!(matches!(err, AtomError::WouldBlock(_)));

    holder.close().unwrap();
}

#[test]
fn test_blocking_create_fail_if_exists_after_commit_is_duplicate() {
    let (_temp_dir, path) = setup();

    let holder = manager()
        .create(&path, AccessMode::Read, CreateMode::FailIfExists, RWX_USER)
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        let result =
            manager().create(&waiter_path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER);
        let duplicate = matches!(result, Err(AtomError::Duplicate(_)));
        if let Ok(file) = result {
            file.cancel();
        }
        tx.send(duplicate).unwrap();
    });

    assert!(rx.recv_timeout(SETTLE).is_err());
    holder.close().unwrap();

    assert!(rx.recv_timeout(PATIENCE).unwrap());
    waiter.join().unwrap();
}

#[test]
fn test_blocking_create_fail_if_exists_after_cancel_succeeds() {
    let (_temp_dir, path) = setup();

    let holder = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        let mut file = manager()
            .create(&waiter_path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
            .unwrap();
        let created = file.is_created();
        file.write_all(b"second").unwrap();
        file.close().unwrap();
        tx.send(created).unwrap();
    });

    assert!(rx.recv_timeout(SETTLE).is_err());
    holder.cancel();

    assert!(rx.recv_timeout(PATIENCE).unwrap());
    waiter.join().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "second");
}

#[test]
fn test_acquire_dispatch_matches_named_operations() {
    let (_temp_dir, path) = setup();
    let how = Acquire::Create {
        create_mode: CreateMode::FailIfExists,
        permissions: RWX_USER,
    };

    let file = manager()
        .acquire(&path, AccessMode::Write, how, Wait::Try)
        .unwrap();
    assert!(file.is_created());
    file.close().unwrap();

    let err = manager()
        .acquire(&path, AccessMode::Write, how, Wait::Block)
        .unwrap_err();
    assert!(matches!(err, AtomError::Duplicate(_)));

    manager()
        .acquire(&path, AccessMode::Read, Acquire::Open, Wait::Block)
        .unwrap()
        .close()
        .unwrap();
}

#[test]
fn test_try_create_is_never_seen_unlocked() {
    let (temp_dir, path) = setup();
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let path = path.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match manager().try_open(&path, AccessMode::Read) {
                    Ok(file) => file.cancel(),
                    Err(AtomError::NotFound(_) | AtomError::WouldBlock(_)) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        })
    };

    for _ in 0..500 {
        match manager().try_create(&path, AccessMode::Write, CreateMode::FailIfExists, 0o644) {
            Ok(file) => file.cancel(),
            Err(AtomError::WouldBlock(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
        assert!(!path.exists(), "canceled create left the file behind");
    }

    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, 0o644)
        .unwrap()
        .cancel();
    assert!(!path.exists());
    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

// ============================================================================
// Permissions
// ============================================================================

#[cfg(unix)]
#[test]
#[serial]
fn test_create_applies_permissions_verbatim_without_umask() {
    let _umask = UmaskGuard::set(0);
    let (_temp_dir, path) = setup();

    for perms in [0o600, 0o400, 0o200, 0o100, 0o640, 0o755, 0o777, 0o604] {
        let file = manager()
            .create(&path, AccessMode::Write, CreateMode::OpenIfExists, perms)
            .unwrap();
        file.close().unwrap();

        assert_eq!(mode_of(&path), perms, "requested {:o}", perms);
        fs::remove_file(&path).unwrap();
    }
}

#[cfg(unix)]
#[test]
#[serial]
fn test_create_keeps_setuid_and_sticky_bits() {
    let _umask = UmaskGuard::set(0);
    let (_temp_dir, path) = setup();

    let mut requested = vec![0o4755];
    if cfg!(target_os = "linux") {
        requested.push(0o1777);
    }
    for perms in requested {
        let mut file = manager()
            .create(&path, AccessMode::Write, CreateMode::FailIfExists, perms)
            .unwrap();
        file.write_all(b"String Foo").unwrap();
        file.close().unwrap();

        assert_eq!(mode_of(&path), perms, "requested {:o}", perms);
        fs::remove_file(&path).unwrap();
    }
}

#[cfg(unix)]
#[test]
#[serial]
fn test_create_keeps_setgid_for_group_members() {
    use std::os::unix::fs::MetadataExt;

    let _umask = UmaskGuard::set(0);
    let (_temp_dir, path) = setup();

    let file = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, 0o2755)
        .unwrap();
    file.close().unwrap();

    // The kernel drops setgid on files whose group the caller is not in.
    let in_group = fs::metadata(&path).unwrap().gid() == unsafe { libc::getegid() };
    if in_group {
        assert_eq!(mode_of(&path), 0o2755);
    } else {
        assert_eq!(mode_of(&path) & 0o777, 0o755);
    }
}

#[cfg(unix)]
#[test]
#[serial]
fn test_create_respects_process_umask() {
    let _umask = UmaskGuard::set(0o022);
    let (_temp_dir, path) = setup();

    let file = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, 0o666)
        .unwrap();
    file.close().unwrap();

    assert_eq!(mode_of(&path), 0o644);
}

#[cfg(unix)]
#[test]
#[serial]
fn test_open_if_exists_keeps_first_permissions() {
    let _umask = UmaskGuard::set(0);
    let (_temp_dir, path) = setup();

    let file = manager()
        .create(&path, AccessMode::Write, CreateMode::OpenIfExists, 0o600)
        .unwrap();
    file.close().unwrap();

    let mut file = manager()
        .create(&path, AccessMode::Write, CreateMode::OpenIfExists, 0o777)
        .unwrap();
    file.write_all(b"String Foo").unwrap();
    file.close().unwrap();

    assert_eq!(mode_of(&path), 0o600);
    assert_eq!(fs::read_to_string(&path).unwrap(), "String Foo");
}

// ============================================================================
// Cancel / Close
// ============================================================================

#[test]
fn test_cancel_restores_existing_file() {
    let (temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager().open(&path, AccessMode::Write).unwrap();
    file.set_len(0).unwrap();
    file.write_all(b"String Foo").unwrap();
    file.cancel();

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World");
    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

#[test]
fn test_cancel_of_open_if_exists_create_keeps_file() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager()
        .try_create(&path, AccessMode::Write, CreateMode::OpenIfExists, RWX_USER)
        .unwrap();
    file.write_all(b"String Foo").unwrap();
    file.cancel();

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World");
}

#[test]
fn test_cancel_of_new_file_removes_it() {
    let (temp_dir, path) = setup();

    let mut file = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    file.write_all(b"String Foo").unwrap();
    file.cancel();

    assert!(!path.exists());
    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

#[test]
fn test_cancel_of_new_read_file_removes_it() {
    let (_temp_dir, path) = setup();

    let file = manager()
        .try_create(&path, AccessMode::Read, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    file.cancel();

    assert!(!path.exists());
}

#[test]
fn test_cancel_of_read_handle_keeps_content() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut file = manager().open(&path, AccessMode::Read).unwrap();
    let mut buf = [0u8; 5];
    file.read_exact(&mut buf).unwrap();
    file.cancel();

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World");
}

#[test]
fn test_close_leaves_no_staging_files() {
    let (temp_dir, path) = setup();

    for round in 0..3 {
        let mut file = manager()
            .create(&path, AccessMode::Write, CreateMode::OpenIfExists, RWX_USER)
            .unwrap();
        write!(file, "round {}", round).unwrap();
        file.close().unwrap();
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "round 2");
    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

#[test]
fn test_write_acquisition_sweeps_stale_staging() {
    let (temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();
    let stale = temp_dir.path().join(".testFile.txt.bak~~99999-0");
    fs::write(&stale, "left by a crashed writer").unwrap();

    let file = manager().open(&path, AccessMode::Write).unwrap();
    assert!(!stale.exists());
    file.cancel();

    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

#[test]
fn test_lock_released_after_close_and_cancel() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    manager().open(&path, AccessMode::Write).unwrap().close().unwrap();
    manager().try_open(&path, AccessMode::Write).unwrap().cancel();
    manager()
        .try_open(&path, AccessMode::Write)
        .unwrap()
        .close()
        .unwrap();
}

#[test]
fn test_commit_with_custom_config() {
    let (temp_dir, path) = setup();
    let config = Config {
        durability: Durability::None,
        sync_parent_dir: false,
        staging_marker: ".stage-".to_string(),
        ..Config::default()
    };
    let manager = AtomicFileManager::new(config);

    let mut file = manager
        .create(&path, AccessMode::Write, CreateMode::OpenIfExists, RWX_USER)
        .unwrap();
    file.write_all(b"fast").unwrap();
    file.close().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "fast");
    let leftovers = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .contains(".stage-")
        })
        .count();
    assert_eq!(leftovers, 0);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "dropped without close() or cancel()")]
fn test_dropping_unfinalized_handle_panics_in_debug() {
    let (_temp_dir, path) = setup();
    let file = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    drop(file);
}

// ============================================================================
// Streams
// ============================================================================

#[test]
fn test_stream_close_commits_buffered_data() {
    let (_temp_dir, path) = setup();

    let mut stream = manager()
        .create_stream(&path, AccessMode::Write, CreateMode::OpenIfExists, RWX_USER)
        .unwrap();
    write!(stream, "String Foo").unwrap();
    stream.close().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "String Foo");
}

#[test]
fn test_stream_cancel_drops_buffered_data() {
    let (temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let mut stream = manager().open_stream(&path, AccessMode::Write).unwrap();
    stream.seek(SeekFrom::Start(0)).unwrap();
    write!(stream, "String Foo").unwrap();
    stream.cancel();

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World");
    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

#[test]
fn test_stream_cancel_of_new_file_removes_it() {
    let (_temp_dir, path) = setup();

    let mut stream = manager()
        .try_create_stream(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    assert!(stream.is_created());
    write!(stream, "String Foo").unwrap();
    stream.flush().unwrap();
    stream.cancel();

    assert!(!path.exists());
}

#[test]
fn test_stream_read() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "line one\nline two\n").unwrap();

    let mut stream = manager().try_open_stream(&path, AccessMode::Read).unwrap();
    assert_eq!(stream.mode(), AccessMode::Read);
    assert_eq!(stream.path(), path.as_path());
    let mut content = String::new();
    stream.read_to_string(&mut content).unwrap();
    assert_eq!(content, "line one\nline two\n");
    assert!(stream.write(b"x").is_err());
    stream.close().unwrap();
}

#[test]
fn test_stream_write_handle_reads_back_pending_data() {
    let (_temp_dir, path) = setup();

    let mut stream = manager()
        .create_stream(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    write!(stream, "String Foo").unwrap();
    stream.seek(SeekFrom::Start(0)).unwrap();
    let mut content = String::new();
    stream.read_to_string(&mut content).unwrap();
    assert_eq!(content, "String Foo");
    stream.close().unwrap();
}

#[test]
fn test_stream_errors_match_descriptor_form() {
    let (_temp_dir, path) = setup();

    assert!(matches!(
        manager().open_stream(&path, AccessMode::Read),
        Err(AtomError::NotFound(_))
    ));

    let holder = manager()
        .create_stream(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    assert!(matches!(
        manager().try_open_stream(&path, AccessMode::Read),
        Err(AtomError::WouldBlock(_))
    ));
    assert!(matches!(
        manager().try_create_stream(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER),
        Err(AtomError::WouldBlock(_))
    ));
    holder.close().unwrap();

    assert!(matches!(
        manager().create_stream(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER),
        Err(AtomError::Duplicate(_))
    ));
}

// ============================================================================
// Delete / TryDelete
// ============================================================================

#[test]
fn test_delete_outcomes() {
    let (temp_dir, path) = setup();

    assert!(matches!(manager().delete(&path), Err(AtomError::NotFound(_))));
    assert!(matches!(manager().try_delete(&path), Err(AtomError::NotFound(_))));

    let missing_dir = temp_dir.path().join("no_such_dir").join("testFile.txt");
    assert!(matches!(
        manager().delete(&missing_dir),
        Err(AtomError::Fault { .. })
    ));

    fs::write(&path, "Hello World").unwrap();
    manager().delete(&path).unwrap();
    assert!(!path.exists());

    fs::write(&path, "Hello World").unwrap();
    manager().try_delete(&path).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_try_delete_refused_while_locked() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let reader = manager().open(&path, AccessMode::Read).unwrap();
    assert!(matches!(manager().try_delete(&path), Err(AtomError::WouldBlock(_))));
    assert!(path.exists());
    reader.close().unwrap();

    manager().try_delete(&path).unwrap();
}

#[test]
fn test_delete_waits_for_write_lock() {
    let (_temp_dir, path) = setup();

    let mut holder = manager()
        .create(&path, AccessMode::Write, CreateMode::FailIfExists, RWX_USER)
        .unwrap();
    holder.write_all(b"String Foo").unwrap();

    assert!(matches!(manager().try_delete(&path), Err(AtomError::WouldBlock(_))));

    let (tx, rx) = mpsc::channel();
    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        tx.send(manager().delete(&waiter_path).is_ok()).unwrap();
    });

    assert!(rx.recv_timeout(SETTLE).is_err(), "delete did not wait for the lock");
    holder.close().unwrap();

    assert!(rx.recv_timeout(PATIENCE).unwrap());
    waiter.join().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_delete_never_removes_live_staging() {
    let (temp_dir, path) = setup();
    let stop = Arc::new(AtomicBool::new(false));

    let deleter = {
        let path = path.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match manager().delete(&path) {
                    Ok(()) | Err(AtomError::NotFound(_)) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        })
    };

    for _ in 0..1000 {
        let mut file = manager()
            .create(&path, AccessMode::Write, CreateMode::OpenIfExists, 0o644)
            .unwrap();
        file.write_all(b"payload").unwrap();
        file.close().unwrap();
    }

    stop.store(true, Ordering::Relaxed);
    deleter.join().unwrap();

    assert!(staging_leftovers(temp_dir.path()).is_empty());
}

// ============================================================================
// Inspection
// ============================================================================

#[test]
fn test_lock_state_reports_holders() {
    let (_temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    assert_eq!(manager().lock_state(&path).unwrap(), LockState::Unlocked);

    let reader = manager().open(&path, AccessMode::Read).unwrap();
    assert_eq!(manager().lock_state(&path).unwrap(), LockState::Shared);
    reader.close().unwrap();

    let writer = manager().open(&path, AccessMode::Write).unwrap();
    assert_eq!(manager().lock_state(&path).unwrap(), LockState::Exclusive);
    writer.cancel();

    assert_eq!(manager().lock_state(&path).unwrap(), LockState::Unlocked);
}

#[test]
fn test_status_snapshot() {
    let (temp_dir, path) = setup();
    fs::write(&path, "Hello World").unwrap();

    let status = manager().status(&path).unwrap();
    assert_eq!(status.size, 11);
    assert_eq!(status.lock, LockState::Unlocked);
    assert_eq!(status.permissions.len(), 4);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["lock"], "unlocked");
    assert_eq!(json["size"], 11);

    let missing = temp_dir.path().join("missing");
    assert!(matches!(manager().status(&missing), Err(AtomError::NotFound(_))));
}
