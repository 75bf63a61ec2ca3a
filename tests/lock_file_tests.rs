//! Lock file and control file handling, exercised in a private runtime directory.

use fs2::FileExt;
use serial_test::serial;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

use lightcycle::signals::{ControlCommand, control_file_path, take_control_command, write_control_command};
use lightcycle::utils::{get_running_instance_pid, lock_path};

/// Run `test` with `XDG_RUNTIME_DIR` pointing at a fresh directory.
fn with_runtime_dir(test: impl FnOnce(&Path)) {
    let temp_dir = tempdir().unwrap();
    let original = std::env::var("XDG_RUNTIME_DIR").ok();
    unsafe {
        std::env::set_var("XDG_RUNTIME_DIR", temp_dir.path());
    }

    test(temp_dir.path());

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
            None => std::env::remove_var("XDG_RUNTIME_DIR"),
        }
    }
}

#[test]
#[serial]
fn test_running_instance_found_through_lock_file() {
    with_runtime_dir(|dir| {
        assert_eq!(lock_path(), dir.join("lightcycle.lock"));
        assert!(get_running_instance_pid().is_err());

        fs::write(lock_path(), format!("{}\n", std::process::id())).unwrap();
        assert_eq!(get_running_instance_pid().unwrap(), std::process::id());
    });
}

#[test]
#[serial]
fn test_stale_or_garbled_lock_file() {
    with_runtime_dir(|_| {
        // PIDs are capped well below this on Linux
        fs::write(lock_path(), "4294967295\n").unwrap();
        let err = get_running_instance_pid().unwrap_err();
        assert!(err.to_string().contains("stale"));

        fs::write(lock_path(), "not-a-pid\n").unwrap();
        assert!(get_running_instance_pid().is_err());
    });
}

#[test]
#[serial]
fn test_second_locker_keeps_pid_intact() {
    with_runtime_dir(|_| {
        let mut first = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path())
            .unwrap();
        first.try_lock_exclusive().unwrap();
        first.set_len(0).unwrap();
        writeln!(first, "12345").unwrap();
        first.flush().unwrap();

        let second = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path())
            .unwrap();
        assert!(second.try_lock_exclusive().is_err());
        drop(second);

        assert_eq!(fs::read_to_string(lock_path()).unwrap().trim(), "12345");
    });
}

#[test]
#[serial]
fn test_control_file_is_consumed() {
    with_runtime_dir(|dir| {
        let pid = 4242;
        let command = ControlCommand::DisableFor(Duration::from_secs(1800));

        write_control_command(pid, command).unwrap();
        assert_eq!(control_file_path(pid), dir.join("lightcycle-4242.cmd"));
        assert_eq!(
            fs::read_to_string(control_file_path(pid)).unwrap(),
            "disable-for 1800000"
        );

        assert_eq!(take_control_command(pid).unwrap(), command);
        assert!(!control_file_path(pid).exists());
        assert!(take_control_command(pid).is_err());
    });
}
