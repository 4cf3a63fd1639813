use std::fs;

use super::*;

#[test]
fn test_first_write_creates_current_file() {
    let dir = tempfile::tempdir().unwrap();
    write_and_rotate(dir.path(), "state", b"gen1").unwrap();

    let paths = StatePathManager::new(dir.path().to_path_buf());
    assert_eq!(fs::read(paths.current("state")).unwrap(), b"gen1");
    assert!(!paths.old("state").exists());
    assert!(!paths.new_file("state").exists());
}

#[test]
fn test_rotation_keeps_previous_generation_as_old() {
    let dir = tempfile::tempdir().unwrap();
    write_and_rotate(dir.path(), "state", b"gen1").unwrap();
    write_and_rotate(dir.path(), "state", b"gen2").unwrap();
    write_and_rotate(dir.path(), "state", b"gen3").unwrap();

    let paths = StatePathManager::new(dir.path().to_path_buf());
    assert_eq!(fs::read(paths.current("state")).unwrap(), b"gen3");
    assert_eq!(fs::read(paths.old("state")).unwrap(), b"gen2");
    assert!(!paths.new_file("state").exists());
}

#[test]
fn test_missing_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    write_and_rotate(&nested, "state", b"gen1").unwrap();

    let paths = StatePathManager::new(nested);
    assert_eq!(fs::read(paths.current("state")).unwrap(), b"gen1");
}
