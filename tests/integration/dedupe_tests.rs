use linkvault::dedupe::{DedupEngine, EngineConfig};
use linkvault::scanner::{Hasher, StorageId};
#[cfg(unix)]
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn folder_for(library: &Path, content: &[u8]) -> PathBuf {
    let digest = Hasher::hash_bytes(content);
    library.join(digest.prefix()).join(digest.as_str())
}

fn jpg() -> Vec<String> {
    vec!["*.jpg".to_string()]
}

/// Every file under `root` with its bytes and storage object.
#[cfg(unix)]
fn snapshot(root: &Path) -> BTreeMap<PathBuf, (Vec<u8>, Option<StorageId>)> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let path = entry.into_path();
            let state = (fs::read(&path).unwrap(), StorageId::of(&path));
            (path, state)
        })
        .collect()
}

#[test]
fn test_duplicates_become_links_to_library_master() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"same photo");
    write(&src.join("b.jpg"), b"same photo");
    write(&src.join("c.jpg"), b"other photo");

    let mut engine = DedupEngine::new(EngineConfig::new(lib.clone()));
    let summary = engine.run(&[src.clone()], &jpg()).unwrap();

    assert_eq!(summary.files_found, 3);
    assert_eq!(summary.files_hashed, 3);
    assert_eq!(summary.unique_masters, 2);
    assert_eq!(summary.deduped_count, 1);
    assert_eq!(summary.space_saved, 10);
    assert!(summary.failures.is_empty());
    assert!(!summary.dry_run);

    let folder = folder_for(&lib, b"same photo");
    let master = folder.join("a.jpg");
    assert!(master.is_file());
    assert!(folder.join("b.jpg").is_file(), "alias for the duplicate's name");

    // Every original path still reads the same bytes
    assert_eq!(fs::read(src.join("a.jpg")).unwrap(), b"same photo");
    assert_eq!(fs::read(src.join("b.jpg")).unwrap(), b"same photo");
    assert_eq!(fs::read(src.join("c.jpg")).unwrap(), b"other photo");

    assert!(folder_for(&lib, b"other photo").join("c.jpg").is_file());

    #[cfg(unix)]
    {
        assert!(StorageId::same_object(&src.join("a.jpg"), &master));
        assert!(StorageId::same_object(&src.join("b.jpg"), &master));
        assert!(StorageId::same_object(&folder.join("b.jpg"), &master));
    }
}

#[test]
fn test_extension_filter_leaves_other_files_alone() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"payload");
    write(&src.join("notes.txt"), b"payload");

    let mut engine = DedupEngine::new(EngineConfig::new(lib.clone()));
    let summary = engine.run(&[src.clone()], &jpg()).unwrap();

    assert_eq!(summary.files_found, 1);
    assert_eq!(summary.deduped_count, 0);
    assert!(!folder_for(&lib, b"payload").join("notes.txt").exists());
}

#[test]
fn test_duplicates_across_roots() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    let lib = dir.path().join("lib");
    write(&first.join("x.jpg"), b"shared");
    write(&second.join("nested").join("y.jpg"), b"shared");

    let mut engine = DedupEngine::new(EngineConfig::new(lib.clone()));
    let summary = engine.run(&[first.clone(), second.clone()], &jpg()).unwrap();

    assert_eq!(summary.unique_masters, 1);
    assert_eq!(summary.deduped_count, 1);
    assert!(folder_for(&lib, b"shared").join("x.jpg").is_file());
    assert_eq!(fs::read(second.join("nested").join("y.jpg")).unwrap(), b"shared");
}

#[test]
fn test_library_inside_source_root_is_not_rescanned() {
    let dir = tempdir().unwrap();
    let src = dir.path().to_path_buf();
    let lib = dir.path().join("library");
    write(&src.join("a.jpg"), b"content");
    write(&src.join("b.jpg"), b"content");

    let mut engine = DedupEngine::new(EngineConfig::new(lib.clone()));
    let first = engine.run(&[src.clone()], &jpg()).unwrap();
    assert_eq!(first.files_found, 2);

    let mut engine = DedupEngine::new(EngineConfig::new(lib));
    let second = engine.run(&[src], &jpg()).unwrap();
    assert_eq!(second.files_found, 2, "library files must not be candidates");
}

#[test]
fn test_link_only_keeps_first_copy_in_place() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"same photo");
    write(&src.join("b.jpg"), b"same photo");
    let original_a = StorageId::of(&src.join("a.jpg"));

    let mut engine = DedupEngine::new(EngineConfig::new(lib.clone()).with_link_only(true));
    let summary = engine.run(&[src.clone()], &jpg()).unwrap();

    assert_eq!(summary.unique_masters, 1);
    assert_eq!(summary.deduped_count, 1);
    assert!(summary.failures.is_empty());

    let alias = folder_for(&lib, b"same photo").join("a.jpg");
    assert!(alias.is_file());
    assert_eq!(fs::read(src.join("b.jpg")).unwrap(), b"same photo");

    #[cfg(unix)]
    {
        // a.jpg was never moved: same storage object as before the run
        assert_eq!(StorageId::of(&src.join("a.jpg")), original_a);
        assert!(StorageId::same_object(&alias, &src.join("a.jpg")));
        assert!(StorageId::same_object(&src.join("b.jpg"), &src.join("a.jpg")));
    }
    #[cfg(not(unix))]
    let _ = original_a;
}

#[test]
fn test_dry_run_changes_nothing() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"same photo");
    write(&src.join("b.jpg"), b"same photo");

    let mut engine = DedupEngine::new(EngineConfig::new(lib.clone()).with_dry_run(true));
    let summary = engine.run(&[src.clone()], &jpg()).unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.unique_masters, 1);
    assert_eq!(summary.deduped_count, 1);
    assert_eq!(summary.space_saved, 10);

    assert!(!lib.exists());
    assert_eq!(fs::read(src.join("a.jpg")).unwrap(), b"same photo");
    assert_eq!(fs::read(src.join("b.jpg")).unwrap(), b"same photo");
    #[cfg(unix)]
    assert!(!StorageId::same_object(&src.join("a.jpg"), &src.join("b.jpg")));
}

#[cfg(unix)]
#[test]
fn test_second_run_is_a_no_op() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"same photo");
    write(&src.join("b.jpg"), b"same photo");
    write(&src.join("c.jpg"), b"unique");

    DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[src.clone()], &jpg())
        .unwrap();
    let after_first = snapshot(dir.path());
    assert_eq!(after_first.len(), 6, "three sources, two masters, one alias");

    let summary = DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[src.clone()], &jpg())
        .unwrap();

    assert_eq!(snapshot(dir.path()), after_first);
    assert_eq!(summary.files_found, 3);
    assert_eq!(summary.unique_masters, 0);
    assert_eq!(summary.deduped_count, 0);
    assert_eq!(summary.already_linked, 3);
    assert_eq!(summary.space_saved, 0);
    assert!(summary.failures.is_empty());
}

#[test]
fn test_later_run_reuses_library_master() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib");
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    write(&old.join("holiday.jpg"), b"beach");
    write(&new.join("IMG_0001.jpg"), b"beach");

    DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[old.clone()], &jpg())
        .unwrap();

    let summary = DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[new.clone()], &jpg())
        .unwrap();

    assert_eq!(summary.unique_masters, 0);
    assert_eq!(summary.deduped_count, 1);
    assert_eq!(summary.space_saved, 5);

    let folder = folder_for(&lib, b"beach");
    assert!(folder.join("holiday.jpg").is_file());
    assert!(folder.join("IMG_0001.jpg").is_file());
    #[cfg(unix)]
    assert!(StorageId::same_object(
        &new.join("IMG_0001.jpg"),
        &folder.join("holiday.jpg")
    ));
}

#[test]
fn test_empty_source_creates_no_library() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    fs::create_dir_all(&src).unwrap();

    let summary = DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[src], &jpg())
        .unwrap();

    assert!(summary.is_empty());
    assert!(!lib.exists());
}

#[test]
fn test_missing_root_is_reported_not_fatal() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"data");

    let summary = DedupEngine::new(EngineConfig::new(lib))
        .run(&[dir.path().join("missing"), src], &jpg())
        .unwrap();

    assert_eq!(summary.scan_errors.len(), 1);
    assert_eq!(summary.unique_masters, 1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_root_on_another_volume_aborts_before_any_mutation() {
    use linkvault::dedupe::EngineError;
    use linkvault::scanner::VolumeId;

    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"same photo");
    write(&src.join("b.jpg"), b"same photo");

    // procfs is always its own filesystem
    let foreign = PathBuf::from("/proc");
    if VolumeId::of(&foreign).unwrap() == VolumeId::of(dir.path()).unwrap() {
        eprintln!("Skipping volume guard test: /proc shares the temp volume");
        return;
    }

    let result = DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[src.clone(), foreign], &jpg());

    assert!(matches!(result, Err(EngineError::VolumeMismatch { .. })));
    assert!(!lib.exists());
    #[cfg(unix)]
    assert!(!StorageId::same_object(&src.join("a.jpg"), &src.join("b.jpg")));
}
