use linkvault::dedupe::{DedupEngine, EngineConfig, FailureKind};
use linkvault::library::{FsOps, RealFs};
use linkvault::scanner::Hasher;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use walkdir::WalkDir;

/// Real filesystem on which every hard-link call fails.
struct NoLinks;

impl FsOps for NoLinks {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        RealFs.rename(from, to)
    }

    fn hard_link(&self, _target: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "links disabled"))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        RealFs.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        RealFs.create_dir_all(path)
    }
}

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn backups_under(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "lvbak"))
        .count()
}

#[test]
fn test_failed_link_back_restores_new_master() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"payload");

    let config = EngineConfig::new(lib.clone()).with_fs_ops(Arc::new(NoLinks));
    let summary = DedupEngine::new(config)
        .run(&[src.clone()], &["*.jpg".to_string()])
        .unwrap();

    assert_eq!(summary.unique_masters, 0);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].kind, FailureKind::Link);
    assert!(summary.inconsistencies.is_empty());

    assert_eq!(fs::read(src.join("a.jpg")).unwrap(), b"payload");
    let digest = Hasher::hash_bytes(b"payload");
    assert!(!lib.join(digest.prefix()).join(digest.as_str()).join("a.jpg").exists());
}

#[test]
fn test_failed_duplicate_swap_leaves_original_intact() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib");
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    write(&old.join("a.jpg"), b"payload");
    write(&new.join("b.jpg"), b"payload");

    DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[old], &["*.jpg".to_string()])
        .unwrap();

    let config = EngineConfig::new(lib.clone()).with_fs_ops(Arc::new(NoLinks));
    let summary = DedupEngine::new(config)
        .run(&[new.clone()], &["*.jpg".to_string()])
        .unwrap();

    assert_eq!(summary.deduped_count, 0);
    assert_eq!(summary.space_saved, 0);
    assert_eq!(summary.alias_warnings, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].kind, FailureKind::Link);

    assert_eq!(fs::read(new.join("b.jpg")).unwrap(), b"payload");
    assert_eq!(backups_under(dir.path()), 0);
}

#[test]
fn test_unreadable_file_does_not_stop_the_run() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"one");
    write(&src.join("b.jpg"), b"one");

    let mut engine = DedupEngine::new(EngineConfig::new(lib));
    let entries = vec![
        linkvault::scanner::FileEntry::new(src.join("gone.jpg"), 3),
        linkvault::scanner::FileEntry::new(src.join("a.jpg"), 3),
        linkvault::scanner::FileEntry::new(src.join("b.jpg"), 3),
    ];
    engine.store().ensure_root().unwrap();
    for entry in &entries {
        engine.process_file(entry);
    }

    assert_eq!(engine.index().len(), 1);
    assert_eq!(fs::read(src.join("b.jpg")).unwrap(), b"one");
}
