use linkvault::actions::{CleanupAuditor, CleanupConfig, CleanupDecision, CleanupError};
use linkvault::dedupe::{DedupEngine, EngineConfig};
use linkvault::prompt::{AutoConfirm, TerminalPrompt};
use linkvault::scanner::Hasher;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[cfg(unix)]
#[test]
fn test_cleanup_removes_master_whose_sources_are_gone() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    let content = vec![7u8; 1000];
    write(&src.join("a.bin"), &content);
    write(&src.join("keep.bin"), b"still referenced");

    DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[src.clone()], &["*.*".to_string()])
        .unwrap();
    fs::remove_file(src.join("a.bin")).unwrap();

    let auditor = CleanupAuditor::new(CleanupConfig::new(lib.clone()));
    let report = auditor.run(&mut AutoConfirm).unwrap();

    assert_eq!(report.decision, CleanupDecision::Deleted);
    assert_eq!(report.audit.candidates.len(), 1);
    assert_eq!(report.deleted.success_count(), 1);
    assert_eq!(report.deleted.bytes_freed, 1000);

    let digest = Hasher::hash_bytes(&content);
    assert!(!lib.join(digest.prefix()).join(digest.as_str()).exists());

    let kept = Hasher::hash_bytes(b"still referenced");
    assert!(lib.join(kept.prefix()).join(kept.as_str()).join("keep.bin").is_file());
    assert!(lib.exists(), "library root is never pruned");
}

#[cfg(unix)]
#[test]
fn test_cleanup_dry_run_only_projects() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.bin"), b"orphan soon");

    DedupEngine::new(EngineConfig::new(lib.clone()))
        .run(&[src.clone()], &["*.*".to_string()])
        .unwrap();
    fs::remove_file(src.join("a.bin")).unwrap();

    let auditor = CleanupAuditor::new(CleanupConfig::new(lib.clone()).with_dry_run(true));
    let report = auditor.run(&mut AutoConfirm).unwrap();

    assert!(report.dry_run);
    assert_eq!(report.deleted.success_count(), 1);
    assert_eq!(report.pruned_folders, 0);

    let digest = Hasher::hash_bytes(b"orphan soon");
    assert!(lib.join(digest.prefix()).join(digest.as_str()).join("a.bin").is_file());
}

#[cfg(unix)]
#[test]
fn test_cleanup_cancel_keeps_everything() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib");
    let digest = Hasher::hash_bytes(b"lonely");
    let master = lib.join(digest.prefix()).join(digest.as_str()).join("x.bin");
    write(&master, b"lonely");

    let auditor = CleanupAuditor::new(CleanupConfig::new(lib.clone()));
    let mut prompt = TerminalPrompt::new(Cursor::new(b"l\nc\n".to_vec()), Vec::new());
    let report = auditor.run(&mut prompt).unwrap();

    assert_eq!(report.decision, CleanupDecision::Cancelled);
    assert!(master.is_file());

    let output = String::from_utf8(prompt.into_output()).unwrap();
    assert!(output.contains("x.bin"));
}

#[test]
fn test_files_near_the_root_are_never_candidates() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib");
    write(&lib.join("stray.bin"), b"top level");
    write(&lib.join("ab").join("prefix-level.bin"), b"prefix level");

    let auditor = CleanupAuditor::new(CleanupConfig::new(lib.clone()));
    let audit = auditor.find_candidates().unwrap();

    assert!(audit.candidates.is_empty());
    assert!(lib.join("stray.bin").is_file());
}

#[test]
fn test_empty_library_has_nothing_to_do() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib");
    fs::create_dir_all(&lib).unwrap();

    let report = CleanupAuditor::new(CleanupConfig::new(lib))
        .run(&mut AutoConfirm)
        .unwrap();
    assert_eq!(report.decision, CleanupDecision::NothingToDo);
}

#[test]
fn test_missing_library_is_an_error() {
    let dir = tempdir().unwrap();
    let result = CleanupAuditor::new(CleanupConfig::new(dir.path().join("absent")))
        .run(&mut AutoConfirm);
    assert!(matches!(result, Err(CleanupError::LibraryNotFound(_))));
}
