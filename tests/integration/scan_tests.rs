use linkvault::scanner::{ScanConfig, Walker};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_scan_is_sorted_and_filtered() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("b.JPG"), b"1");
    write(&dir.path().join("a.jpg"), b"2");
    write(&dir.path().join("sub").join("c.jpg"), b"3");
    write(&dir.path().join("d.png"), b"4");

    let config = ScanConfig::from_patterns(&["*.jpg".to_string()]);
    let scan = Walker::new(vec![dir.path().to_path_buf()], config).scan();

    let names: Vec<_> = scan
        .files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.jpg", "b.JPG", "c.jpg"]);
    assert!(scan.errors.is_empty());
    assert_eq!(scan.total_size(), 3);
}

#[test]
fn test_wildcard_accepts_everything_but_empty_files() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), b"text");
    write(&dir.path().join("noext"), b"data");
    write(&dir.path().join("empty.txt"), b"");

    let config = ScanConfig::from_patterns(&["*.*".to_string()]);
    let scan = Walker::new(vec![dir.path().to_path_buf()], config).scan();

    assert_eq!(scan.files.len(), 2);
}

#[test]
fn test_library_root_is_excluded() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("photo.jpg"), b"source");
    write(&dir.path().join("library").join("ab").join("abcd").join("photo.jpg"), b"master");

    let config = ScanConfig::from_patterns(&["*.jpg".to_string()])
        .with_library_root(dir.path().join("library"));
    let scan = Walker::new(vec![dir.path().to_path_buf()], config).scan();

    assert_eq!(scan.files.len(), 1);
    assert!(scan.files[0].path.ends_with("photo.jpg"));
    assert!(!scan.files[0].path.to_string_lossy().contains("library"));
}

#[test]
fn test_overlapping_roots_report_each_file_once() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("sub").join("x.jpg"), b"x");

    let config = ScanConfig::from_patterns(&["*.jpg".to_string()]);
    let scan = Walker::new(
        vec![dir.path().to_path_buf(), dir.path().join("sub")],
        config,
    )
    .scan();

    assert_eq!(scan.files.len(), 1);
}

#[test]
fn test_root_that_is_a_file_is_an_error() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("file.jpg");
    write(&file, b"x");

    let scan = Walker::new(vec![file], ScanConfig::from_patterns(&[])).scan();
    assert!(scan.files.is_empty());
    assert_eq!(scan.errors.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("real.jpg");
    write(&target, b"real");
    std::os::unix::fs::symlink(&target, dir.path().join("link.jpg")).unwrap();

    let scan = Walker::new(
        vec![dir.path().to_path_buf()],
        ScanConfig::from_patterns(&["*.jpg".to_string()]),
    )
    .scan();

    assert_eq!(scan.files.len(), 1);
    assert!(scan.files[0].path.ends_with("real.jpg"));
}
