//! Tests for schema file discovery and change flags.

use std::fs;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

struct Tree {
    dir: TempDir,
    monitor: FileMonitor,
}

impl Tree {
    fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write schema");
    }
}

#[fixture]
fn tree() -> Tree {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 root");
    let monitor = FileMonitor::new(root, "*.thrift").expect("monitor");
    Tree { dir, monitor }
}

#[rstest]
#[case("calc.thrift", "calc.thrift")]
#[case("./calc.thrift", "calc.thrift")]
#[case("a/b/../calc.thrift", "a/calc.thrift")]
#[case("/a//calc.thrift", "a/calc.thrift")]
#[case("../calc.thrift", "../calc.thrift")]
#[case("a/../../calc.thrift", "../calc.thrift")]
fn normalises_lexically(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(normalize_path(Utf8Path::new(input)), Utf8PathBuf::from(expected));
}

#[test]
fn rejects_invalid_patterns() {
    let error = FileMonitor::new(".", "[").expect_err("bad glob");
    assert!(matches!(error, CrawlerError::Pattern { .. }));
}

#[rstest]
fn scan_is_recursive_and_filters_by_name(tree: Tree) {
    tree.write("calc.thrift", "service Calc {}");
    tree.write("nested/deeper/echo.thrift", "service Echo {}");
    tree.write("notes.txt", "ignored");

    let mut found: Vec<_> = tree.monitor.scan().collect();
    found.sort();

    assert_eq!(
        found,
        vec![
            Utf8PathBuf::from("calc.thrift"),
            Utf8PathBuf::from("nested/deeper/echo.thrift"),
        ]
    );
    let again: Vec<_> = tree.monitor.scan().collect();
    assert_eq!(again.len(), 2, "scans restart from the root");
}

#[cfg(unix)]
#[rstest]
fn scan_follows_symbolic_links(tree: Tree) {
    let outside = TempDir::new().expect("outside dir");
    fs::write(outside.path().join("linked.thrift"), "service Linked {}").expect("write");
    std::os::unix::fs::symlink(outside.path(), tree.dir.path().join("shared")).expect("link");

    let found: Vec<_> = tree.monitor.scan().collect();
    assert_eq!(found, vec![Utf8PathBuf::from("shared/linked.thrift")]);
}

#[rstest]
fn contains_registers_new_files_as_changed(tree: Tree) {
    tree.write("calc.thrift", "service Calc {}");
    let path = Utf8Path::new("./calc.thrift");

    assert!(tree.monitor.contains(path));
    assert!(tree.monitor.is_changed(path).expect("tracked"));
    tree.monitor.access(path).expect("access");
    assert!(!tree.monitor.is_changed(path).expect("tracked"));
    assert!(tree.monitor.contains(path));
    assert!(!tree.monitor.is_changed(path).expect("tracked"));
}

#[rstest]
#[case("missing.thrift")]
#[case("notes.txt")]
#[case("../escape.thrift")]
fn contains_rejects_unknown_files(tree: Tree, #[case] path: &str) {
    tree.write("notes.txt", "not a schema");
    assert!(!tree.monitor.contains(Utf8Path::new(path)));
}

#[rstest]
fn flags_of_untracked_paths_fail(tree: Tree) {
    let error = tree
        .monitor
        .is_changed(Utf8Path::new("ghost.thrift"))
        .expect_err("untracked");
    assert!(matches!(error, CrawlerError::Untracked { .. }));
    assert!(tree.monitor.take_changed(Utf8Path::new("ghost.thrift")).is_err());
}

#[rstest]
fn take_changed_clears_the_flag(tree: Tree) {
    tree.write("calc.thrift", "service Calc {}");
    let path = Utf8Path::new("calc.thrift");
    assert!(tree.monitor.contains(path));

    assert!(tree.monitor.take_changed(path).expect("first"));
    assert!(!tree.monitor.take_changed(path).expect("second"));
}

#[rstest]
fn refresh_flags_new_and_modified_files_only(tree: Tree) {
    tree.write("calc.thrift", "service Calc {}");
    assert_eq!(tree.monitor.refresh(), 1);
    let path = Utf8Path::new("calc.thrift");
    tree.monitor.access(path).expect("access");

    assert_eq!(tree.monitor.refresh(), 0, "unchanged files stay current");
    assert!(!tree.monitor.is_changed(path).expect("tracked"));

    tree.write("calc.thrift", "service Calc { void ping() }");
    assert_eq!(tree.monitor.refresh(), 1);
    assert!(tree.monitor.is_changed(path).expect("tracked"));
}

#[rstest]
fn refresh_forgets_deleted_files(tree: Tree) {
    tree.write("calc.thrift", "service Calc {}");
    tree.monitor.refresh();
    fs::remove_file(tree.dir.path().join("calc.thrift")).expect("remove");

    tree.monitor.refresh();

    assert!(tree.monitor.known().is_empty());
}

#[rstest]
fn crawler_thread_discovers_files(tree: Tree) {
    let monitor = Arc::new(tree.monitor);
    let crawler =
        CrawlerHandle::spawn(Arc::clone(&monitor), Duration::from_millis(10)).expect("spawn");
    fs::write(tree.dir.path().join("late.thrift"), "service Late {}").expect("write");

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while monitor.known().is_empty() && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    crawler.join().expect("join crawler");
    assert_eq!(monitor.known(), vec![Utf8PathBuf::from("late.thrift")]);
}
