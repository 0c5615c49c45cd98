use std::collections::BTreeSet;
use std::fs;

use crate::orphans::*;
use crate::testing;

fn keys(xs: &[&str]) -> BTreeSet<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_reconcile() {
    let expected = keys(&["2024/03 March.m3u", "2024/04 April.m3u"]);
    let discovered = keys(&["2024/03 March.m3u", "2023/12 December.m3u"]);

    let report = reconcile(&expected, &discovered);
    assert_eq!(report.discovered, 2);
    assert_eq!(report.orphans, keys(&["2023/12 December.m3u", "2024/04 April.m3u"]));
    assert_eq!(report.stale, keys(&["2023/12 December.m3u"]));
    assert_eq!(report.missing, keys(&["2024/04 April.m3u"]));
    assert!(!report.is_clean());
}

#[test]
fn test_reconcile_clean() {
    let expected = keys(&["2024/03 March.m3u"]);
    let report = reconcile(&expected, &expected.clone());
    assert!(report.is_clean());
    assert!(report.stale.is_empty());
    assert!(report.missing.is_empty());
}

#[test]
fn test_discover_playlist_files() {
    let temp_dir = testing::init();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("2024")).unwrap();
    fs::create_dir_all(root.join("2023")).unwrap();
    fs::write(root.join("2024/03 March.m3u"), "").unwrap();
    fs::write(root.join("2023/00 All.m3u"), "").unwrap();
    fs::write(root.join("2023/cover.jpg"), "").unwrap();
    fs::write(root.join("notes.txt"), "").unwrap();

    let discovered = discover_playlist_files(root).unwrap();
    assert_eq!(discovered, keys(&["2023/00 All.m3u", "2024/03 March.m3u"]));
}

#[test]
fn test_discover_missing_root() {
    let temp_dir = testing::init();
    let discovered = discover_playlist_files(&temp_dir.path().join("nope")).unwrap();
    assert!(discovered.is_empty());
}

#[test]
fn test_detect_orphans_never_deletes() {
    let temp_dir = testing::init();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("2023")).unwrap();
    fs::write(root.join("2023/12 December.m3u"), "/music/a.flac\n").unwrap();

    let report = detect_orphans(root, &keys(&["2024/03 March.m3u"])).unwrap();
    assert_eq!(report.stale, keys(&["2023/12 December.m3u"]));
    assert_eq!(report.missing, keys(&["2024/03 March.m3u"]));
    assert!(root.join("2023/12 December.m3u").exists());
}

#[test]
fn test_remove_orphans() {
    let temp_dir = testing::init();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("2023")).unwrap();
    fs::write(root.join("2023/12 December.m3u"), "").unwrap();
    fs::write(root.join("2023/00 All.m3u"), "").unwrap();

    let report = remove_orphans(root, &keys(&["2023/12 December.m3u", "2023/11 November.m3u"]), Removal::Unlink);
    assert_eq!(report.removed, vec!["2023/12 December.m3u".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "2023/11 November.m3u");
    assert!(!root.join("2023/12 December.m3u").exists());
    assert!(root.join("2023/00 All.m3u").exists());
}
