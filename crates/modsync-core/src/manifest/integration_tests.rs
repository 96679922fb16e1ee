//! Integration tests for manifest construction

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use super::{FileChecksum, FileRecord, ManifestBuilder, PATCHER_PATH};
use crate::config::{ExclusionSet, SyncPathEntry};

fn create_test_file(dir: &Path, rel_path: &str, content: &str) {
    let path = dir.join(rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_build_hashes_enabled_paths() {
    let tmp = TempDir::new().unwrap();
    create_test_file(tmp.path(), "BepInEx/plugins/a.dll", "a");
    create_test_file(tmp.path(), "BepInEx/plugins/sub/b.dll", "b");
    create_test_file(tmp.path(), "BepInEx/config/c.cfg", "c");
    create_test_file(tmp.path(), "unrelated/d.txt", "d");

    let build = ManifestBuilder::new(ExclusionSet::empty())
        .build(
            tmp.path(),
            &[
                SyncPathEntry::enabled("BepInEx/plugins"),
                SyncPathEntry::disabled("BepInEx/config"),
                SyncPathEntry::enabled("missing/path"),
            ],
        )
        .unwrap();

    let manifest = build.manifest;
    assert_eq!(manifest.len(), 3);
    assert_eq!(
        manifest.get("BepInEx/plugins/a.dll"),
        Some(&FileRecord::new(FileChecksum::of_bytes(b"a")))
    );
    assert!(!manifest.get("bepinex/plugins/sub/b.dll").unwrap().no_sync);
    // disabled sync path is listed but flagged
    assert!(manifest.get("BepInEx/config/c.cfg").unwrap().no_sync);
    assert!(!manifest.contains("unrelated/d.txt"));
    assert!(build.conflicts.is_empty());
}

#[test]
fn test_build_skips_patcher_and_markers() {
    let tmp = TempDir::new().unwrap();
    create_test_file(tmp.path(), PATCHER_PATH, "patcher");
    create_test_file(tmp.path(), "BepInEx/patchers/other.dll", "other");
    create_test_file(tmp.path(), "BepInEx/patchers/other.dll.nosync", "");
    create_test_file(tmp.path(), "BepInEx/patchers/notes.nosync.txt", "");

    let build = ManifestBuilder::new(ExclusionSet::empty())
        .build(tmp.path(), &[SyncPathEntry::enabled("BepInEx/patchers")])
        .unwrap();

    let paths: Vec<_> = build.manifest.paths().collect();
    assert_eq!(paths, vec!["BepInEx/patchers/other.dll"]);
    assert!(build.manifest.get("BepInEx/patchers/other.dll").unwrap().no_sync);
}

#[test]
fn test_directory_marker_propagates() {
    let tmp = TempDir::new().unwrap();
    create_test_file(tmp.path(), "mods/keep/.nosync", "");
    create_test_file(tmp.path(), "mods/keep/nested/a.json", "a");
    create_test_file(tmp.path(), "mods/other/b.json", "b");

    let manifest = ManifestBuilder::new(ExclusionSet::empty())
        .build(tmp.path(), &[SyncPathEntry::enabled("mods")])
        .unwrap()
        .manifest;

    assert!(manifest.get("mods/keep/nested/a.json").unwrap().no_sync);
    assert!(!manifest.get("mods/other/b.json").unwrap().no_sync);
}

#[test]
fn test_exclusions_flag_files_and_descendants() {
    let tmp = TempDir::new().unwrap();
    create_test_file(tmp.path(), "plugins/banana/node_modules/lodash/index.js", "x");
    create_test_file(tmp.path(), "plugins/banana/config.json", "{}");
    create_test_file(tmp.path(), "plugins/banana/script.js", "js");

    let exclusions =
        ExclusionSet::new(&["plugins/**/node_modules", "plugins/**/*.js"]).unwrap();
    let manifest = ManifestBuilder::new(exclusions)
        .build(tmp.path(), &[SyncPathEntry::enabled("plugins")])
        .unwrap()
        .manifest;

    assert!(manifest
        .get("plugins/banana/node_modules/lodash/index.js")
        .unwrap()
        .no_sync);
    assert!(manifest.get("plugins/banana/script.js").unwrap().no_sync);
    assert!(!manifest.get("plugins/banana/config.json").unwrap().no_sync);
}

#[test]
fn test_single_file_sync_path() {
    let tmp = TempDir::new().unwrap();
    create_test_file(tmp.path(), "user/settings.json", "{}");

    let manifest = ManifestBuilder::new(ExclusionSet::empty())
        .build(tmp.path(), &[SyncPathEntry::enabled("user/settings.json")])
        .unwrap()
        .manifest;

    assert_eq!(manifest.paths().collect::<Vec<_>>(), vec!["user/settings.json"]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_case_variants_last_one_wins() {
    let tmp = TempDir::new().unwrap();
    create_test_file(tmp.path(), "mods/A.txt", "upper");
    create_test_file(tmp.path(), "mods/a.txt", "lower");

    let build = ManifestBuilder::new(ExclusionSet::empty())
        .build(tmp.path(), &[SyncPathEntry::enabled("mods")])
        .unwrap();

    // "A.txt" sorts before "a.txt": its spelling stays, the later content wins
    assert_eq!(build.manifest.len(), 1);
    assert_eq!(build.manifest.paths().collect::<Vec<_>>(), vec!["mods/A.txt"]);
    assert_eq!(
        build.manifest.get("MODS/A.TXT").unwrap().checksum,
        FileChecksum::of_bytes(b"lower")
    );
    assert_eq!(build.conflicts.len(), 1);
    assert_eq!(build.conflicts[0].replaced, "mods/A.txt");
    assert_eq!(build.conflicts[0].kept, "mods/a.txt");
}

#[cfg(target_os = "linux")]
#[test]
fn test_case_variants_with_same_content_are_not_conflicts() {
    let tmp = TempDir::new().unwrap();
    create_test_file(tmp.path(), "mods/A.txt", "same");
    create_test_file(tmp.path(), "mods/a.txt", "same");

    let build = ManifestBuilder::new(ExclusionSet::empty())
        .build(tmp.path(), &[SyncPathEntry::enabled("mods")])
        .unwrap();

    assert_eq!(build.manifest.len(), 1);
    assert!(build.conflicts.is_empty());
}
